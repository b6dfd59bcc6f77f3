// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// A minimal blocking HTTP POST capability, used to reach the receipt issuer
pub trait IHttpTransport {
    fn post(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, Box<dyn Error + Send + Sync>>;
}

/// [`IHttpTransport`] backed by a blocking `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .build()?;

        Ok(ReqwestTransport { client })
    }
}

impl IHttpTransport for ReqwestTransport {
    fn post(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<HttpResponse, Box<dyn Error + Send + Sync>> {
        let mut req = self.client.post(uri).body(body.to_vec());

        for (k, v) in headers {
            req = req.header(*k, *v);
        }

        let resp = req.send()?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.bytes()?.to_vec();

        tracing::debug!(uri, status, "receipt issuer responded");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
