// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::{Error, ExchangeError};
use super::http::IHttpTransport;
use super::jwt::IBearerTokenProvider;
use super::validator::{Receipt, ReceiptValidator};
use crate::clock::unix_epoch;
use crate::codec::base64;
use openssl::pkey::{PKeyRef, Public};
use tracing::debug;

const HTTP_OK: u16 = 200;
const HTTP_NOT_MODIFIED: u16 = 304;

/// Trades receipts for fresh ones with the receipt issuer
pub struct ReceiptExchange<T: IBearerTokenProvider, H: IHttpTransport> {
    validator: ReceiptValidator,
    token_provider: T,
    transport: H,
    url: String,
}

impl<T: IBearerTokenProvider, H: IHttpTransport> ReceiptExchange<T, H> {
    pub fn new(
        validator: ReceiptValidator,
        token_provider: T,
        transport: H,
        url: impl Into<String>,
    ) -> Self {
        ReceiptExchange {
            validator,
            token_provider,
            transport,
            url: url.into(),
        }
    }

    /// Exchange `receipt`, issued for the attested `public_key`.
    ///
    /// The issuer is contacted only when the receipt's not-before time has
    /// passed and it has not yet expired; before not-before the receipt is
    /// returned as is.  The issuer may also answer that the receipt is still
    /// current, in which case it is returned as is too.  Retrying is up to
    /// the caller.
    pub fn exchange(
        &self,
        receipt: &[u8],
        public_key: &PKeyRef<Public>,
    ) -> Result<Receipt, ExchangeError> {
        // the time the receipt was meant to be issued by is not known here,
        // so accept any creation time
        let current = self.validator.validate(receipt, public_key, Some(unix_epoch()))?;

        let now = self.validator.clock().now();

        if let Some(nbf) = current.payload.not_before {
            if now < nbf {
                debug!(%nbf, "receipt not yet renewable, keeping it");
                return Ok(current);
            }
        }

        let exp = current.payload.expiration_time;
        if now >= exp {
            return Err(ExchangeError::ReceiptExpired(exp.to_string()));
        }

        let token = self
            .token_provider
            .get()
            .map_err(|e| ExchangeError::Token(e.to_string()))?;

        let body = base64::encode(receipt);

        let resp = self
            .transport
            .post(&self.url, &[("Authorization", token.as_str())], body.as_bytes())
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        match resp.status {
            HTTP_OK => {
                let p7 = std::str::from_utf8(&resp.body)
                    .map_err(|e| e.to_string())
                    .and_then(|s| base64::decode_str(s).map_err(|e| e.to_string()))
                    .map_err(|e| Error::Malformed(format!("issuer response: {e}")))?;

                let renewed = self.validator.validate(&p7, public_key, None)?;
                debug!(expiration_time = %renewed.payload.expiration_time, "receipt renewed");

                Ok(renewed)
            }
            HTTP_NOT_MODIFIED => {
                debug!("issuer reports receipt not modified");
                Ok(current)
            }
            status => {
                tracing::warn!(status, url = %self.url, "receipt exchange failed");
                Err(ExchangeError::HttpError { status })
            }
        }
    }
}
