// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::token::AAGUID_LEN;

const DEVELOPMENT_AAGUID: &[u8; AAGUID_LEN] = b"appattestdevelop";
const PRODUCTION_AAGUID: &[u8; AAGUID_LEN] = b"appattest\0\0\0\0\0\0\0";

const DEVELOPMENT_EXCHANGE_URL: &str =
    "https://data-development.appattest.apple.com/v1/attestationData";
const PRODUCTION_EXCHANGE_URL: &str = "https://data.appattest.apple.com/v1/attestationData";

/// The App Attest environment a key was enrolled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// The AAGUID found in the attested credential data
    pub fn aaguid(self) -> &'static [u8; AAGUID_LEN] {
        match self {
            Environment::Development => DEVELOPMENT_AAGUID,
            Environment::Production => PRODUCTION_AAGUID,
        }
    }

    /// The receipt issuer endpoint
    pub fn exchange_url(self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_EXCHANGE_URL,
            Environment::Production => PRODUCTION_EXCHANGE_URL,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            _ => Err(format!("unknown environment {s}")),
        }
    }
}
