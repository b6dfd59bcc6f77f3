// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use crate::environment::Environment;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Semantic error: {0}")]
    Sema(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Syntax(e) | Error::Sema(e) | Error::Io(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

fn default_receipt_max_age() -> Duration {
    Duration::from_secs(300)
}

/// Credentials for the receipt issuer bearer token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct JwtConfig {
    pub team_identifier: String,
    pub key_identifier: String,
    /// Path to the PKCS#8 PEM private key
    pub private_key: PathBuf,
}

/// Verifier configuration, usually loaded from a JSON file
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub app_identifier: String,
    #[serde(default)]
    pub environment: Environment,
    /// PEM file replacing the pinned attestation root
    pub attestation_root: Option<PathBuf>,
    /// PEM file replacing the pinned receipt root
    pub receipt_root: Option<PathBuf>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(rename = "receipt-max-age-secs", default = "default_receipt_max_age")]
    pub receipt_max_age: Duration,
    /// Defaults to the environment's issuer endpoint
    pub exchange_url: Option<String>,
    pub jwt: Option<JwtConfig>,
}

impl Config {
    pub fn load_json(j: &str) -> Result<Self, Error> {
        let c: Config = serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        if c.app_identifier.is_empty() {
            return Err(Error::Sema("empty app-identifier".to_string()));
        }

        if c.receipt_max_age.is_zero() {
            return Err(Error::Sema("receipt-max-age-secs must be positive".to_string()));
        }

        Ok(c)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let j = fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("reading {}: {e}", path.display())))?;

        Self::load_json(&j)
    }
}
