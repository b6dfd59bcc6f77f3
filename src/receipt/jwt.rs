// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use crate::clock::IClock;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

/// Issues the short-lived token authenticating requests to the receipt
/// issuer
pub trait IBearerTokenProvider {
    fn get(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    iat: i64,
}

/// Signs ES256 JWTs with a DeviceCheck private key
pub struct AppleJwtProvider {
    team_identifier: String,
    key_identifier: String,
    key: EncodingKey,
    clock: Arc<dyn IClock>,
}

impl AppleJwtProvider {
    /// `private_key` is the PKCS#8 PEM of the P-256 key registered as
    /// `key_identifier` for the team `team_identifier`
    pub fn new(
        team_identifier: impl Into<String>,
        key_identifier: impl Into<String>,
        private_key: &[u8],
        clock: Arc<dyn IClock>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(AppleJwtProvider {
            team_identifier: team_identifier.into(),
            key_identifier: key_identifier.into(),
            key: EncodingKey::from_ec_pem(private_key)?,
            clock,
        })
    }
}

impl IBearerTokenProvider for AppleJwtProvider {
    fn get(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_identifier.clone());

        let claims = Claims {
            iss: self.team_identifier.clone(),
            iat: self.clock.now().timestamp(),
        };

        Ok(jsonwebtoken::encode(&header, &claims, &self.key)?)
    }
}
