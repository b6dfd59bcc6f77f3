// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::validator::Assertion;
use openssl::pkey::{PKeyRef, Public};
use std::error::Error;

/// Application specific challenge bookkeeping, e.g., checking that the
/// challenge was issued by the server, has not expired and is used only once.
pub trait IChallengeValidator {
    /// Returns `Ok(true)` if `challenge` is acceptable for `assertion`
    fn validate(
        &self,
        assertion: &Assertion,
        client_data: &[u8],
        public_key: &PKeyRef<Public>,
        challenge: &[u8],
    ) -> Result<bool, Box<dyn Error + Send + Sync>>;
}
