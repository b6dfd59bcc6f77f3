// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ichallengevalidator::IChallengeValidator;
use crate::codec::AssertionEnvelope;
use crate::crypto;
use crate::token::{mask_assertion_flags, AuthenticatorData};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKeyRef, Public};
use openssl::sign::Verifier;
use tracing::debug;

/// A validated assertion
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub signature: Vec<u8>,
    pub authenticator_data: AuthenticatorData,
}

/// Validates assertions for one app.  Challenge handling is delegated to
/// `C`.
pub struct AssertionValidator<C: IChallengeValidator> {
    app_identifier: String,
    challenge_validator: C,
}

impl<C: IChallengeValidator> AssertionValidator<C> {
    pub fn new(app_identifier: impl Into<String>, challenge_validator: C) -> Self {
        crypto::init();

        AssertionValidator {
            app_identifier: app_identifier.into(),
            challenge_validator,
        }
    }

    /// Validate `assertion` over `client_data`, signed with the previously
    /// attested `public_key`.
    ///
    /// `last_counter` is the counter of the last assertion accepted for this
    /// key; the caller is responsible for persisting the counter of the
    /// returned assertion.
    pub fn validate(
        &self,
        assertion: &[u8],
        client_data: &[u8],
        public_key: &PKeyRef<Public>,
        last_counter: u32,
        challenge: &[u8],
    ) -> Result<Assertion, Error> {
        let r = self.do_validate(assertion, client_data, public_key, last_counter, challenge);

        match &r {
            Ok(a) => debug!(
                sign_count = a.authenticator_data.sign_count,
                "assertion validated"
            ),
            Err(e) => tracing::warn!(last_counter, error = %e, "assertion rejected"),
        }

        r
    }

    fn do_validate(
        &self,
        assertion: &[u8],
        client_data: &[u8],
        public_key: &PKeyRef<Public>,
        last_counter: u32,
        challenge: &[u8],
    ) -> Result<Assertion, Error> {
        let envelope = AssertionEnvelope::decode(assertion)?;

        Self::verify_signature(&envelope, client_data, public_key)?;
        let authenticator_data = self.verify_auth_data(&envelope, last_counter)?;

        let assertion = Assertion {
            signature: envelope.signature,
            authenticator_data,
        };

        self.verify_challenge(&assertion, client_data, public_key, challenge)?;

        Ok(assertion)
    }

    fn verify_signature(
        envelope: &AssertionEnvelope,
        client_data: &[u8],
        public_key: &PKeyRef<Public>,
    ) -> Result<(), Error> {
        let nonce = crypto::nonce(&envelope.authenticator_data, client_data);

        let verified = Verifier::new(MessageDigest::sha256(), public_key)
            .and_then(|mut v| {
                v.update(&nonce)?;
                v.verify(&envelope.signature)
            })
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;

        if !verified {
            return Err(Error::InvalidSignature(
                "signature does not verify".to_string(),
            ));
        }

        debug!("assertion signature verified");

        Ok(())
    }

    fn verify_auth_data(
        &self,
        envelope: &AssertionEnvelope,
        last_counter: u32,
    ) -> Result<AuthenticatorData, Error> {
        let ad = AuthenticatorData::decode(&mask_assertion_flags(&envelope.authenticator_data))
            .map_err(|e| Error::InvalidAuthenticatorData(e.to_string()))?;

        if ad.rp_id_hash != crypto::sha256(self.app_identifier.as_bytes()) {
            return Err(Error::InvalidAuthenticatorData(format!(
                "RP ID hash does not match app identifier {}",
                self.app_identifier
            )));
        }

        if ad.sign_count <= last_counter {
            return Err(Error::InvalidAuthenticatorData(format!(
                "counter {} is not greater than {last_counter}",
                ad.sign_count
            )));
        }

        Ok(ad)
    }

    fn verify_challenge(
        &self,
        assertion: &Assertion,
        client_data: &[u8],
        public_key: &PKeyRef<Public>,
        challenge: &[u8],
    ) -> Result<(), Error> {
        match self
            .challenge_validator
            .validate(assertion, client_data, public_key, challenge)
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::InvalidChallenge("challenge rejected".to_string())),
            Err(e) => Err(Error::InvalidChallenge(e.to_string())),
        }
    }
}
