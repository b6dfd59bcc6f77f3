// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::payload::Payload;
use crate::clock::IClock;
use crate::trust::{self, TrustAnchor};
use chrono::{DateTime, TimeDelta, Utc};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKeyRef, Public};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use std::sync::Arc;

/// How long after its creation a receipt is accepted, unless configured
/// otherwise
pub fn default_max_age() -> TimeDelta {
    TimeDelta::minutes(5)
}

/// A receipt whose signature, signer chain and payload have been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// The PKCS#7 signed-data as received
    pub p7: Vec<u8>,
    pub payload: Payload,
}

/// Validates PKCS#7 receipts issued for a given app
pub struct ReceiptValidator {
    app_identifier: String,
    trust_anchor: TrustAnchor,
    max_age: TimeDelta,
    clock: Arc<dyn IClock>,
}

impl ReceiptValidator {
    pub fn new(
        app_identifier: impl Into<String>,
        trust_anchor: TrustAnchor,
        max_age: TimeDelta,
        clock: Arc<dyn IClock>,
    ) -> Self {
        crate::crypto::init();

        ReceiptValidator {
            app_identifier: app_identifier.into(),
            trust_anchor,
            max_age,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn IClock> {
        &self.clock
    }

    /// Validate `receipt` for the attested key `public_key`.
    ///
    /// Without `reference_time` the receipt must be valid now: not before its
    /// not-before time, strictly before its expiration time and created no
    /// earlier than the maximum age ago.  With `reference_time` the receipt
    /// only needs to have been created at or after it, and checking the
    /// validity window is left to the caller.
    pub fn validate(
        &self,
        receipt: &[u8],
        public_key: &PKeyRef<Public>,
        reference_time: Option<DateTime<Utc>>,
    ) -> Result<Receipt, Error> {
        let r = self.do_validate(receipt, public_key, reference_time);

        match &r {
            Ok(v) => tracing::debug!(
                app_id = %v.payload.app_id,
                expiration_time = %v.payload.expiration_time,
                "receipt validated"
            ),
            Err(e) => tracing::warn!(error = %e, "receipt rejected"),
        }

        r
    }

    fn do_validate(
        &self,
        receipt: &[u8],
        public_key: &PKeyRef<Public>,
        reference_time: Option<DateTime<Utc>>,
    ) -> Result<Receipt, Error> {
        let p7 = Pkcs7::from_der(receipt).map_err(|e| Error::Malformed(e.to_string()))?;

        let content = Self::verify_signature(&p7)?;
        self.verify_signer(&p7)?;

        let payload = Payload::decode(&content).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        self.verify_payload(&payload, public_key)?;

        match reference_time {
            Some(t) => Self::verify_created_since(&payload, t)?,
            None => self.verify_validity(&payload, self.clock.now())?,
        }

        Ok(Receipt {
            p7: receipt.to_vec(),
            payload,
        })
    }

    /// Check the signature using the embedded signer certificate and return
    /// the signed content
    fn verify_signature(p7: &Pkcs7) -> Result<Vec<u8>, Error> {
        let mut content = Vec::new();

        (|| {
            let certs = Stack::<X509>::new()?;
            let store = X509StoreBuilder::new()?.build();
            p7.verify(
                &certs,
                &store,
                None,
                Some(&mut content),
                Pkcs7Flags::NOVERIFY | Pkcs7Flags::BINARY,
            )
        })()
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

        Ok(content)
    }

    /// Check the signer certificate chains to the receipt trust anchor
    fn verify_signer(&self, p7: &Pkcs7) -> Result<(), Error> {
        let embedded: Vec<X509> = p7
            .signed()
            .and_then(|s| s.certificates())
            .map(|s| s.iter().map(|c| c.to_owned()).collect())
            .unwrap_or_default();

        let signer = Stack::<X509>::new()
            .and_then(|certs| p7.signers(&certs, Pkcs7Flags::empty()))
            .map_err(|e| Error::Malformed(format!("locating signer: {e}")))?
            .iter()
            .next()
            .map(|c| c.to_owned())
            .ok_or_else(|| Error::Malformed("no signer certificate".to_string()))?;

        let mut chain = vec![signer];
        chain.extend(embedded);

        trust::verify_chain(&chain, &self.trust_anchor, self.clock.now()).map_err(|e| match e {
            trust::Error::InvalidCertificateChain(s) => Error::InvalidCertificateChain(s),
            other => Error::InvalidCertificateChain(other.to_string()),
        })
    }

    fn verify_payload(&self, payload: &Payload, public_key: &PKeyRef<Public>) -> Result<(), Error> {
        if payload.app_id != self.app_identifier {
            return Err(Error::InvalidPayload(format!(
                "app id {} does not match {}",
                payload.app_id, self.app_identifier
            )));
        }

        let matches = (|| {
            let attested = X509::from_der(&payload.attested_certificate)?;
            let a = attested.public_key()?.public_key_to_der()?;
            let b = public_key.public_key_to_der()?;
            Ok::<_, openssl::error::ErrorStack>(a == b)
        })()
        .map_err(|e| Error::InvalidPayload(format!("attested certificate: {e}")))?;

        if !matches {
            return Err(Error::InvalidPayload(
                "attested public key does not match".to_string(),
            ));
        }

        Ok(())
    }

    fn verify_created_since(payload: &Payload, reference_time: DateTime<Utc>) -> Result<(), Error> {
        if payload.creation_time < reference_time {
            return Err(Error::TooOld(format!(
                "created at {}, before {reference_time}",
                payload.creation_time
            )));
        }

        Ok(())
    }

    fn verify_validity(&self, payload: &Payload, now: DateTime<Utc>) -> Result<(), Error> {
        if let Some(nbf) = payload.not_before {
            if now < nbf {
                return Err(Error::NotYetValid(format!("not before {nbf}, now {now}")));
            }
        }

        if now >= payload.expiration_time {
            return Err(Error::Expired(format!(
                "expired at {}, now {now}",
                payload.expiration_time
            )));
        }

        let oldest = now
            .checked_sub_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        if payload.creation_time < oldest {
            return Err(Error::TooOld(format!(
                "created at {}, maximum age {}s",
                payload.creation_time,
                self.max_age.num_seconds()
            )));
        }

        Ok(())
    }
}
