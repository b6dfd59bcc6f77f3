// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use crate::clock::IClock;
use crate::codec::{AttestationObject, APP_ATTEST_FORMAT};
use crate::crypto;
use crate::environment::Environment;
use crate::receipt::{Receipt, ReceiptValidator};
use crate::token::AuthenticatorData;
use crate::trust::{self, TrustAnchor};
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Public};
use openssl::x509::X509;
use std::sync::Arc;
use tracing::debug;

/// The outcome of a successful attestation validation
#[derive(Debug, Clone)]
pub struct ValidatedAttestation {
    /// The credential certificate
    pub certificate: X509,
    /// The receipt bundled with the attestation, to be kept for later
    /// exchanges
    pub receipt: Receipt,
    pub os_version: Option<String>,
}

impl ValidatedAttestation {
    /// The attested public key, to be stored for validating assertions
    pub fn public_key(&self) -> Result<PKey<Public>, ErrorStack> {
        self.certificate.public_key()
    }
}

/// Validates attestation objects for one app in one environment
pub struct AttestationValidator {
    app_identifier: String,
    environment: Environment,
    trust_anchor: TrustAnchor,
    receipt_validator: ReceiptValidator,
    clock: Arc<dyn IClock>,
}

impl AttestationValidator {
    pub fn new(
        app_identifier: impl Into<String>,
        environment: Environment,
        trust_anchor: TrustAnchor,
        receipt_validator: ReceiptValidator,
        clock: Arc<dyn IClock>,
    ) -> Self {
        crypto::init();

        AttestationValidator {
            app_identifier: app_identifier.into(),
            environment,
            trust_anchor,
            receipt_validator,
            clock,
        }
    }

    /// Validate `attestation`, produced for the key identified by `key_id`
    /// in response to the server issued `challenge`.  Checks are run in
    /// order and the first failure is returned.
    pub fn validate(
        &self,
        attestation: &[u8],
        key_id: &[u8],
        challenge: &[u8],
    ) -> Result<ValidatedAttestation, Error> {
        let r = self.do_validate(attestation, key_id, challenge);

        match &r {
            Ok(v) => debug!(
                key_id = %hex::encode(key_id),
                os_version = ?v.os_version,
                "attestation validated"
            ),
            Err(e) => tracing::warn!(key_id = %hex::encode(key_id), error = %e, "attestation rejected"),
        }

        r
    }

    fn do_validate(
        &self,
        attestation: &[u8],
        key_id: &[u8],
        challenge: &[u8],
    ) -> Result<ValidatedAttestation, Error> {
        let o = AttestationObject::decode(attestation)?;

        Self::verify_format(&o)?;
        let certificate = self.verify_chain(&o)?;
        Self::verify_nonce(&o, challenge)?;
        Self::verify_key_binding(&certificate, key_id)?;
        self.verify_auth_data(&o, key_id)?;
        let receipt = self.verify_receipt(&o, &certificate)?;
        let os_version = Self::os_version(&o);

        Ok(ValidatedAttestation {
            certificate,
            receipt,
            os_version,
        })
    }

    fn verify_format(o: &AttestationObject) -> Result<(), Error> {
        if o.fmt != APP_ATTEST_FORMAT {
            return Err(Error::InvalidFormat(format!(
                "expecting {APP_ATTEST_FORMAT}, got {}",
                o.fmt
            )));
        }

        Ok(())
    }

    /// Returns the credential certificate once the chain is trusted
    fn verify_chain(&self, o: &AttestationObject) -> Result<X509, Error> {
        let chain = trust::parse_chain(&o.att_stmt.x5c)
            .map_err(|e| Error::InvalidCertificateChain(e.to_string()))?;

        trust::verify_chain(&chain, &self.trust_anchor, self.clock.now())
            .map_err(|e| Error::InvalidCertificateChain(e.to_string()))?;

        chain
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidCertificateChain("empty chain".to_string()))
    }

    fn verify_nonce(o: &AttestationObject, challenge: &[u8]) -> Result<(), Error> {
        let expected = crypto::nonce(&o.auth_data, challenge);

        let actual = trust::extension_octets(
            o.credential_certificate(),
            trust::NONCE_OID,
            trust::NONCE_TAG,
        )
        .map_err(|e| Error::InvalidNonce(e.to_string()))?;

        if !crypto::ct_eq(&expected, &actual) {
            return Err(Error::InvalidNonce(
                "certificate nonce does not match authenticator data and challenge".to_string(),
            ));
        }

        debug!("attestation nonce verified");

        Ok(())
    }

    fn verify_key_binding(certificate: &X509, key_id: &[u8]) -> Result<(), Error> {
        let actual =
            trust::key_id(certificate).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;

        if !crypto::ct_eq(&actual, key_id) {
            return Err(Error::InvalidPublicKey(format!(
                "credential certificate key id is {}",
                hex::encode(actual)
            )));
        }

        Ok(())
    }

    fn verify_auth_data(&self, o: &AttestationObject, key_id: &[u8]) -> Result<(), Error> {
        let ad = AuthenticatorData::decode(&o.auth_data)
            .map_err(|e| Error::InvalidAuthenticatorData(e.to_string()))?;

        let acd = ad.attested_credential_data.ok_or_else(|| {
            Error::InvalidAuthenticatorData("no attested credential data".to_string())
        })?;

        if ad.rp_id_hash != crypto::sha256(self.app_identifier.as_bytes()) {
            return Err(Error::InvalidAuthenticatorData(format!(
                "RP ID hash does not match app identifier {}",
                self.app_identifier
            )));
        }

        if ad.sign_count != 0 {
            return Err(Error::InvalidAuthenticatorData(format!(
                "counter MUST be 0 at enrollment, got {}",
                ad.sign_count
            )));
        }

        if &acd.aaguid != self.environment.aaguid() {
            return Err(Error::InvalidAuthenticatorData(format!(
                "AAGUID {} does not match the {} environment",
                hex::encode(acd.aaguid),
                self.environment
            )));
        }

        if acd.credential_id != key_id {
            return Err(Error::InvalidAuthenticatorData(
                "credential id does not match key id".to_string(),
            ));
        }

        debug!("attestation authenticator data verified");

        Ok(())
    }

    fn verify_receipt(&self, o: &AttestationObject, certificate: &X509) -> Result<Receipt, Error> {
        let pk = certificate
            .public_key()
            .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;

        self.receipt_validator
            .validate(&o.att_stmt.receipt, &pk, None)
            .map_err(Error::InvalidReceipt)
    }

    fn os_version(o: &AttestationObject) -> Option<String> {
        trust::extension_octets(
            o.credential_certificate(),
            trust::OS_VERSION_OID,
            trust::OS_VERSION_TAG,
        )
        .ok()
        .and_then(|v| String::from_utf8(v).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::receipt;
    use crate::receipt::default_max_age;
    use crate::testutil::{self, Device, Pki};
    use chrono::{DateTime, TimeZone, Utc};

    const TEST_ATTESTATION: &[u8; 5376] = include_bytes!("../../testdata/attestation-apple.cbor");
    const APPLE_APP_ID: &str = "762U5G7236.network.gandalf.connect";
    const APPLE_KEY_ID: [u8; 32] = hex_literal::hex!(
        "1b779ff691edf4de03c548e8fe1962f6d5798060ca683dd47bb2bc72a78dfebf"
    );

    fn validator_at(d: &Device, now: DateTime<Utc>) -> AttestationValidator {
        let clock: Arc<dyn IClock> = Arc::new(FixedClock(now));

        AttestationValidator::new(
            d.app_id.clone(),
            d.environment,
            d.attestation_pki.anchor(),
            ReceiptValidator::new(
                d.app_id.clone(),
                d.receipt_pki.anchor(),
                default_max_age(),
                clock.clone(),
            ),
            clock,
        )
    }

    fn validator(d: &Device) -> AttestationValidator {
        validator_at(d, testutil::now())
    }

    fn encode(o: &AttestationObject) -> Vec<u8> {
        o.encode().unwrap()
    }

    fn apple_validator() -> AttestationValidator {
        let clock: Arc<dyn IClock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 6, 30, 19, 50, 0).unwrap(),
        ));

        AttestationValidator::new(
            APPLE_APP_ID,
            Environment::Production,
            TrustAnchor::apple_app_attestation_root().unwrap(),
            ReceiptValidator::new(
                APPLE_APP_ID,
                TrustAnchor::apple_root_ca_g3().unwrap(),
                default_max_age(),
                clock.clone(),
            ),
            clock,
        )
    }

    #[test]
    fn apple_attestation_unknown_challenge() {
        // everything up to the nonce is genuine
        let r = apple_validator().validate(TEST_ATTESTATION, &APPLE_KEY_ID, b"not the challenge");

        assert!(matches!(r, Err(Error::InvalidNonce(_))));
    }

    #[test]
    fn apple_attestation_checks_after_nonce() {
        let v = apple_validator();
        let o = AttestationObject::decode(TEST_ATTESTATION).unwrap();
        let leaf = X509::from_der(o.credential_certificate()).unwrap();

        AttestationValidator::verify_key_binding(&leaf, &APPLE_KEY_ID).unwrap();
        v.verify_auth_data(&o, &APPLE_KEY_ID).unwrap();
        v.verify_receipt(&o, &leaf).unwrap();
        assert_eq!(
            AttestationValidator::os_version(&o).as_deref(),
            Some("17.5.1")
        );
    }

    #[test]
    fn valid() {
        let d = Device::default();
        let e = d.attest();

        let v = validator(&d)
            .validate(&encode(&e.attestation), &e.leaf.key_id(), &d.challenge)
            .unwrap();

        assert_eq!(v.certificate.to_der().unwrap(), e.leaf.cert.to_der().unwrap());
        assert_eq!(v.os_version.as_deref(), Some("17.5.1"));
        assert_eq!(v.receipt.p7, e.attestation.att_stmt.receipt);
        assert_eq!(
            v.public_key().unwrap().public_key_to_der().unwrap(),
            e.leaf.public_key().public_key_to_der().unwrap()
        );
    }

    #[test]
    fn development_environment() {
        let d = Device {
            environment: Environment::Development,
            ..Default::default()
        };
        let e = d.attest();

        validator(&d)
            .validate(&encode(&e.attestation), &e.leaf.key_id(), &d.challenge)
            .unwrap();

        // the same attestation is rejected in production
        let mut v = validator(&d);
        v.environment = Environment::Production;

        let r = v.validate(&encode(&e.attestation), &e.leaf.key_id(), &d.challenge);
        assert!(matches!(r, Err(Error::InvalidAuthenticatorData(_))));
    }

    #[test]
    fn missing_os_version() {
        let d = Device {
            os_version: None,
            ..Default::default()
        };
        let e = d.attest();

        let v = validator(&d)
            .validate(&encode(&e.attestation), &e.leaf.key_id(), &d.challenge)
            .unwrap();

        assert_eq!(v.os_version, None);
    }

    #[test]
    fn malformed() {
        let d = Device::default();

        let r = validator(&d).validate(&[0xa1, 0x63], b"", b"");

        assert!(matches!(r, Err(Error::Decode(_))));
    }

    #[test]
    fn wrong_format() {
        let d = Device::default();
        let mut e = d.attest();
        e.attestation.fmt = "packed".to_string();

        let r = validator(&d).validate(&encode(&e.attestation), &e.leaf.key_id(), &d.challenge);

        assert!(matches!(r, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn foreign_ca() {
        let d = Device::default();
        let e = d.attest();

        let mut v = validator(&d);
        v.trust_anchor = Pki::new().anchor();

        let r = v.validate(&encode(&e.attestation), &e.leaf.key_id(), &d.challenge);

        assert!(matches!(r, Err(Error::InvalidCertificateChain(_))));
    }

    #[test]
    fn expired_chain() {
        let d = Device::default();
        let e = d.attest();
        let later = testutil::now() + chrono::TimeDelta::days(400);

        let r = validator_at(&d, later).validate(
            &encode(&e.attestation),
            &e.leaf.key_id(),
            &d.challenge,
        );

        assert!(matches!(r, Err(Error::InvalidCertificateChain(_))));
    }

    #[test]
    fn nonce_flips() {
        let d = Device::default();
        let e = d.attest();
        let v = validator(&d);

        // any change to the challenge
        let mut challenge = d.challenge.clone();
        challenge[0] ^= 0x01;
        let r = v.validate(&encode(&e.attestation), &e.leaf.key_id(), &challenge);
        assert!(matches!(r, Err(Error::InvalidNonce(_))));

        // any change to the authenticator data
        for i in [0, 32, 36, 60, e.attestation.auth_data.len() - 1] {
            let mut o = e.attestation.clone();
            o.auth_data[i] ^= 0x01;

            let r = v.validate(&encode(&o), &e.leaf.key_id(), &d.challenge);
            assert!(matches!(r, Err(Error::InvalidNonce(_))), "byte {i}");
        }
    }

    #[test]
    fn wrong_key_id() {
        let d = Device::default();
        let e = d.attest();
        let mut key_id = e.leaf.key_id();
        key_id[31] ^= 0x01;

        let r = validator(&d).validate(&encode(&e.attestation), &key_id, &d.challenge);

        assert!(matches!(r, Err(Error::InvalidPublicKey(_))));
    }

    #[test]
    fn auth_data_mismatches() {
        // each tweak is applied before the nonce is computed, so only the
        // authenticator data check can catch it
        let cases: Vec<(&str, Box<dyn Fn(&mut Vec<u8>, &[u8; 32])>)> = vec![
            ("rp id hash", Box::new(|ad, _| ad[0] ^= 0x01)),
            ("counter", Box::new(|ad, _| ad[36] = 1)),
            ("aaguid", Box::new(|ad, _| ad[40] ^= 0x01)),
            ("credential id", Box::new(|ad, _| ad[60] ^= 0x01)),
            ("no AT flag", Box::new(|ad, _| ad.truncate(37))),
            ("truncated", Box::new(|ad, _| ad.truncate(50))),
        ];

        for (name, tweak) in cases {
            let d = Device::default();
            let e = d.attest_with(|ad, k| {
                tweak(ad, k);
                if name == "no AT flag" {
                    ad[32] = 0;
                }
            });

            let r = validator(&d).validate(&encode(&e.attestation), &e.leaf.key_id(), &d.challenge);

            assert!(
                matches!(r, Err(Error::InvalidAuthenticatorData(_))),
                "{name}: {r:?}"
            );
        }
    }

    #[test]
    fn receipt_for_another_key() {
        let d = Device::default();
        let e = d.attest();
        let other = d.attest();

        let mut o = e.attestation.clone();
        o.att_stmt.receipt = other.attestation.att_stmt.receipt;

        let r = validator(&d).validate(&encode(&o), &e.leaf.key_id(), &d.challenge);

        assert!(matches!(
            r,
            Err(Error::InvalidReceipt(receipt::Error::InvalidPayload(_)))
        ));
    }

    #[test]
    fn stale_receipt() {
        let d = Device::default();
        let e = d.attest();
        let later = testutil::now() + chrono::TimeDelta::minutes(10);

        let r = validator_at(&d, later).validate(
            &encode(&e.attestation),
            &e.leaf.key_id(),
            &d.challenge,
        );

        assert!(matches!(r, Err(Error::InvalidReceipt(_))));
    }
}
