// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

extern crate appattest;

use appattest::assertion::{Assertion, IChallengeValidator};
use appattest::codec::{AssertionEnvelope, AttestationObject};
use appattest::{crypto, trust, AppAttest, Environment, FixedClock};
use chrono::{TimeZone, Utc};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, PKeyRef, Public};
use openssl::sign::Signer;
use openssl::x509::X509;
use std::error::Error;
use std::fs;
use std::sync::Arc;

const APP_ID: &str = "762U5G7236.network.gandalf.connect";

/// Accepts client data that is exactly the issued challenge
struct EchoChallenge;

impl IChallengeValidator for EchoChallenge {
    fn validate(
        &self,
        _assertion: &Assertion,
        client_data: &[u8],
        _public_key: &PKeyRef<Public>,
        challenge: &[u8],
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(client_data == challenge)
    }
}

fn main() {
    let app = AppAttest::new(APP_ID, Environment::Production)
        .expect("loading pinned anchors")
        .with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 6, 30, 19, 50, 0).unwrap(),
        )));

    attestation(&app);
    assertion(&app);
}

fn attestation(app: &AppAttest) {
    let f = "testdata/attestation-apple.cbor";
    let buf = fs::read(f).unwrap_or_else(|_| panic!("loading file {}", f));

    let o = AttestationObject::decode(&buf).unwrap();
    let leaf = X509::from_der(o.credential_certificate()).unwrap();
    let key_id = trust::key_id(&leaf).unwrap();

    println!("credential key id: {}", hex::encode(key_id));

    // the challenge of the captured attestation is not known, so this stops
    // at the nonce check
    match app
        .attestation_validator()
        .validate(&buf, &key_id, b"unknown challenge")
    {
        Ok(v) => println!("attestation successful (os version: {:?})", v.os_version),
        Err(e) => println!("attestation failed: {e}"),
    }
}

fn assertion(app: &AppAttest) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
    let public_key = PKey::public_key_from_der(&key.public_key_to_der().unwrap()).unwrap();

    let challenge = b"server challenge";

    for (counter, last_counter) in [(1u32, 0u32), (2, 1), (2, 2)] {
        let mut ad = crypto::sha256(APP_ID.as_bytes()).to_vec();
        ad.push(0x01);
        ad.extend_from_slice(&counter.to_be_bytes());

        let mut signer = Signer::new(MessageDigest::sha256(), &key).unwrap();
        signer.update(&crypto::nonce(&ad, challenge)).unwrap();

        let a = AssertionEnvelope {
            signature: signer.sign_to_vec().unwrap(),
            authenticator_data: ad,
        }
        .encode()
        .unwrap();

        match app.assertion_validator(EchoChallenge).validate(
            &a,
            challenge,
            &public_key,
            last_counter,
            challenge,
        ) {
            Ok(v) => println!(
                "assertion successful (counter: {})",
                v.authenticator_data.sign_count
            ),
            Err(e) => println!("assertion failed (last counter: {last_counter}): {e}"),
        }
    }
}
