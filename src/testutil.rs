// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Throw-away PKI material and device-side encoders for unit tests

use crate::codec::{AssertionEnvelope, AttestationObject, AttestationStatement, APP_ATTEST_FORMAT};
use crate::crypto;
use crate::environment::Environment;
use crate::receipt::payload::*;
use crate::token::Flags;
use crate::trust::{self, TrustAnchor};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use openssl::asn1::{Asn1Object, Asn1OctetString, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::sign::Signer;
use openssl::stack::Stack;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Extension, X509NameBuilder, X509Ref, X509};

pub(crate) const TEST_APP_ID: &str = "TEAMID1234.com.example.app";

/// The instant all fixtures are minted around
pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 19, 50, 0).unwrap()
}

pub(crate) fn creation_time() -> DateTime<Utc> {
    now() - TimeDelta::seconds(60)
}

pub(crate) fn expiration_time() -> DateTime<Utc> {
    now() + TimeDelta::seconds(60)
}

fn der(tag: &[u8], content: &[u8]) -> Vec<u8> {
    let mut v = tag.to_vec();
    let n = content.len();

    match n {
        0..=0x7f => v.push(n as u8),
        0x80..=0xff => v.extend_from_slice(&[0x81, n as u8]),
        _ => v.extend_from_slice(&[0x82, (n >> 8) as u8, n as u8]),
    }

    v.extend_from_slice(content);
    v
}

fn der_u32(i: u32) -> Vec<u8> {
    let mut b = i.to_be_bytes().to_vec();

    while b.len() > 1 && b[0] == 0 && b[1] & 0x80 == 0 {
        b.remove(0);
    }
    if b[0] & 0x80 != 0 {
        b.insert(0, 0);
    }

    der(&[0x02], &b)
}

/// `SEQUENCE { [tag] { OCTET STRING v } }` with the given encoded tag
fn tagged_octets(tag: &[u8], v: &[u8]) -> Vec<u8> {
    der(&[0x30], &der(tag, &der(&[0x04], v)))
}

pub(crate) fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub(crate) fn public(key: &PKeyRef<Private>) -> PKey<Public> {
    PKey::public_key_from_der(&key.public_key_to_der().unwrap()).unwrap()
}

fn certificate(
    cn: &str,
    key: &PKeyRef<Private>,
    issuer: Option<(&X509Ref, &PKeyRef<Private>)>,
    extensions: Vec<X509Extension>,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut b = X509::builder().unwrap();
    b.set_version(2).unwrap();
    b.set_serial_number(&serial.to_asn1_integer().unwrap()).unwrap();
    b.set_subject_name(&name).unwrap();
    b.set_pubkey(key).unwrap();
    b.set_not_before(&Asn1Time::from_unix((now() - TimeDelta::days(1)).timestamp() as _).unwrap())
        .unwrap();
    b.set_not_after(&Asn1Time::from_unix((now() + TimeDelta::days(365)).timestamp() as _).unwrap())
        .unwrap();

    for e in extensions {
        b.append_extension(e).unwrap();
    }

    match issuer {
        Some((cert, signing_key)) => {
            b.set_issuer_name(cert.subject_name()).unwrap();
            b.sign(signing_key, MessageDigest::sha256()).unwrap();
        }
        None => {
            b.set_issuer_name(&name).unwrap();
            b.sign(key, MessageDigest::sha256()).unwrap();
        }
    }

    b.build()
}

fn ca_extensions() -> Vec<X509Extension> {
    vec![
        BasicConstraints::new().critical().ca().build().unwrap(),
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()
            .unwrap(),
    ]
}

fn custom_extension(oid: &str, value: &[u8]) -> X509Extension {
    let oid = Asn1Object::from_str(oid).unwrap();
    let value = Asn1OctetString::new_from_bytes(value).unwrap();

    X509Extension::new_from_der(&oid, false, &value).unwrap()
}

#[derive(Default)]
pub(crate) struct LeafOptions {
    pub nonce: Option<[u8; 32]>,
    pub os_version: Option<Vec<u8>>,
}

pub(crate) struct Leaf {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl Leaf {
    pub fn public_key(&self) -> PKey<Public> {
        public(&self.key)
    }

    pub fn key_id(&self) -> [u8; 32] {
        trust::key_id(&self.cert).unwrap()
    }
}

/// A root and an intermediate CA
pub(crate) struct Pki {
    pub root: X509,
    pub intermediate: X509,
    intermediate_key: PKey<Private>,
}

impl Pki {
    pub fn new() -> Self {
        let root_key = ec_key();
        let root = certificate("Test Root CA", &root_key, None, ca_extensions());

        let intermediate_key = ec_key();
        let intermediate = certificate(
            "Test Intermediate CA",
            &intermediate_key,
            Some((&root, &root_key)),
            ca_extensions(),
        );

        Pki {
            root,
            intermediate,
            intermediate_key,
        }
    }

    pub fn anchor(&self) -> TrustAnchor {
        TrustAnchor::from_der(&self.root.to_der().unwrap()).unwrap()
    }

    /// Mint an end-entity certificate carrying the App Attest extensions
    /// requested in `opts`
    pub fn leaf(&self, opts: &LeafOptions) -> Leaf {
        let key = ec_key();

        let mut extensions = vec![
            BasicConstraints::new().critical().build().unwrap(),
            KeyUsage::new().critical().digital_signature().build().unwrap(),
        ];

        if let Some(nonce) = opts.nonce {
            extensions.push(custom_extension(
                trust::NONCE_OID,
                &tagged_octets(&[0xa1], &nonce),
            ));
        }

        if let Some(v) = &opts.os_version {
            // [1400] in high-tag-number form
            extensions.push(custom_extension(
                trust::OS_VERSION_OID,
                &tagged_octets(&[0xbf, 0x8a, 0x78], v),
            ));
        }

        let cert = certificate(
            "Test Leaf",
            &key,
            Some((&self.intermediate, &self.intermediate_key)),
            extensions,
        );

        Leaf { cert, key }
    }

    /// Wrap `payload` in a PKCS#7 signed-data, signed by a fresh leaf
    pub fn sign_receipt(&self, payload: &[u8]) -> Vec<u8> {
        let signer = self.leaf(&Default::default());

        let mut certs = Stack::<X509>::new().unwrap();
        certs.push(self.intermediate.clone()).unwrap();

        Pkcs7::sign(
            &signer.cert,
            &signer.key,
            &certs,
            payload,
            Pkcs7Flags::BINARY | Pkcs7Flags::NOSMIMECAP,
        )
        .unwrap()
        .to_der()
        .unwrap()
    }
}

/// Receipt payload encoder, pre-populated with every mandatory attribute
pub(crate) struct PayloadBuilder {
    attrs: Vec<(u32, Vec<u8>)>,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        PayloadBuilder {
            attrs: vec![
                (APP_ID, TEST_APP_ID.as_bytes().to_vec()),
                (ATTESTED_CERTIFICATE, Vec::new()),
                (CLIENT_HASH, vec![0x11; 32]),
                (TOKEN, b"token".to_vec()),
                (RECEIPT_TYPE, b"ATTEST".to_vec()),
                (CREATION_TIME, creation_time().to_rfc3339().into_bytes()),
                (EXPIRATION_TIME, expiration_time().to_rfc3339().into_bytes()),
            ],
        }
    }
}

impl PayloadBuilder {
    pub fn attr(mut self, t: u32, v: &[u8]) -> Self {
        self.attrs.push((t, v.to_vec()));
        self
    }

    pub fn without(mut self, t: u32) -> Self {
        self.attrs.retain(|(k, _)| *k != t);
        self
    }

    pub fn attested_certificate(self, cert: &X509Ref) -> Self {
        self.without(ATTESTED_CERTIFICATE)
            .attr(ATTESTED_CERTIFICATE, &cert.to_der().unwrap())
    }

    pub fn build(&self) -> Vec<u8> {
        let content: Vec<u8> = self
            .attrs
            .iter()
            .flat_map(|(t, v)| {
                let mut seq = der_u32(*t);
                seq.extend(der_u32(1));
                seq.extend(der(&[0x04], v));
                der(&[0x30], &seq)
            })
            .collect();

        der(&[0x31], &content)
    }
}

pub(crate) fn auth_data(app_id: &str, flags: u8, sign_count: u32) -> Vec<u8> {
    let mut v = crypto::sha256(app_id.as_bytes()).to_vec();
    v.push(flags);
    v.extend_from_slice(&sign_count.to_be_bytes());
    v
}

/// A simulated device enrolled with the attestation PKI, and the receipt
/// PKI issuing its receipts
pub(crate) struct Device {
    pub attestation_pki: Pki,
    pub receipt_pki: Pki,
    pub app_id: String,
    pub environment: Environment,
    pub challenge: Vec<u8>,
    pub os_version: Option<Vec<u8>>,
}

/// The outcome of [`Device::attest`]
pub(crate) struct Enrollment {
    pub attestation: AttestationObject,
    pub leaf: Leaf,
}

impl Default for Device {
    fn default() -> Self {
        Device {
            attestation_pki: Pki::new(),
            receipt_pki: Pki::new(),
            app_id: TEST_APP_ID.to_string(),
            environment: Environment::Production,
            challenge: b"server challenge".to_vec(),
            os_version: Some(b"17.5.1".to_vec()),
        }
    }
}

impl Device {
    /// Produce an attestation; `tweak` may alter the authenticator data
    /// before the nonce is computed over it
    pub fn attest_with(&self, tweak: impl FnOnce(&mut Vec<u8>, &[u8; 32])) -> Enrollment {
        let key = ec_key();
        let key_id = trust::public_key_id(&key).unwrap();

        let mut ad = auth_data(&self.app_id, Flags::AT, 0);
        ad.extend_from_slice(self.environment.aaguid());
        ad.extend_from_slice(&(key_id.len() as u16).to_be_bytes());
        ad.extend_from_slice(&key_id);
        tweak(&mut ad, &key_id);

        let nonce = crypto::nonce(&ad, &self.challenge);

        let cert = certificate(
            "Test Credential",
            &key,
            Some((
                &self.attestation_pki.intermediate,
                &self.attestation_pki.intermediate_key,
            )),
            {
                let mut e = vec![custom_extension(
                    trust::NONCE_OID,
                    &tagged_octets(&[0xa1], &nonce),
                )];
                if let Some(v) = &self.os_version {
                    e.push(custom_extension(
                        trust::OS_VERSION_OID,
                        &tagged_octets(&[0xbf, 0x8a, 0x78], v),
                    ));
                }
                e
            },
        );

        let receipt = self.receipt_pki.sign_receipt(
            &PayloadBuilder::default()
                .without(APP_ID)
                .attr(APP_ID, self.app_id.as_bytes())
                .attested_certificate(&cert)
                .build(),
        );

        let attestation = AttestationObject {
            fmt: APP_ATTEST_FORMAT.to_string(),
            att_stmt: AttestationStatement {
                x5c: vec![
                    cert.to_der().unwrap(),
                    self.attestation_pki.intermediate.to_der().unwrap(),
                ],
                receipt,
            },
            auth_data: ad,
        };

        Enrollment {
            attestation,
            leaf: Leaf { cert, key },
        }
    }

    pub fn attest(&self) -> Enrollment {
        self.attest_with(|_, _| {})
    }
}

/// Sign `client_data` the way `generateAssertion` does
pub(crate) fn assertion(
    key: &PKeyRef<Private>,
    app_id: &str,
    sign_count: u32,
    client_data: &[u8],
) -> Vec<u8> {
    let ad = auth_data(app_id, Flags::UP, sign_count);
    let nonce = crypto::nonce(&ad, client_data);

    let mut signer = Signer::new(MessageDigest::sha256(), key).unwrap();
    signer.update(&nonce).unwrap();
    let signature = signer.sign_to_vec().unwrap();

    AssertionEnvelope {
        signature,
        authenticator_data: ad,
    }
    .encode()
    .unwrap()
}
