// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::anchor::TrustAnchor;
use super::errors::Error;
use crate::codec::asn1;
use chrono::{DateTime, Utc};
use openssl::bn::BigNumContext;
use openssl::ec::PointConversionForm;
use openssl::pkey::{HasPublic, PKeyRef};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyParam;
use openssl::x509::{X509Ref, X509StoreContext, X509};
use x509_parser::prelude::*;

/// Credential certificate extension carrying the attestation nonce
pub const NONCE_OID: &str = "1.2.840.113635.100.8.2";
pub const NONCE_TAG: u32 = 1;

/// Credential certificate extension carrying the OS version
pub const OS_VERSION_OID: &str = "1.2.840.113635.100.8.7";
pub const OS_VERSION_TAG: u32 = 1400;

/// Parse a list of DER certificates
pub fn parse_chain(ders: &[Vec<u8>]) -> Result<Vec<X509>, Error> {
    ders.iter()
        .enumerate()
        .map(|(i, d)| {
            X509::from_der(d)
                .map_err(|e| Error::InvalidCertificateChain(format!("certificate #{i}: {e}")))
        })
        .collect()
}

/// Validate `chain` (leaf first, intermediates following in any order)
/// against `anchor`, as of `at`.  Revocation is not checked.
pub fn verify_chain(chain: &[X509], anchor: &TrustAnchor, at: DateTime<Utc>) -> Result<(), Error> {
    let (leaf, rest) = chain
        .split_first()
        .ok_or_else(|| Error::InvalidCertificateChain("empty chain".to_string()))?;

    let store = (|| {
        let mut param = X509VerifyParam::new()?;
        param.set_time(at.timestamp() as _);

        let mut builder = X509StoreBuilder::new()?;
        builder.add_cert(anchor.certificate().to_owned())?;
        builder.set_param(&param)?;

        let mut untrusted = Stack::<X509>::new()?;
        for c in rest {
            untrusted.push(c.clone())?;
        }

        Ok::<_, openssl::error::ErrorStack>((builder.build(), untrusted))
    })();

    let (store, untrusted) =
        store.map_err(|e| Error::InvalidCertificateChain(format!("setting up store: {e}")))?;

    let mut ctx = X509StoreContext::new()
        .map_err(|e| Error::InvalidCertificateChain(e.to_string()))?;

    let verdict = ctx
        .init(&store, leaf, &untrusted, |c| {
            let ok = c.verify_cert()?;
            Ok((ok, c.error()))
        })
        .map_err(|e| Error::InvalidCertificateChain(e.to_string()))?;

    match verdict {
        (true, _) => {
            tracing::debug!(anchor = %anchor.subject(), %at, "certificate chain verified");
            Ok(())
        }
        (false, err) => Err(Error::InvalidCertificateChain(format!(
            "{} (anchor: {}, at: {at})",
            err.error_string(),
            anchor.subject()
        ))),
    }
}

/// SHA-256 of the subject public key bytes as encoded in the certificate,
/// which is the value App Attest uses as key identifier
pub fn key_id(cert: &X509Ref) -> Result<[u8; 32], Error> {
    let der = cert
        .to_der()
        .map_err(|e| Error::Certificate(format!("encoding certificate: {e}")))?;

    let (_, x509) = parse_x509_certificate(&der)
        .map_err(|e| Error::Certificate(format!("parsing certificate: {e}")))?;

    Ok(crate::crypto::sha256(&x509.public_key().subject_public_key.data))
}

/// Key identifier of a bare EC public key, over its uncompressed point.
/// Matches [`key_id`] only for certificates storing the point uncompressed.
pub fn public_key_id<T: HasPublic>(key: &PKeyRef<T>) -> Result<[u8; 32], Error> {
    let point = (|| {
        let ec = key.ec_key()?;
        let mut ctx = BigNumContext::new()?;
        ec.public_key()
            .to_bytes(ec.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)
    })()
    .map_err(|e| Error::Certificate(format!("extracting EC public key: {e}")))?;

    Ok(crate::crypto::sha256(&point))
}

/// Look up extension `oid` in the DER certificate `cert` and return the
/// octets of the `[tag_no]` element inside it
pub fn extension_octets(cert: &[u8], oid: &str, tag_no: u32) -> Result<Vec<u8>, Error> {
    let (_, x509) = parse_x509_certificate(cert)
        .map_err(|e| Error::Certificate(format!("parsing certificate: {e}")))?;

    let ext = x509
        .extensions()
        .iter()
        .find(|e| e.oid.to_id_string() == oid)
        .ok_or_else(|| Error::Extension(format!("{oid} not found")))?;

    // the extnValue OCTET STRING wrapper is removed by the parser
    asn1::tagged_octet_string(ext.value, tag_no).map_err(|e| Error::Extension(format!("{oid}: {e}")))
}
