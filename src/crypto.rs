// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Process-wide cryptography backend setup and the digest helpers shared by
//! the validators.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialise the OpenSSL backend.  Safe to call any number of times, only
/// the first call has an effect.
pub fn init() {
    INIT.call_once(|| {
        openssl::init();
        tracing::debug!("crypto backend initialised");
    });
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    openssl::sha::sha256(data)
}

/// `SHA256(data || SHA256(suffix))`, the construction App Attest uses for
/// both the attestation nonce and the assertion signed payload
pub fn nonce(data: &[u8], suffix: &[u8]) -> [u8; 32] {
    let mut h = openssl::sha::Sha256::new();
    h.update(data);
    h.update(&sha256(suffix));
    h.finish()
}

/// Constant-time comparison.  Slices of different lengths compare unequal.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && openssl::memcmp::eq(a, b)
}
