// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use crate::codec::DecodeError;
use crate::receipt;

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid certificate chain: {0}")]
    InvalidCertificateChain(String),
    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid authenticator data: {0}")]
    InvalidAuthenticatorData(String),
    #[error("Invalid receipt: {0}")]
    InvalidReceipt(#[source] receipt::Error),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Decode(e) => write!(f, "{:?}", e),
            Error::InvalidReceipt(e) => write!(f, "{:?}", e),
            Error::InvalidFormat(e)
            | Error::InvalidCertificateChain(e)
            | Error::InvalidNonce(e)
            | Error::InvalidPublicKey(e)
            | Error::InvalidAuthenticatorData(e) => {
                write!(f, "{}", e)
            }
        }
    }
}
