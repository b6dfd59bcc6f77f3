// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

/// Receipt validation failures
#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed receipt: {0}")]
    Malformed(String),
    #[error("Invalid receipt certificate chain: {0}")]
    InvalidCertificateChain(String),
    #[error("Invalid receipt signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid receipt payload: {0}")]
    InvalidPayload(String),
    #[error("Receipt expired: {0}")]
    Expired(String),
    #[error("Receipt not yet valid: {0}")]
    NotYetValid(String),
    #[error("Receipt too old: {0}")]
    TooOld(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Malformed(e)
            | Error::InvalidCertificateChain(e)
            | Error::InvalidSignature(e)
            | Error::InvalidPayload(e)
            | Error::Expired(e)
            | Error::NotYetValid(e)
            | Error::TooOld(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

/// Receipt exchange failures
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ExchangeError {
    #[error(transparent)]
    Receipt(#[from] Error),
    #[error("Receipt expired at {0}, it cannot be renewed")]
    ReceiptExpired(String),
    #[error("Receipt issuer returned HTTP status {status}")]
    HttpError { status: u16 },
    #[error("Bearer token error: {0}")]
    Token(String),
    #[error("Transport error: {0}")]
    Transport(String),
}
