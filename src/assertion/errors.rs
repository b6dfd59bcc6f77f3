// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use crate::codec::DecodeError;

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid authenticator data: {0}")]
    InvalidAuthenticatorData(String),
    #[error("Invalid challenge: {0}")]
    InvalidChallenge(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Decode(e) => write!(f, "{:?}", e),
            Error::InvalidSignature(e)
            | Error::InvalidAuthenticatorData(e)
            | Error::InvalidChallenge(e) => {
                write!(f, "{}", e)
            }
        }
    }
}
