// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid certificate chain: {0}")]
    InvalidCertificateChain(String),
    #[error("Certificate error: {0}")]
    Certificate(String),
    #[error("Extension error: {0}")]
    Extension(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidCertificateChain(e) | Error::Certificate(e) | Error::Extension(e) => {
                write!(f, "{}", e)
            }
        }
    }
}
