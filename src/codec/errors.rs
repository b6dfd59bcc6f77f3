// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

/// Low-level decoding failures.  All of them are attributable to malformed
/// (possibly adversarial) input, never to internal state.
#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Duplicated field: {0}")]
    DuplicatedField(String),
    #[error("Field type mismatch: {0}")]
    TypeMismatch(String),
    #[error("ASN.1 error: {0}")]
    Asn1(String),
    #[error("Malformed authenticator data: {0}")]
    MalformedAuthenticatorData(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Syntax(e)
            | Error::MissingField(e)
            | Error::DuplicatedField(e)
            | Error::TypeMismatch(e)
            | Error::Asn1(e)
            | Error::MalformedAuthenticatorData(e)
            | Error::Parse(e) => {
                write!(f, "{}", e)
            }
        }
    }
}
