// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Wire formats: the CBOR attestation and assertion envelopes, the ASN.1
//! structures App Attest embeds in certificates and receipts, and base64.

pub mod asn1;
pub mod base64;
mod cbor;
mod errors;

pub use self::cbor::*;
pub use self::errors::Error;
pub use self::errors::Error as DecodeError;
