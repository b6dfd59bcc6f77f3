// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Validation of the attestation object a device produces when it enrolls a
//! new key.
//!
//! # Example
//!
//! ```
//! use appattest::{AppAttest, Environment, FixedClock};
//! use chrono::{TimeZone, Utc};
//! use std::sync::Arc;
//!
//! const attestation: &[u8; 5376] = include_bytes!("../../testdata/attestation-apple.cbor");
//!
//! let app = AppAttest::new("762U5G7236.network.gandalf.connect", Environment::Production)
//!     .expect("loading pinned anchors")
//!     .with_clock(Arc::new(FixedClock(
//!         Utc.with_ymd_and_hms(2024, 6, 30, 19, 50, 0).unwrap(),
//!     )));
//!
//! let key_id = hex::decode("1b779ff691edf4de03c548e8fe1962f6d5798060ca683dd47bb2bc72a78dfebf")
//!     .unwrap();
//!
//! // the challenge this attestation was produced for is not known, so the
//! // nonce check is where validation stops
//! let r = app
//!     .attestation_validator()
//!     .validate(attestation, &key_id, b"some challenge");
//!
//! assert!(matches!(r, Err(appattest::attestation::Error::InvalidNonce(_))));
//! ```

pub use self::errors::Error;
pub use self::validator::{AttestationValidator, ValidatedAttestation};

mod errors;
mod validator;
