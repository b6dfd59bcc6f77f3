// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Server-side verification of Apple App Attest evidence.
//!
//! This crate validates the artifacts an iOS app produces with the App
//! Attest service:
//! * the attestation object returned when a new key is enrolled, checked
//!   against the pinned Apple App Attestation Root CA
//! * the assertions signed with that key on later requests
//! * the fraud-assessment receipts bundled with attestations, and their
//!   renewal with Apple's receipt issuer
//!
//! [`AppAttest`] builds every validator from a single set of settings.  No
//! state is kept across calls: persisting the attested public key, the last
//! assertion counter and the latest receipt is up to the caller.
//!
//! See [Validating apps that connect to your server][appattest].
//!
//! [appattest]: https://developer.apple.com/documentation/devicecheck/validating-apps-that-connect-to-your-server

pub mod assertion;
pub mod attestation;
pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod environment;
pub mod receipt;
pub mod token;
pub mod trust;

mod app;

#[cfg(test)]
mod testutil;

pub use self::app::AppAttest;
pub use self::clock::{FixedClock, IClock, SystemClock};
pub use self::config::Config;
pub use self::environment::Environment;
