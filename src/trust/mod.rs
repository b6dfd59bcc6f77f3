// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! X.509 trust evaluation: pinned anchors, path validation at a given
//! instant, key identifiers and the App Attest certificate extensions.

pub use self::anchor::TrustAnchor;
pub use self::chain::*;
pub use self::errors::Error;

mod anchor;
mod chain;
mod errors;
