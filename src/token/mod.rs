// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Authenticator data, the binary structure shared by attestations and
//! assertions.

pub use self::authenticator_data::*;

mod authenticator_data;
