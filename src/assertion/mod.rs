// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Validation of the assertions a device attaches to its requests once its
//! key has been enrolled.

pub use self::errors::Error;
pub use self::ichallengevalidator::IChallengeValidator;
pub use self::validator::{Assertion, AssertionValidator};

mod errors;
mod ichallengevalidator;
mod validator;
