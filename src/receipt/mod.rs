// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

//! Fraud-assessment receipts: validation of the PKCS#7 receipts delivered
//! with attestations, and their renewal with the receipt issuer.

mod errors;
mod exchange;
mod http;
mod jwt;
pub(crate) mod payload;
mod validator;

pub use self::errors::{Error, ExchangeError};
pub use self::exchange::ReceiptExchange;
pub use self::http::{HttpResponse, IHttpTransport, ReqwestTransport};
pub use self::jwt::{AppleJwtProvider, IBearerTokenProvider};
pub use self::payload::{Payload, ReceiptType};
pub use self::validator::{default_max_age, Receipt, ReceiptValidator};
