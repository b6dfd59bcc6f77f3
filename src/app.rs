// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use crate::assertion::{AssertionValidator, IChallengeValidator};
use crate::attestation::AttestationValidator;
use crate::clock::{IClock, SystemClock};
use crate::config::{self, Config};
use crate::crypto;
use crate::environment::Environment;
use crate::receipt::{
    default_max_age, IBearerTokenProvider, IHttpTransport, ReceiptExchange, ReceiptValidator,
};
use crate::trust::{self, TrustAnchor};
use chrono::TimeDelta;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Builds the validators for one app with consistent settings.
///
/// Defaults are the pinned Apple roots, the system clock, a five minute
/// receipt maximum age and the environment's receipt issuer endpoint.
#[derive(Clone)]
pub struct AppAttest {
    app_identifier: String,
    environment: Environment,
    attestation_anchor: TrustAnchor,
    receipt_anchor: TrustAnchor,
    max_age: TimeDelta,
    exchange_url: String,
    clock: Arc<dyn IClock>,
}

impl AppAttest {
    pub fn new(
        app_identifier: impl Into<String>,
        environment: Environment,
    ) -> Result<Self, trust::Error> {
        crypto::init();

        Ok(AppAttest {
            app_identifier: app_identifier.into(),
            environment,
            attestation_anchor: TrustAnchor::apple_app_attestation_root()?,
            receipt_anchor: TrustAnchor::apple_root_ca_g3()?,
            max_age: default_max_age(),
            exchange_url: environment.exchange_url().to_string(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Apply `config` on top of the defaults, loading any trust anchor it
    /// points to
    pub fn from_config(config: &Config) -> Result<Self, config::Error> {
        let mut app = Self::new(&config.app_identifier, config.environment)
            .map_err(|e| config::Error::Sema(e.to_string()))?;

        if let Some(p) = &config.attestation_root {
            app = app.with_attestation_anchor(load_anchor(p)?);
        }

        if let Some(p) = &config.receipt_root {
            app = app.with_receipt_anchor(load_anchor(p)?);
        }

        let max_age = TimeDelta::from_std(config.receipt_max_age)
            .map_err(|e| config::Error::Sema(format!("receipt-max-age-secs: {e}")))?;
        app = app.with_max_age(max_age);

        if let Some(u) = &config.exchange_url {
            app = app.with_exchange_url(u);
        }

        Ok(app)
    }

    pub fn with_clock(mut self, clock: Arc<dyn IClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_attestation_anchor(mut self, anchor: TrustAnchor) -> Self {
        self.attestation_anchor = anchor;
        self
    }

    pub fn with_receipt_anchor(mut self, anchor: TrustAnchor) -> Self {
        self.receipt_anchor = anchor;
        self
    }

    pub fn with_max_age(mut self, max_age: TimeDelta) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_exchange_url(mut self, url: impl Into<String>) -> Self {
        self.exchange_url = url.into();
        self
    }

    pub fn app_identifier(&self) -> &str {
        &self.app_identifier
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn exchange_url(&self) -> &str {
        &self.exchange_url
    }

    pub fn clock(&self) -> Arc<dyn IClock> {
        self.clock.clone()
    }

    pub fn attestation_validator(&self) -> AttestationValidator {
        AttestationValidator::new(
            self.app_identifier.clone(),
            self.environment,
            self.attestation_anchor.clone(),
            self.receipt_validator(),
            self.clock.clone(),
        )
    }

    pub fn assertion_validator<C: IChallengeValidator>(
        &self,
        challenge_validator: C,
    ) -> AssertionValidator<C> {
        AssertionValidator::new(self.app_identifier.clone(), challenge_validator)
    }

    pub fn receipt_validator(&self) -> ReceiptValidator {
        ReceiptValidator::new(
            self.app_identifier.clone(),
            self.receipt_anchor.clone(),
            self.max_age,
            self.clock.clone(),
        )
    }

    pub fn receipt_exchange<T: IBearerTokenProvider, H: IHttpTransport>(
        &self,
        token_provider: T,
        transport: H,
    ) -> ReceiptExchange<T, H> {
        ReceiptExchange::new(
            self.receipt_validator(),
            token_provider,
            transport,
            self.exchange_url.clone(),
        )
    }
}

fn load_anchor(path: &Path) -> Result<TrustAnchor, config::Error> {
    let pem = fs::read(path)
        .map_err(|e| config::Error::Io(format!("reading {}: {e}", path.display())))?;

    TrustAnchor::from_pem(&pem).map_err(|e| config::Error::Sema(format!("{}: {e}", path.display())))
}
