// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use appattest::assertion::{Assertion, IChallengeValidator};
use appattest::codec::base64;
use appattest::receipt::{AppleJwtProvider, Receipt, ReqwestTransport};
use appattest::{AppAttest, Config, FixedClock};
use chrono::{DateTime, Utc};
use clap::Parser;
use openssl::pkey::{PKey, PKeyRef, Public};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Verify App Attest attestations, assertions and receipts")]
struct AppAttestCli {
    #[command(subcommand)]
    command: Command,

    /// Verifier configuration
    #[arg(short, long, global = true, default_value = "appattest.json")]
    config: String,

    /// Validate as of this RFC 3339 instant instead of the current time
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(clap::Subcommand)]
enum Command {
    Attestation(AttestationArgs),
    Assertion(AssertionArgs),
    Receipt(ReceiptArgs),
    Exchange(ExchangeArgs),
}

#[derive(Debug, clap::Args)]
#[command(long_about = None,
    about = "Validate the supplied attestation object and record the enrolled \
    key on success")]
struct AttestationArgs {
    #[arg(short, long, default_value = "attestation.cbor")]
    attestation: String,

    /// Hex-encoded key identifier reported by the device
    #[arg(short, long)]
    key_id: String,

    /// The challenge issued to the device for this attestation
    #[arg(long)]
    challenge: String,

    #[arg(short, long, default_value = "enrollment.json")]
    enrollment: String,
}

#[derive(Debug, clap::Args)]
#[command(long_about = None,
    about = "Validate the supplied assertion with an enrolled key and advance \
    its counter on success")]
struct AssertionArgs {
    #[arg(short, long, default_value = "assertion.cbor")]
    assertion: String,

    /// JSON client data, with the challenge in its `challenge` member
    #[arg(short = 'd', long, default_value = "client-data.json")]
    client_data: String,

    /// The challenge issued to the device for this assertion
    #[arg(long)]
    challenge: String,

    #[arg(short, long, default_value = "enrollment.json")]
    enrollment: String,
}

#[derive(Debug, clap::Args)]
#[command(long_about = None,
    about = "Validate the receipt stored with an enrolled key")]
struct ReceiptArgs {
    #[arg(short, long, default_value = "enrollment.json")]
    enrollment: String,
}

#[derive(Debug, clap::Args)]
#[command(long_about = None,
    about = "Exchange the receipt stored with an enrolled key for a fresh one \
    with the receipt issuer")]
struct ExchangeArgs {
    #[arg(short, long, default_value = "enrollment.json")]
    enrollment: String,
}

/// What is kept about an enrolled key between invocations
#[serde_with::serde_as]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Enrollment {
    #[serde_as(as = "serde_with::hex::Hex")]
    key_id: Vec<u8>,
    /// PEM SubjectPublicKeyInfo
    public_key: String,
    receipt: base64::Bytes,
    sign_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    os_version: Option<String>,
}

impl Enrollment {
    fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let j = fs::read_to_string(path)?;

        Ok(serde_json::from_str(&j)?)
    }

    fn store(&self, path: &str) -> Result<(), Box<dyn Error>> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;

        Ok(())
    }

    fn public_key(&self) -> Result<PKey<Public>, Box<dyn Error>> {
        Ok(PKey::public_key_from_pem(self.public_key.as_bytes())?)
    }
}

/// Accepts assertions whose JSON client data carries the expected challenge
struct ClientDataChallenge;

impl IChallengeValidator for ClientDataChallenge {
    fn validate(
        &self,
        _assertion: &Assertion,
        client_data: &[u8],
        _public_key: &PKeyRef<Public>,
        challenge: &[u8],
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let v: serde_json::Value = serde_json::from_slice(client_data)?;

        Ok(v.get("challenge")
            .and_then(|c| c.as_str())
            .is_some_and(|c| c.as_bytes() == challenge))
    }
}

fn main() {
    let cli = AppAttestCli::parse();

    init_tracing(cli.verbose);

    match &cli.command {
        Command::Attestation(args) => match attestation(&cli, args) {
            Ok(e) => println!(
                "attestation successful (key id: {})",
                hex::encode(&e.key_id)
            ),
            Err(e) => eprintln!("attestation failed: {e}"),
        },

        Command::Assertion(args) => match assertion(&cli, args) {
            Ok(a) => println!(
                "assertion successful (counter: {})",
                a.authenticator_data.sign_count
            ),
            Err(e) => eprintln!("assertion failed: {e}"),
        },

        Command::Receipt(args) => match receipt(&cli, args) {
            Ok(r) => println!("receipt validation successful\n{}", describe(&r)),
            Err(e) => eprintln!("receipt validation failed: {e}"),
        },

        Command::Exchange(args) => match exchange(&cli, args) {
            Ok(r) => println!("receipt exchange successful\n{}", describe(&r)),
            Err(e) => eprintln!("receipt exchange failed: {e}"),
        },
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();
}

fn app(cli: &AppAttestCli) -> Result<AppAttest, Box<dyn Error>> {
    let config = Config::from_file(&cli.config)?;
    let app = AppAttest::from_config(&config)?;

    Ok(match cli.at {
        Some(t) => app.with_clock(Arc::new(FixedClock(t))),
        None => app,
    })
}

fn attestation(cli: &AppAttestCli, args: &AttestationArgs) -> Result<Enrollment, Box<dyn Error>> {
    let app = app(cli)?;

    let a = fs::read(&args.attestation)?;
    let key_id = hex::decode(&args.key_id)?;

    let v = app
        .attestation_validator()
        .validate(&a, &key_id, args.challenge.as_bytes())?;

    let e = Enrollment {
        key_id,
        public_key: String::from_utf8(v.public_key()?.public_key_to_pem()?)?,
        receipt: v.receipt.p7.into(),
        sign_count: 0,
        os_version: v.os_version,
    };

    e.store(&args.enrollment)?;

    Ok(e)
}

fn assertion(cli: &AppAttestCli, args: &AssertionArgs) -> Result<Assertion, Box<dyn Error>> {
    let app = app(cli)?;

    let mut e = Enrollment::load(&args.enrollment)?;

    let a = fs::read(&args.assertion)?;
    let client_data = fs::read(&args.client_data)?;

    let v = app.assertion_validator(ClientDataChallenge).validate(
        &a,
        &client_data,
        &*e.public_key()?,
        e.sign_count,
        args.challenge.as_bytes(),
    )?;

    e.sign_count = v.authenticator_data.sign_count;
    e.store(&args.enrollment)?;

    Ok(v)
}

fn receipt(cli: &AppAttestCli, args: &ReceiptArgs) -> Result<Receipt, Box<dyn Error>> {
    let app = app(cli)?;

    let e = Enrollment::load(&args.enrollment)?;

    Ok(app
        .receipt_validator()
        .validate(e.receipt.as_slice(), &*e.public_key()?, None)?)
}

fn exchange(cli: &AppAttestCli, args: &ExchangeArgs) -> Result<Receipt, Box<dyn Error>> {
    let config = Config::from_file(&cli.config)?;
    let jwt = config
        .jwt
        .as_ref()
        .ok_or("no jwt settings in the configuration")?;

    let app = app(cli)?;

    let token_provider = AppleJwtProvider::new(
        &jwt.team_identifier,
        &jwt.key_identifier,
        &fs::read(&jwt.private_key)?,
        app.clock(),
    )?;

    let mut e = Enrollment::load(&args.enrollment)?;

    let r = app
        .receipt_exchange(token_provider, ReqwestTransport::new()?)
        .exchange(e.receipt.as_slice(), &*e.public_key()?)?;

    e.receipt = r.p7.clone().into();
    e.store(&args.enrollment)?;

    Ok(r)
}

fn describe(r: &Receipt) -> String {
    serde_json::to_string_pretty(&r.payload).unwrap_or_default()
}
