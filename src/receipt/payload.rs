// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use crate::codec::asn1;
use crate::codec::DecodeError as Error;
use asn1_rs::{Any, Tag};
use bitmask::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub(crate) const APP_ID: u32 = 2;
pub(crate) const ATTESTED_CERTIFICATE: u32 = 3;
pub(crate) const CLIENT_HASH: u32 = 4;
pub(crate) const TOKEN: u32 = 5;
pub(crate) const RECEIPT_TYPE: u32 = 6;
pub(crate) const ENVIRONMENT: u32 = 7;
pub(crate) const CREATION_TIME: u32 = 12;
pub(crate) const RISK_METRIC: u32 = 17;
pub(crate) const NOT_BEFORE: u32 = 19;
pub(crate) const EXPIRATION_TIME: u32 = 21;

bitmask! {
    #[derive(Debug)]
    mask FieldsSet: u16 where flags Fields {
        AppId               = 0x0001,
        AttestedCertificate = 0x0002,
        ClientHash          = 0x0004,
        Token               = 0x0008,
        ReceiptType         = 0x0010,
        Environment         = 0x0020,
        CreationTime        = 0x0040,
        RiskMetric          = 0x0080,
        NotBefore           = 0x0100,
        ExpirationTime      = 0x0200,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReceiptType {
    /// Issued together with an attestation
    Attest,
    /// Issued by the receipt exchange endpoint
    Receipt,
}

/// The signed content of a receipt
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Payload {
    /// Team identifier and bundle identifier of the app
    pub app_id: String,
    /// DER encoded credential certificate of the attested key
    #[serde_as(as = "serde_with::hex::Hex")]
    pub attested_certificate: Vec<u8>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub client_hash: Vec<u8>,
    pub token: String,
    pub receipt_type: ReceiptType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    pub creation_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_metric: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    pub expiration_time: DateTime<Utc>,
}

fn to_string(v: &[u8], n: &str) -> Result<String, Error> {
    String::from_utf8(v.to_vec()).map_err(|_| Error::TypeMismatch(format!("{n} MUST be UTF-8")))
}

fn to_time(v: &[u8], n: &str) -> Result<DateTime<Utc>, Error> {
    let s = to_string(v, n)?;

    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("{n}: {e}")))
}

impl Payload {
    /// Decode the DER `SET OF SEQUENCE { type, version, value }` carried in
    /// the receipt.  Attributes of unknown type are skipped.
    pub fn decode(buf: &[u8]) -> Result<Payload, Error> {
        let (rest, set) = asn1::expect(buf, Tag::Set, "receipt payload")?;

        if !rest.is_empty() {
            return Err(Error::Syntax(format!(
                "{} trailing bytes after receipt payload",
                rest.len()
            )));
        }

        let mut app_id = None;
        let mut attested_certificate = None;
        let mut client_hash = None;
        let mut token = None;
        let mut receipt_type = None;
        let mut environment = None;
        let mut creation_time = None;
        let mut risk_metric = None;
        let mut not_before = None;
        let mut expiration_time = None;
        let mut fields_set = FieldsSet::none();

        for attr in asn1::children(&set)? {
            let (t, value) = Self::decode_attribute(&attr)?;

            let field = match t {
                APP_ID => {
                    app_id = Some(to_string(value, "app id")?);
                    Fields::AppId
                }
                ATTESTED_CERTIFICATE => {
                    attested_certificate = Some(value.to_vec());
                    Fields::AttestedCertificate
                }
                CLIENT_HASH => {
                    client_hash = Some(value.to_vec());
                    Fields::ClientHash
                }
                TOKEN => {
                    token = Some(to_string(value, "token")?);
                    Fields::Token
                }
                RECEIPT_TYPE => {
                    receipt_type = Some(match value {
                        b"ATTEST" => ReceiptType::Attest,
                        b"RECEIPT" => ReceiptType::Receipt,
                        _ => {
                            return Err(Error::Parse(format!(
                                "unknown receipt type {}",
                                String::from_utf8_lossy(value)
                            )))
                        }
                    });
                    Fields::ReceiptType
                }
                ENVIRONMENT => {
                    environment = Some(to_string(value, "environment")?);
                    Fields::Environment
                }
                CREATION_TIME => {
                    creation_time = Some(to_time(value, "creation time")?);
                    Fields::CreationTime
                }
                RISK_METRIC => {
                    let s = to_string(value, "risk metric")?;
                    risk_metric = Some(
                        s.parse::<u32>()
                            .map_err(|e| Error::Parse(format!("risk metric: {e}")))?,
                    );
                    Fields::RiskMetric
                }
                NOT_BEFORE => {
                    not_before = Some(to_time(value, "not before")?);
                    Fields::NotBefore
                }
                EXPIRATION_TIME => {
                    expiration_time = Some(to_time(value, "expiration time")?);
                    Fields::ExpirationTime
                }
                _ => continue,
            };

            if fields_set.contains(field) {
                return Err(Error::DuplicatedField(format!("receipt attribute {t}")));
            }
            fields_set.set(field);
        }

        let missing = |n: &str| Error::MissingField(n.to_string());

        Ok(Payload {
            app_id: app_id.ok_or_else(|| missing("app id"))?,
            attested_certificate: attested_certificate
                .ok_or_else(|| missing("attested certificate"))?,
            client_hash: client_hash.ok_or_else(|| missing("client hash"))?,
            token: token.ok_or_else(|| missing("token"))?,
            receipt_type: receipt_type.ok_or_else(|| missing("receipt type"))?,
            environment,
            creation_time: creation_time.ok_or_else(|| missing("creation time"))?,
            risk_metric,
            not_before,
            expiration_time: expiration_time.ok_or_else(|| missing("expiration time"))?,
        })
    }

    fn decode_attribute<'a>(attr: &Any<'a>) -> Result<(u32, &'a [u8]), Error> {
        if attr.header.tag() != Tag::Sequence {
            return Err(Error::TypeMismatch(
                "receipt attribute MUST be SEQUENCE".to_string(),
            ));
        }

        match asn1::children(attr)?.as_slice() {
            [t, version, value] => {
                let t = asn1::to_u32(t, "attribute type")?;
                asn1::to_u32(version, "attribute version")?;

                if value.header.tag() != Tag::OctetString {
                    return Err(Error::TypeMismatch(format!(
                        "receipt attribute {t} value MUST be OCTET STRING"
                    )));
                }

                Ok((t, value.data))
            }
            other => Err(Error::Syntax(format!(
                "receipt attribute: expecting 3 elements, got {}",
                other.len()
            ))),
        }
    }
}
