// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use bitmask::*;
use ciborium::de::from_reader;
use ciborium::ser::into_writer;
use ciborium::Value;

/// The only attestation statement format App Attest produces
pub const APP_ATTEST_FORMAT: &str = "apple-appattest";

const FMT_LABEL: &str = "fmt";
const ATT_STMT_LABEL: &str = "attStmt";
const AUTH_DATA_LABEL: &str = "authData";
const X5C_LABEL: &str = "x5c";
const RECEIPT_LABEL: &str = "receipt";
const SIGNATURE_LABEL: &str = "signature";
const AUTHENTICATOR_DATA_LABEL: &str = "authenticatorData";

pub(crate) fn to_bstr(v: &Value, n: &str) -> Result<Vec<u8>, Error> {
    match v.as_bytes() {
        Some(b) => Ok(b.clone()),
        None => Err(Error::TypeMismatch(format!("{n} MUST be bstr"))),
    }
}

pub(crate) fn to_tstr(v: &Value, n: &str) -> Result<String, Error> {
    match v.as_text() {
        Some(t) => Ok(t.to_string()),
        None => Err(Error::TypeMismatch(format!("{n} MUST be tstr"))),
    }
}

fn to_text_key<'a>(k: &'a Value, n: &str) -> Result<&'a str, Error> {
    k.as_text()
        .ok_or_else(|| Error::Syntax(format!("expecting text key in {n}")))
}

fn decode_map(buf: &[u8], n: &str) -> Result<Vec<(Value, Value)>, Error> {
    let v: Value = from_reader(buf).map_err(|e| Error::Syntax(e.to_string()))?;

    match v {
        Value::Map(contents) => Ok(contents),
        _ => Err(Error::TypeMismatch(format!("{n} MUST be map"))),
    }
}

fn encode_value(v: &Value) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    into_writer(v, &mut buf).map_err(|e| Error::Syntax(e.to_string()))?;
    Ok(buf)
}

bitmask! {
    #[derive(Debug)]
    mask StmtFieldsSet: u8 where flags StmtFields {
        X5c     = 0x01,
        Receipt = 0x02,
    }
}

/// The `attStmt` member of an attestation object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationStatement {
    /// Certificate chain, credential certificate first
    pub x5c: Vec<Vec<u8>>,
    /// PKCS#7 signed receipt
    pub receipt: Vec<u8>,
}

impl AttestationStatement {
    fn decode(v: &Value) -> Result<AttestationStatement, Error> {
        let contents = v
            .as_map()
            .ok_or_else(|| Error::TypeMismatch("attStmt MUST be map".to_string()))?;

        let mut stmt = AttestationStatement {
            x5c: Vec::new(),
            receipt: Vec::new(),
        };
        let mut fields_set = StmtFieldsSet::none();

        for (k, v) in contents.iter() {
            match to_text_key(k, "attStmt")? {
                X5C_LABEL => {
                    if fields_set.contains(StmtFields::X5c) {
                        return Err(Error::DuplicatedField(X5C_LABEL.to_string()));
                    }
                    stmt.set_x5c(v)?;
                    fields_set.set(StmtFields::X5c);
                }
                RECEIPT_LABEL => {
                    if fields_set.contains(StmtFields::Receipt) {
                        return Err(Error::DuplicatedField(RECEIPT_LABEL.to_string()));
                    }
                    stmt.receipt = to_bstr(v, RECEIPT_LABEL)?;
                    fields_set.set(StmtFields::Receipt);
                }
                _ => continue,
            }
        }

        let mandatory_fields = [
            (StmtFields::X5c, X5C_LABEL),
            (StmtFields::Receipt, RECEIPT_LABEL),
        ];

        for (f, n) in mandatory_fields.iter() {
            if !fields_set.contains(*f) {
                return Err(Error::MissingField(n.to_string()));
            }
        }

        Ok(stmt)
    }

    fn set_x5c(&mut self, v: &Value) -> Result<(), Error> {
        let certs = v
            .as_array()
            .ok_or_else(|| Error::TypeMismatch("x5c MUST be array".to_string()))?;

        if certs.is_empty() {
            return Err(Error::Syntax("x5c: expecting at least one certificate".to_string()));
        }

        for (i, c) in certs.iter().enumerate() {
            self.x5c.push(to_bstr(c, &format!("x5c[{i}]"))?);
        }

        Ok(())
    }

    fn to_value(&self) -> Value {
        Value::Map(vec![
            (
                Value::Text(X5C_LABEL.to_string()),
                Value::Array(self.x5c.iter().cloned().map(Value::Bytes).collect()),
            ),
            (
                Value::Text(RECEIPT_LABEL.to_string()),
                Value::Bytes(self.receipt.clone()),
            ),
        ])
    }
}

bitmask! {
    #[derive(Debug)]
    mask AttestationFieldsSet: u8 where flags AttestationFields {
        Fmt      = 0x01,
        AttStmt  = 0x02,
        AuthData = 0x04,
    }
}

/// The CBOR map produced by `attestKey`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationObject {
    pub fmt: String,
    pub att_stmt: AttestationStatement,
    /// Raw authenticator data, kept verbatim since the nonce is computed over it
    pub auth_data: Vec<u8>,
}

impl AttestationObject {
    /// Decode a CBOR encoded attestation object
    pub fn decode(buf: &[u8]) -> Result<AttestationObject, Error> {
        let contents = decode_map(buf, "attestation object")?;

        let mut fmt = None;
        let mut att_stmt = None;
        let mut auth_data = None;
        let mut fields_set = AttestationFieldsSet::none();

        for (k, v) in contents.iter() {
            let (field, label) = match to_text_key(k, "attestation object")? {
                FMT_LABEL => {
                    fmt = Some(to_tstr(v, FMT_LABEL)?);
                    (AttestationFields::Fmt, FMT_LABEL)
                }
                ATT_STMT_LABEL => {
                    att_stmt = Some(AttestationStatement::decode(v)?);
                    (AttestationFields::AttStmt, ATT_STMT_LABEL)
                }
                AUTH_DATA_LABEL => {
                    auth_data = Some(to_bstr(v, AUTH_DATA_LABEL)?);
                    (AttestationFields::AuthData, AUTH_DATA_LABEL)
                }
                _ => continue,
            };

            if fields_set.contains(field) {
                return Err(Error::DuplicatedField(label.to_string()));
            }
            fields_set.set(field);
        }

        Ok(AttestationObject {
            fmt: fmt.ok_or_else(|| Error::MissingField(FMT_LABEL.to_string()))?,
            att_stmt: att_stmt.ok_or_else(|| Error::MissingField(ATT_STMT_LABEL.to_string()))?,
            auth_data: auth_data
                .ok_or_else(|| Error::MissingField(AUTH_DATA_LABEL.to_string()))?,
        })
    }

    /// Encode the attestation object as a CBOR map
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        encode_value(&Value::Map(vec![
            (
                Value::Text(FMT_LABEL.to_string()),
                Value::Text(self.fmt.clone()),
            ),
            (
                Value::Text(ATT_STMT_LABEL.to_string()),
                self.att_stmt.to_value(),
            ),
            (
                Value::Text(AUTH_DATA_LABEL.to_string()),
                Value::Bytes(self.auth_data.clone()),
            ),
        ]))
    }

    /// The credential certificate, i.e., the first entry in x5c
    pub fn credential_certificate(&self) -> &[u8] {
        // x5c is never empty on a decoded object
        self.att_stmt.x5c.first().map(Vec::as_slice).unwrap_or_default()
    }
}

bitmask! {
    #[derive(Debug)]
    mask AssertionFieldsSet: u8 where flags AssertionFields {
        Signature         = 0x01,
        AuthenticatorData = 0x02,
    }
}

/// The CBOR map produced by `generateAssertion`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionEnvelope {
    /// DER encoded ECDSA signature
    pub signature: Vec<u8>,
    pub authenticator_data: Vec<u8>,
}

impl AssertionEnvelope {
    /// Decode a CBOR encoded assertion
    pub fn decode(buf: &[u8]) -> Result<AssertionEnvelope, Error> {
        let contents = decode_map(buf, "assertion")?;

        let mut signature = None;
        let mut authenticator_data = None;
        let mut fields_set = AssertionFieldsSet::none();

        for (k, v) in contents.iter() {
            let (field, label) = match to_text_key(k, "assertion")? {
                SIGNATURE_LABEL => {
                    signature = Some(to_bstr(v, SIGNATURE_LABEL)?);
                    (AssertionFields::Signature, SIGNATURE_LABEL)
                }
                AUTHENTICATOR_DATA_LABEL => {
                    authenticator_data = Some(to_bstr(v, AUTHENTICATOR_DATA_LABEL)?);
                    (AssertionFields::AuthenticatorData, AUTHENTICATOR_DATA_LABEL)
                }
                _ => continue,
            };

            if fields_set.contains(field) {
                return Err(Error::DuplicatedField(label.to_string()));
            }
            fields_set.set(field);
        }

        Ok(AssertionEnvelope {
            signature: signature
                .ok_or_else(|| Error::MissingField(SIGNATURE_LABEL.to_string()))?,
            authenticator_data: authenticator_data
                .ok_or_else(|| Error::MissingField(AUTHENTICATOR_DATA_LABEL.to_string()))?,
        })
    }

    /// Encode the assertion as a CBOR map
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        encode_value(&Value::Map(vec![
            (
                Value::Text(SIGNATURE_LABEL.to_string()),
                Value::Bytes(self.signature.clone()),
            ),
            (
                Value::Text(AUTHENTICATOR_DATA_LABEL.to_string()),
                Value::Bytes(self.authenticator_data.clone()),
            ),
        ]))
    }
}
