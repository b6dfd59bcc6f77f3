// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use crate::codec::DecodeError as Error;
use ciborium::de::from_reader;
use ciborium::Value;

pub const RP_ID_HASH_LEN: usize = 32;
pub const AAGUID_LEN: usize = 16;

const FLAGS_OFFSET: usize = RP_ID_HASH_LEN;
const SIGN_COUNT_OFFSET: usize = FLAGS_OFFSET + 1;
const FIXED_LEN: usize = SIGN_COUNT_OFFSET + 4;
const CRED_ID_LEN_LEN: usize = 2;

/// The flags byte of the authenticator data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// User present
    pub const UP: u8 = 0x01;
    /// User verified
    pub const UV: u8 = 0x04;
    /// Backup eligible
    pub const BE: u8 = 0x08;
    /// Backed up
    pub const BS: u8 = 0x10;
    /// Attested credential data included
    pub const AT: u8 = 0x40;
    /// Extension data included
    pub const ED: u8 = 0x80;

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit == bit
    }
}

impl From<u8> for Flags {
    fn from(v: u8) -> Self {
        Flags(v)
    }
}

/// Returns a copy of `raw` with the AT and ED flags cleared.
///
/// Assertions never carry attested credential data or extensions, but some
/// authenticators set the bits anyway.  Masking them makes the parser read
/// only the fixed-size header.  Inputs too short to hold a flags byte are
/// returned unchanged and rejected later by [`AuthenticatorData::decode`].
pub fn mask_assertion_flags(raw: &[u8]) -> Vec<u8> {
    let mut v = raw.to_vec();

    if let Some(f) = v.get_mut(FLAGS_OFFSET) {
        *f &= !(Flags::AT | Flags::ED);
    }

    v
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; AAGUID_LEN],
    pub credential_id: Vec<u8>,
    /// COSE_Key, when the authenticator supplied one
    pub credential_public_key: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; RP_ID_HASH_LEN],
    pub flags: Flags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions: Option<Value>,
}

fn malformed(what: &str) -> Error {
    Error::MalformedAuthenticatorData(what.to_string())
}

fn take<'a>(buf: &mut &'a [u8], n: usize, what: &str) -> Result<&'a [u8], Error> {
    if buf.len() < n {
        return Err(malformed(&format!(
            "{what}: need {n} bytes, {} available",
            buf.len()
        )));
    }

    let (head, tail) = buf.split_at(n);
    *buf = tail;

    Ok(head)
}

fn take_cbor(buf: &mut &[u8], what: &str) -> Result<Value, Error> {
    from_reader(buf).map_err(|e| malformed(&format!("{what}: {e}")))
}

impl AuthenticatorData {
    /// Decode authenticator data.  Bytes following the declared structure
    /// are ignored.
    pub fn decode(buf: &[u8]) -> Result<AuthenticatorData, Error> {
        let mut rest = buf;

        if rest.len() < FIXED_LEN {
            return Err(malformed(&format!(
                "expecting at least {FIXED_LEN} bytes, got {}",
                rest.len()
            )));
        }

        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(take(&mut rest, RP_ID_HASH_LEN, "rpIdHash")?);

        let flags = Flags::from(take(&mut rest, 1, "flags")?[0]);

        let mut sign_count = [0u8; 4];
        sign_count.copy_from_slice(take(&mut rest, 4, "signCount")?);
        let sign_count = u32::from_be_bytes(sign_count);

        let attested_credential_data = if flags.contains(Flags::AT) {
            Some(Self::decode_attested_credential_data(&mut rest)?)
        } else {
            None
        };

        let extensions = if flags.contains(Flags::ED) {
            Some(take_cbor(&mut rest, "extensions")?)
        } else {
            None
        };

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    fn decode_attested_credential_data(
        rest: &mut &[u8],
    ) -> Result<AttestedCredentialData, Error> {
        let mut aaguid = [0u8; AAGUID_LEN];
        aaguid.copy_from_slice(take(rest, AAGUID_LEN, "aaguid")?);

        let mut len = [0u8; CRED_ID_LEN_LEN];
        len.copy_from_slice(take(rest, CRED_ID_LEN_LEN, "credentialIdLength")?);
        let len = usize::from(u16::from_be_bytes(len));

        let credential_id = take(rest, len, "credentialId")?.to_vec();

        let credential_public_key = if rest.is_empty() {
            None
        } else {
            Some(take_cbor(rest, "credentialPublicKey")?)
        };

        Ok(AttestedCredentialData {
            aaguid,
            credential_id,
            credential_public_key,
        })
    }
}
