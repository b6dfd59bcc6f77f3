// Copyright 2024 Contributors to the appattest project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use asn1_rs::{Any, Class, FromDer, Tag};

fn parse_any(input: &[u8]) -> Result<(&[u8], Any<'_>), Error> {
    Any::from_der(input).map_err(|e| Error::Asn1(e.to_string()))
}

/// Read one TLV from the front of `input`, requiring a universal `tag`.
/// Returns the unread remainder together with the decoded element.
pub fn expect<'a>(input: &'a [u8], tag: Tag, n: &str) -> Result<(&'a [u8], Any<'a>), Error> {
    let (rest, any) = parse_any(input)?;

    if any.header.class() != Class::Universal || any.header.tag() != tag {
        return Err(Error::Asn1(format!(
            "{n}: expecting {tag:?}, got {:?}",
            any.header.tag()
        )));
    }

    Ok((rest, any))
}

/// Split the content of a constructed element into its direct children
pub fn children<'a>(parent: &Any<'a>) -> Result<Vec<Any<'a>>, Error> {
    let mut rest: &'a [u8] = parent.data;
    let mut out = Vec::new();

    while !rest.is_empty() {
        let (r, child) = parse_any(rest)?;
        out.push(child);
        rest = r;
    }

    Ok(out)
}

/// The content octets of a DER OCTET STRING
pub fn octet_string<'a>(input: &'a [u8], n: &str) -> Result<&'a [u8], Error> {
    let (rest, any) = expect(input, Tag::OctetString, n)?;

    if !rest.is_empty() {
        return Err(Error::Asn1(format!("{n}: trailing data after OCTET STRING")));
    }

    Ok(any.data)
}

/// Decode a non-negative INTEGER that fits into 32 bits
pub fn to_u32(any: &Any<'_>, n: &str) -> Result<u32, Error> {
    if any.header.tag() != Tag::Integer {
        return Err(Error::Asn1(format!("{n}: expecting INTEGER")));
    }

    let mut bytes = any.data;

    match bytes.first() {
        None => return Err(Error::Asn1(format!("{n}: empty INTEGER"))),
        Some(b) if b & 0x80 != 0 => {
            return Err(Error::Asn1(format!("{n}: negative INTEGER")))
        }
        Some(0) if bytes.len() > 1 => bytes = &bytes[1..],
        _ => {}
    }

    if bytes.len() > 4 {
        return Err(Error::Asn1(format!("{n}: INTEGER out of range")));
    }

    Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Walk the structure App Attest uses to carry values inside X.509
/// extensions and return the octets of the element tagged `tag_no`:
///
/// ```text
/// SEQUENCE
///     [tag_no] (TAGGED OBJECT)
///         OCTET STRING
/// ```
///
/// `seq` is the extension value with its outer OCTET STRING already removed.
pub fn tagged_octet_string(seq: &[u8], tag_no: u32) -> Result<Vec<u8>, Error> {
    let (_, sequence) = expect(seq, Tag::Sequence, "extension value")?;

    let tagged = children(&sequence)?
        .into_iter()
        .find(|c| c.header.class() == Class::ContextSpecific && c.header.tag().0 == tag_no)
        .ok_or_else(|| Error::Asn1(format!("no element tagged [{tag_no}]")))?;

    if !tagged.header.is_constructed() {
        return Err(Error::Asn1(format!("[{tag_no}] MUST be explicitly tagged")));
    }

    Ok(octet_string(tagged.data, &format!("[{tag_no}]"))?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // SEQUENCE { [1] { OCTET STRING 16caf3...7f } } as found in a credential
    // certificate's nonce extension
    const TEST_NONCE_EXT: [u8; 38] = hex!(
        "3024a122042016caf3e7972be45b815a82f0dff06d03150d5d5c2e1b5f98aea1dbddae27977f"
    );

    // SEQUENCE with several high-numbered tags, OS version at [1400]
    const TEST_OS_VERSION_EXT: [u8; 74] = hex!(
        "3048bf8a7808040631372e352e31bf885007020500ffffffffbf8a7b0704053231463930"
        "bf8a7d08040631372e352e31bf8a7e03020100bf8b0c0f040d32312e362e39302e302e302c30"
    );

    #[test]
    fn nonce_extension() {
        let nonce = tagged_octet_string(&TEST_NONCE_EXT, 1).unwrap();

        assert_eq!(
            nonce,
            hex!("16caf3e7972be45b815a82f0dff06d03150d5d5c2e1b5f98aea1dbddae27977f")
        );
    }

    #[test]
    fn os_version_extension() {
        let v = tagged_octet_string(&TEST_OS_VERSION_EXT, 1400).unwrap();

        assert_eq!(v, b"17.5.1");
    }

    #[test]
    fn missing_tag() {
        let r = tagged_octet_string(&TEST_NONCE_EXT, 2);

        assert!(matches!(r, Err(Error::Asn1(_))));
    }

    #[test]
    fn truncated_extension() {
        for n in [0, 1, 2, 10, TEST_NONCE_EXT.len() - 1] {
            let r = tagged_octet_string(&TEST_NONCE_EXT[..n], 1);
            assert!(matches!(r, Err(Error::Asn1(_))), "prefix of {n} bytes");
        }
    }

    #[test]
    fn not_a_sequence() {
        // OCTET STRING 'abc'
        let r = tagged_octet_string(&hex!("0403616263"), 1);

        assert!(matches!(r, Err(Error::Asn1(_))));
    }

    #[test]
    fn integers() {
        let cases: [(&[u8], Option<u32>); 5] = [
            (&hex!("020102"), Some(2)),
            (&hex!("02020080"), Some(128)),
            (&hex!("020401020304"), Some(0x01020304)),
            (&hex!("0201ff"), None),
            (&hex!("02050102030405"), None),
        ];

        for (der, want) in cases {
            let (_, any) = expect(der, Tag::Integer, "test").unwrap();
            assert_eq!(to_u32(&any, "test").ok(), want, "{}", hex::encode(der));
        }
    }
}
