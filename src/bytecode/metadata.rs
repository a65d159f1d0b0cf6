//! Trailing CBOR metadata that solc appends to runtime bytecode.
//!
//! Layout: `<code> <cbor map> <cbor length: u16 big-endian>`.

use minicbor::{data::Type, Decoder};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentHash {
    Ipfs(Vec<u8>),
    Bzzr0(Vec<u8>),
    Bzzr1(Vec<u8>),
}

/// Decoded metadata map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataHash {
    pub hash: Option<ContentHash>,
    pub solc: Option<semver::Version>,
    pub experimental: bool,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata is not a cbor map: {0:?}")]
    NotAMap(Type),
    #[error("metadata map has indefinite length")]
    IndefiniteMap,
    #[error("unexpected type of \"{key}\": {actual:?}")]
    InvalidValueType { key: String, actual: Type },
    #[error("invalid cbor: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

impl MetadataHash {
    /// Decodes the map at the start of `encoded`, returning it with the number of bytes used.
    pub fn from_cbor(encoded: &[u8]) -> Result<(Self, usize), MetadataError> {
        let mut d = Decoder::new(encoded);
        match d.datatype()? {
            Type::Map => {}
            ty => return Err(MetadataError::NotAMap(ty)),
        }
        let entries = d.map()?.ok_or(MetadataError::IndefiniteMap)?;

        let mut metadata = MetadataHash::default();
        for _ in 0..entries {
            let key = d.str()?.to_string();
            match key.as_str() {
                "ipfs" => metadata.hash = Some(ContentHash::Ipfs(d.bytes()?.to_vec())),
                "bzzr0" => metadata.hash = Some(ContentHash::Bzzr0(d.bytes()?.to_vec())),
                "bzzr1" => metadata.hash = Some(ContentHash::Bzzr1(d.bytes()?.to_vec())),
                "solc" => metadata.solc = decode_solc_version(&mut d, &key)?,
                "experimental" => metadata.experimental = d.bool()?,
                _ => d.skip()?,
            }
        }
        Ok((metadata, d.position()))
    }
}

fn decode_solc_version(d: &mut Decoder, key: &str) -> Result<Option<semver::Version>, MetadataError> {
    match d.datatype()? {
        Type::Bytes => match d.bytes()? {
            [major, minor, patch] => Ok(Some(semver::Version::new(
                *major as u64,
                *minor as u64,
                *patch as u64,
            ))),
            _ => Ok(None),
        },
        Type::String => Ok(semver::Version::parse(d.str()?).ok()),
        actual => Err(MetadataError::InvalidValueType {
            key: key.to_string(),
            actual,
        }),
    }
}

/// Splits `code` into the executable part and its metadata suffix
/// (cbor map plus the two length bytes). Returns no suffix if the trailing
/// length does not point to a well formed metadata map.
pub fn split_metadata(code: &[u8]) -> (&[u8], Option<&[u8]>) {
    let Some(length_offset) = code.len().checked_sub(2) else {
        return (code, None);
    };
    let cbor_length = u16::from_be_bytes([code[length_offset], code[length_offset + 1]]) as usize;
    if cbor_length == 0 {
        return (code, None);
    }
    let Some(cbor_start) = length_offset.checked_sub(cbor_length) else {
        return (code, None);
    };
    match MetadataHash::from_cbor(&code[cbor_start..length_offset]) {
        Ok((_, used)) if used == cbor_length => (&code[..cbor_start], Some(&code[cbor_start..])),
        _ => (code, None),
    }
}
