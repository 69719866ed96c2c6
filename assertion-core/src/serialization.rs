//! Canonical CBOR encoding for protocol messages and scheme configuration.
//!
//! Offers, requests, assertions and identities cross process boundaries, and
//! peers may re-derive or compare their encodings. Every value therefore has
//! exactly one byte representation.
//!
//! ## Canonicalization Rules (RFC 8949 Section 4.2)
//! 1. Integers and lengths encoded in minimal form
//! 2. No indefinite-length encoding
//! 3. A buffer holds exactly one data item (no trailing bytes)
//!
//! Nesting is capped at [`MAX_NESTING_DEPTH`] so hostile input cannot
//! exhaust the stack.

use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("CBOR encoding error: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("CBOR decoding error: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("Non-canonical CBOR: {0}")]
    NonCanonical(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SerializationError>;

/// Deepest array/map/tag nesting accepted on decode. Below ciborium's own
/// recursion limit, so the structural check always fails first.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Serialize a value to canonical CBOR bytes.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)?;
    verify_canonical(&buf)?;
    Ok(buf)
}

/// Deserialize a value from canonical CBOR bytes.
///
/// The input is untrusted, so its shape is checked before serde sees it.
pub fn from_canonical_cbor<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    verify_canonical(bytes)?;
    let value = ciborium::from_reader(bytes)?;
    Ok(value)
}

fn verify_canonical(bytes: &[u8]) -> Result<()> {
    let mut cursor = std::io::Cursor::new(bytes);
    verify_canonical_item(&mut cursor, 0)?;
    if cursor.position() != bytes.len() as u64 {
        return Err(SerializationError::NonCanonical("trailing bytes after data item"));
    }
    Ok(())
}

fn verify_canonical_item<R: Read>(reader: &mut R, depth: usize) -> Result<()> {
    if depth > MAX_NESTING_DEPTH {
        return Err(SerializationError::NonCanonical("nesting too deep"));
    }

    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;

    let major_type = (buf[0] & 0xE0) >> 5;
    let additional_info = buf[0] & 0x1F;

    if additional_info == 31 {
        return Err(SerializationError::NonCanonical(
            "indefinite-length encoding not allowed",
        ));
    }

    let length: u64 = match additional_info {
        0..=23 => additional_info as u64,
        24 => {
            let mut buf = [0u8; 1];
            reader.read_exact(&mut buf)?;
            if buf[0] < 24 && major_type != 7 {
                return Err(SerializationError::NonCanonical("non-minimal length"));
            }
            buf[0] as u64
        }
        25 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            let value = u16::from_be_bytes(buf) as u64;
            if value <= u8::MAX as u64 && major_type != 7 {
                return Err(SerializationError::NonCanonical("non-minimal length"));
            }
            value
        }
        26 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            let value = u32::from_be_bytes(buf) as u64;
            if value <= u16::MAX as u64 && major_type != 7 {
                return Err(SerializationError::NonCanonical("non-minimal length"));
            }
            value
        }
        27 => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            let value = u64::from_be_bytes(buf);
            if value <= u32::MAX as u64 && major_type != 7 {
                return Err(SerializationError::NonCanonical("non-minimal length"));
            }
            value
        }
        _ => return Err(SerializationError::NonCanonical("reserved additional info")),
    };

    match major_type {
        0 | 1 | 7 => {}
        2 | 3 => {
            // Skip string content without trusting the length for allocation
            let copied = std::io::copy(&mut Read::take(&mut *reader, length), &mut std::io::sink())?;
            if copied != length {
                return Err(SerializationError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
        }
        4 => {
            for _ in 0..length {
                verify_canonical_item(reader, depth + 1)?;
            }
        }
        5 => {
            for _ in 0..length {
                verify_canonical_item(reader, depth + 1)?; // Key
                verify_canonical_item(reader, depth + 1)?; // Value
            }
        }
        6 => {
            verify_canonical_item(reader, depth + 1)?;
        }
        _ => {}
    }

    Ok(())
}
