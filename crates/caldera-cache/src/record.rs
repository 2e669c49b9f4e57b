//! On-disk record format.
//!
//! `[magic: 4][version: u16 LE][len: u32 LE][bincode: CacheRecord][crc32: u32 LE]`
//!
//! `len` counts the bincode payload only; the checksum covers the payload.
//! Anything that fails these checks is reported as corrupt and never
//! returned to a caller.

use std::sync::Arc;

use caldera_rfc::rfc::ical::expand::Bounds;
use caldera_rfc::rfc::ical::object::CalendarObject;
use serde::{Deserialize, Serialize};

const MAGIC: &[u8; 4] = b"CLDC";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2 + 4;
const CHECKSUM_LEN: usize = 4;

/// The cached form of one object: its model and precomputed bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedObject {
    pub object: CalendarObject,
    pub bounds: Bounds,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    identity: &'a str,
    fingerprint: &'a str,
    entry: &'a CachedObject,
}

#[derive(Deserialize)]
struct Record {
    identity: String,
    fingerprint: String,
    entry: CachedObject,
}

/// Result of reading a record for an (identity, fingerprint) pair.
#[derive(Debug, Clone)]
pub enum Lookup {
    Hit(Arc<CachedObject>),
    Miss,
    /// A record exists for an older content version.
    Stale {
        stored: String,
    },
    /// The record failed validation and must be ignored.
    Corrupt(String),
}

/// ## Summary
/// Encodes a record for `identity` at `fingerprint`.
///
/// ## Errors
/// Returns the bincode error if serialization fails or the payload does not
/// fit the length prefix.
pub(crate) fn encode(
    identity: &str,
    fingerprint: &str,
    entry: &CachedObject,
) -> bincode::Result<Vec<u8>> {
    let payload = bincode::serialize(&RecordRef {
        identity,
        fingerprint,
        entry,
    })?;
    let len = u32::try_from(payload.len())
        .map_err(|e| Box::new(bincode::ErrorKind::Custom(format!("record too large: {e}"))))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&len.to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(bytes)
}

/// ## Summary
/// Validates `bytes` and classifies them against the requested identity
/// and fingerprint.
pub(crate) fn decode(bytes: &[u8], identity: &str, fingerprint: &str) -> Lookup {
    match decode_record(bytes) {
        Ok(record) if record.identity != identity => Lookup::Corrupt(format!(
            "record belongs to {}, not {identity}",
            record.identity
        )),
        Ok(record) if record.fingerprint != fingerprint => Lookup::Stale {
            stored: record.fingerprint,
        },
        Ok(record) => Lookup::Hit(Arc::new(record.entry)),
        Err(reason) => Lookup::Corrupt(reason),
    }
}

/// Reads only the stored fingerprint, for writers re-checking under lock.
pub(crate) fn stored_fingerprint(bytes: &[u8]) -> Option<String> {
    decode_record(bytes).ok().map(|record| record.fingerprint)
}

fn decode_record(bytes: &[u8]) -> Result<Record, String> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(format!("record truncated at {} bytes", bytes.len()));
    }
    let (header, rest) = bytes.split_at(HEADER_LEN);
    if !header.starts_with(MAGIC) {
        return Err("bad magic".to_string());
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {version}"));
    }
    let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
    let len = usize::try_from(len).map_err(|e| e.to_string())?;
    if rest.len() != len + CHECKSUM_LEN {
        return Err(format!(
            "length mismatch: header says {len}, found {}",
            rest.len().saturating_sub(CHECKSUM_LEN)
        ));
    }

    let (payload, checksum) = rest.split_at(len);
    let stored = u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
    if stored != crc32fast::hash(payload) {
        return Err("checksum mismatch".to_string());
    }

    bincode::deserialize::<Record>(payload).map_err(|e| format!("undecodable payload: {e}"))
}
