//! Whole-file snapshot format for the backing file.
//!
//! On-disk format:
//! ```text
//! [4 bytes: magic "SHLF"]
//! [1 byte:  format version]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized HashMap<K, V>)]
//! ```
//!
//! The file is always rewritten in full. There is no append path.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::traits::{Key, Value};

const MAGIC: &[u8; 4] = b"SHLF";
const FORMAT_VERSION: u8 = 1;

/// Header size: 4 bytes magic + 1 byte version + 4 bytes CRC.
const HEADER_SIZE: usize = 9;

/// Serialize a full mapping into snapshot bytes.
pub fn encode<K: Key, V: Value>(records: &HashMap<K, V>) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(records).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let crc = crc32fast::hash(&payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode snapshot bytes read from `path`.
///
/// `path` is only used to label errors.
pub fn decode<K: Key, V: Value>(path: &Path, bytes: &[u8]) -> StoreResult<HashMap<K, V>> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::corrupt(
            path,
            format!("{} bytes is shorter than the snapshot header", bytes.len()),
        ));
    }
    if &bytes[..4] != MAGIC {
        return Err(StoreError::corrupt(path, "bad magic"));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(StoreError::corrupt(
            path,
            format!("unsupported format version {}", bytes[4]),
        ));
    }

    let expected = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let payload = &bytes[HEADER_SIZE..];
    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(StoreError::corrupt(
            path,
            format!("CRC mismatch: expected {expected:#010x}, got {actual:#010x}"),
        ));
    }

    bincode::deserialize(payload).map_err(|e| StoreError::corrupt(path, e.to_string()))
}

/// Read and decode the snapshot at `path`.
pub fn read_snapshot<K: Key, V: Value>(path: &Path) -> StoreResult<HashMap<K, V>> {
    let bytes = fs::read(path)?;
    decode(path, &bytes)
}

/// Atomically replace the snapshot at `path` with `records`.
///
/// The bytes go to a temp file in the same directory, which is synced and
/// then renamed over `path`. Readers see either the old or the new snapshot.
pub fn write_snapshot<K: Key, V: Value>(path: &Path, records: &HashMap<K, V>) -> StoreResult<()> {
    let bytes = encode(records)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

    trace!(path = %path.display(), len = bytes.len(), "snapshot written");
    Ok(())
}
