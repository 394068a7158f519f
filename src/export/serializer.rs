//! Versioned artifact envelope
//!
//! Every persisted blob is wrapped in an envelope carrying magic bytes for the
//! artifact kind, a format version, the artifact id shared by an encoder/model
//! pair, and an FNV-1a checksum of the bincode payload. Stale or foreign files
//! are rejected at load time as corrupt instead of failing later at predict time.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{PricingError, Result};

/// Current envelope format version
pub const FORMAT_VERSION: u32 = 1;

/// What an envelope holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Encoder,
    Model,
}

impl ArtifactKind {
    fn magic(self) -> [u8; 4] {
        match self {
            ArtifactKind::Encoder => *b"VPEN",
            ArtifactKind::Model => *b"VPMD",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Encoder => write!(f, "encoder"),
            ArtifactKind::Model => write!(f, "model"),
        }
    }
}

/// Envelope header, readable without decoding the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub artifact_id: Uuid,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u32,
    header: ArtifactHeader,
    payload: Vec<u8>,
    checksum: u64,
}

/// FNV-1a over the payload bytes
fn compute_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ *byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Encode `value` into envelope bytes
pub fn encode_artifact<T: Serialize>(kind: ArtifactKind, artifact_id: Uuid, value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value)?;
    let envelope = Envelope {
        magic: kind.magic(),
        format_version: FORMAT_VERSION,
        header: ArtifactHeader {
            artifact_id,
            kind,
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        checksum: compute_checksum(&payload),
        payload,
    };
    Ok(bincode::serialize(&envelope)?)
}

/// Decode envelope bytes read from `path`; every failure is `ArtifactCorrupt`
pub fn decode_artifact<T: DeserializeOwned>(
    path: &Path,
    kind: ArtifactKind,
    bytes: &[u8],
) -> Result<(ArtifactHeader, T)> {
    let corrupt = |reason: String| PricingError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: Envelope = bincode::deserialize(bytes)
        .map_err(|e| corrupt(format!("unreadable envelope: {}", e)))?;

    if envelope.magic != kind.magic() {
        return Err(corrupt(format!("not a {} artifact (magic {:?})", kind, envelope.magic)));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {} (expected {})",
            envelope.format_version, FORMAT_VERSION
        )));
    }
    if envelope.header.kind != kind {
        return Err(corrupt(format!("header declares {} but {} was expected", envelope.header.kind, kind)));
    }
    if compute_checksum(&envelope.payload) != envelope.checksum {
        return Err(corrupt("checksum verification failed".to_string()));
    }

    let value = bincode::deserialize(&envelope.payload)
        .map_err(|e| corrupt(format!("undecodable {} payload: {}", kind, e)))?;
    Ok((envelope.header, value))
}

/// Read a blob, mapping a missing file to `ArtifactMissing`
pub fn read_blob(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PricingError::ArtifactMissing { path: path.to_path_buf() },
        _ => PricingError::IoError(e),
    })
}

/// Write through a sibling temp file and rename it into place
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

/// Encode and atomically write one artifact
pub fn save_artifact<T: Serialize>(path: &Path, kind: ArtifactKind, artifact_id: Uuid, value: &T) -> Result<()> {
    let bytes = encode_artifact(kind, artifact_id, value)?;
    write_atomic(path, &bytes)
}

/// Read and decode one artifact
pub fn load_artifact<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<(ArtifactHeader, T)> {
    let bytes = read_blob(path)?;
    decode_artifact(path, kind, &bytes)
}
