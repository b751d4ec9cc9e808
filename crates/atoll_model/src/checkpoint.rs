//! Placement-unit checkpoints.
//!
//! A checkpoint is a gzip-compressed binary dump of every unit's location
//! and fixed/locked flags, prefixed with a validated header (magic bytes,
//! format version, unit count). Dumps round-trip bit-exactly.
//!
//! Transient state is deliberately not recorded: callers run
//! [`PlacementModel::clear_transient_flags`] first, so `is_packed` and
//! fixed-but-not-locked flags are absent from checkpoints.

use crate::model::PlacementModel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying an Atoll checkpoint.
const CHECKPOINT_MAGIC: [u8; 4] = *b"ATOL";

/// Current checkpoint format version. Increment on breaking changes to
/// the header or payload format.
const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Errors that can occur while dumping or loading a checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// An I/O error on the checkpoint file.
    #[error("checkpoint I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Encoding or decoding the binary payload failed.
    #[error("checkpoint serialization error: {reason}")]
    Serialization {
        /// Why encoding/decoding failed.
        reason: String,
    },

    /// The file is not a valid checkpoint (bad magic, version, or shape).
    #[error("invalid checkpoint: {reason}")]
    Format {
        /// What validation failed.
        reason: String,
    },

    /// The checkpoint was taken from a different design.
    #[error("checkpoint has {found} units but the model has {expected}")]
    UnitCountMismatch {
        /// Units in the current model.
        expected: usize,
        /// Units recorded in the checkpoint.
        found: usize,
    },
}

/// Header prepended to every checkpoint for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointHeader {
    magic: [u8; 4],
    format_version: u32,
    unit_count: u64,
}

/// Per-unit persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointUnit {
    x: f64,
    y: f64,
    is_fixed: bool,
    is_locked: bool,
}

/// Dumps the model's placement units to `<path>.gz`.
///
/// Returns the path written. Callers run
/// [`PlacementModel::clear_transient_flags`] beforehand so transient flags
/// are not recorded.
pub fn dump_placement_units(
    model: &PlacementModel,
    path: &Path,
) -> Result<PathBuf, CheckpointError> {
    let units: Vec<CheckpointUnit> = model
        .units
        .iter()
        .map(|u| CheckpointUnit {
            x: u.x,
            y: u.y,
            is_fixed: u.is_fixed,
            is_locked: u.is_locked,
        })
        .collect();

    let header = CheckpointHeader {
        magic: CHECKPOINT_MAGIC,
        format_version: CHECKPOINT_FORMAT_VERSION,
        unit_count: units.len() as u64,
    };

    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CheckpointError::Serialization {
            reason: e.to_string(),
        })?;
    let payload = bincode::serde::encode_to_vec(&units, bincode::config::standard()).map_err(
        |e| CheckpointError::Serialization {
            reason: e.to_string(),
        },
    )?;

    // Layout: 4-byte header length (little-endian) + header + payload,
    // gzip-compressed as a whole.
    let mut raw = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    raw.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    raw.extend_from_slice(&header_bytes);
    raw.extend_from_slice(&payload);

    let out_path = gz_path(path);
    let file = std::fs::File::create(&out_path).map_err(|e| CheckpointError::Io {
        path: out_path.clone(),
        source: e,
    })?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(&raw).map_err(|e| CheckpointError::Io {
        path: out_path.clone(),
        source: e,
    })?;
    encoder.finish().map_err(|e| CheckpointError::Io {
        path: out_path.clone(),
        source: e,
    })?;
    Ok(out_path)
}

/// Loads placement units from a checkpoint, restoring locations and
/// fixed/locked flags onto the model's units.
pub fn load_placement_units(
    model: &mut PlacementModel,
    path: &Path,
) -> Result<(), CheckpointError> {
    let file = std::fs::File::open(path).map_err(|e| CheckpointError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut raw = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut raw)
        .map_err(|e| CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

    if raw.len() < 4 {
        return Err(CheckpointError::Format {
            reason: "file too short for header length".to_string(),
        });
    }
    let header_len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    if raw.len() < 4 + header_len {
        return Err(CheckpointError::Format {
            reason: "file too short for header".to_string(),
        });
    }

    let (header, _): (CheckpointHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| CheckpointError::Serialization {
                reason: e.to_string(),
            })?;
    if header.magic != CHECKPOINT_MAGIC {
        return Err(CheckpointError::Format {
            reason: "bad magic bytes".to_string(),
        });
    }
    if header.format_version != CHECKPOINT_FORMAT_VERSION {
        return Err(CheckpointError::Format {
            reason: format!("unsupported format version {}", header.format_version),
        });
    }

    let (units, _): (Vec<CheckpointUnit>, usize) =
        bincode::serde::decode_from_slice(&raw[4 + header_len..], bincode::config::standard())
            .map_err(|e| CheckpointError::Serialization {
                reason: e.to_string(),
            })?;

    if units.len() != model.units.len() {
        return Err(CheckpointError::UnitCountMismatch {
            expected: model.units.len(),
            found: units.len(),
        });
    }

    for (unit, saved) in model.units.iter_mut().zip(units) {
        unit.x = saved.x;
        unit.y = saved.y;
        unit.is_fixed = saved.is_fixed;
        unit.is_locked = saved.is_locked;
    }
    Ok(())
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}
