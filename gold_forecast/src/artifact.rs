//! On-disk model artifact.
//!
//! Layout: the 8-byte magic `GOLDFCST`, a little-endian `u32` format version,
//! then the [`ModelArtifact`] encoded with bincode's standard configuration.
//! The artifact carries the feature schema it was trained against and is
//! rejected at load time if that schema differs from the running build's.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::{
    features::{FeatureSchema, SchemaMismatch},
    forest::{ForestError, ForestParams, RandomForest},
};

pub const MAGIC: &[u8; 8] = b"GOLDFCST";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("{} is not a model artifact", path.display())]
    BadMagic { path: PathBuf },

    #[error("{} uses artifact format v{found}, this build reads v{supported}", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("failed to encode model: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: bincode::error::DecodeError,
    },

    #[error("{} has {extra} trailing bytes after the model", path.display())]
    TrailingBytes { path: PathBuf, extra: usize },

    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    #[error("model has {forest} input columns but its schema lists {schema}")]
    WidthMismatch { forest: usize, schema: usize },

    #[error("{} is corrupt: {source}", path.display())]
    Corrupt { path: PathBuf, source: ForestError },
}

/// Provenance recorded at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub symbol: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub n_examples: usize,
    pub trained_at: DateTime<Utc>,
    pub params: ForestParams,
    pub crate_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema: FeatureSchema,
    pub metadata: TrainingMetadata,
    pub forest: RandomForest,
}

impl ModelArtifact {
    /// Wraps a freshly fitted forest with the current feature schema.
    pub fn new(forest: RandomForest, metadata: TrainingMetadata) -> Self {
        Self {
            schema: FeatureSchema::current(),
            metadata,
            forest,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let body = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decodes and validates an artifact. `path` only labels errors.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, ArtifactError> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(ArtifactError::BadMagic {
                path: path.to_path_buf(),
            });
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let body = &bytes[HEADER_LEN..];
        let (artifact, read): (ModelArtifact, usize) =
            bincode::serde::decode_from_slice(body, bincode::config::standard()).map_err(
                |source| ArtifactError::Decode {
                    path: path.to_path_buf(),
                    source,
                },
            )?;
        if read != body.len() {
            return Err(ArtifactError::TrailingBytes {
                path: path.to_path_buf(),
                extra: body.len() - read,
            });
        }

        artifact.schema.ensure_compatible(&FeatureSchema::current())?;
        if artifact.forest.n_features() != artifact.schema.names.len() {
            return Err(ArtifactError::WidthMismatch {
                forest: artifact.forest.n_features(),
                schema: artifact.schema.names.len(),
            });
        }
        artifact
            .forest
            .validate()
            .map_err(|source| ArtifactError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(artifact)
    }

    /// Writes the artifact next to `path` and renames it into place, so an
    /// interrupted write never replaces a previously good model.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;
        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            trees = self.forest.n_trees(),
            fingerprint = %self.schema.fingerprint(),
            "model artifact saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ArtifactError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ArtifactError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_bytes(&bytes, path)
    }
}
