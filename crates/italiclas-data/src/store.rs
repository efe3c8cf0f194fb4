//! Save/load facility for cached artifacts.
//!
//! Every artifact (clean dataset, hyperparameters, fitted pipeline) is one
//! file addressed by its path. The file starts with a small header followed
//! by the encoded payload, optionally gzip-compressed:
//!
//! ```text
//! ┌────────┬────────┬─────────────┬────────────────┬──────────────────────┐
//! │ "ICLS" │ format │ compression │ schema (u16le) │ payload (maybe gzip) │
//! │ 4 B    │ 1 B    │ 1 B         │ 2 B            │ ...                  │
//! └────────┴────────┴─────────────┴────────────────┴──────────────────────┘
//! ```
//!
//! The schema version comes from [`Artifact::SCHEMA_VERSION`]. A file whose
//! header does not match the running code is reported as
//! [`ArtifactError::Incompatible`], which callers treat like a missing file
//! and recompute.
//!
//! # Example
//!
//! ```rust,ignore
//! use italiclas_data::{ArtifactStore, Compression};
//!
//! let store = ArtifactStore::new(Compression::Gzip);
//! store.save(&dataset, "artifacts/data/clean_data.bin")?;
//!
//! if store.is_cached::<CleanDataset>("artifacts/data/clean_data.bin") {
//!     let dataset: CleanDataset = store.load("artifacts/data/clean_data.bin")?;
//! }
//! ```

use crate::error::{ArtifactError, CodecError};
use flate2::Compression as GzLevel;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const MAGIC: [u8; 4] = *b"ICLS";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 8;

/// A value that can be persisted through the [`ArtifactStore`].
pub trait Artifact: Sized {
    /// Human-readable kind used in logs ("clean dataset", "pipeline", ...).
    const KIND: &'static str;

    /// Bump whenever the encoded layout changes.
    const SCHEMA_VERSION: u16;

    fn encode(&self) -> Result<Vec<u8>, CodecError>;

    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Encode a serde value with bincode, for [`Artifact`] implementations.
pub fn encode_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(CodecError::new)
}

/// Decode a serde value with bincode, for [`Artifact`] implementations.
pub fn decode_bincode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::new)
}

/// Payload compression applied when saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Store the encoded payload as-is.
    None,
    /// Gzip the encoded payload.
    #[default]
    Gzip,
}

impl Compression {
    fn flag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
        }
    }

    fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Self::None),
            1 => Some(Self::Gzip),
            _ => None,
        }
    }
}

/// Filesystem-backed artifact persistence.
///
/// The store is stateless apart from its compression setting, so it is
/// `Copy` and can be handed to every stage that needs it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStore {
    compression: Compression,
}

impl ArtifactStore {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Encode, optionally compress, and write an artifact.
    ///
    /// Parent directories are created as needed. The bytes are written to a
    /// temporary file in the destination directory and renamed into place,
    /// so a reader sees either the old file or the complete new one.
    ///
    /// # Errors
    ///
    /// - [`ArtifactError::Serialization`] if the value cannot be encoded
    /// - [`ArtifactError::Io`] if the path is not writable
    pub fn save<A: Artifact>(&self, artifact: &A, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let payload = artifact
            .encode()
            .map_err(|e| ArtifactError::Serialization(e.0))?;
        let body = match self.compression {
            Compression::None => payload,
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
                encoder.write_all(&payload)?;
                encoder.finish()?
            }
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(&header(self.compression, A::SCHEMA_VERSION))?;
        file.write_all(&body)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;

        debug!(
            "Saved {} to '{}' ({} bytes)",
            A::KIND,
            path.display(),
            body.len() + HEADER_LEN
        );
        Ok(())
    }

    /// Read, decompress, and decode an artifact.
    ///
    /// # Errors
    ///
    /// - [`ArtifactError::NotFound`] if no file exists at `path`
    /// - [`ArtifactError::Incompatible`] if the header version differs
    /// - [`ArtifactError::Deserialization`] if the content is malformed
    pub fn load<A: Artifact>(&self, path: impl AsRef<Path>) -> Result<A, ArtifactError> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactError::not_found(path));
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.len() < HEADER_LEN {
            return Err(deserialization(path, "file shorter than header"));
        }

        let (head, body) = bytes.split_at(HEADER_LEN);
        let compression = check_header(path, head, A::SCHEMA_VERSION)?;
        let payload = match compression {
            Compression::None => body.to_vec(),
            Compression::Gzip => {
                let mut payload = Vec::new();
                GzDecoder::new(body)
                    .read_to_end(&mut payload)
                    .map_err(|e| deserialization(path, e))?;
                payload
            }
        };

        let artifact = A::decode(&payload).map_err(|e| deserialization(path, e))?;
        debug!("Loaded {} from '{}'", A::KIND, path.display());
        Ok(artifact)
    }

    /// Load the artifact at `path` if there is a usable one.
    ///
    /// Returns `Ok(None)` when the file is missing or was written by another
    /// schema version, so the caller recomputes. Corrupt content is still an
    /// error.
    pub fn load_cached<A: Artifact>(&self, path: impl AsRef<Path>) -> Result<Option<A>, ArtifactError> {
        match self.load(path) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(e @ ArtifactError::Incompatible { .. }) => {
                warn!("{}; recomputing {}", e, A::KIND);
                Ok(None)
            }
            Err(ArtifactError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check whether a usable artifact of type `A` exists at `path`.
    ///
    /// Only the header is read: a file written by another schema version is
    /// not a cache hit, a truncated payload still is.
    pub fn is_cached<A: Artifact>(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut head = [0u8; HEADER_LEN];
        let read = File::open(path).and_then(|mut file| file.read_exact(&mut head));
        read.is_ok() && check_header(path, &head, A::SCHEMA_VERSION).is_ok()
    }
}

fn header(compression: Compression, schema_version: u16) -> [u8; HEADER_LEN] {
    let [lo, hi] = schema_version.to_le_bytes();
    [
        MAGIC[0],
        MAGIC[1],
        MAGIC[2],
        MAGIC[3],
        FORMAT_VERSION,
        compression.flag(),
        lo,
        hi,
    ]
}

fn check_header(path: &Path, head: &[u8], schema_version: u16) -> Result<Compression, ArtifactError> {
    if head[..4] != MAGIC {
        return Err(deserialization(path, "not an artifact file"));
    }
    if head[4] != FORMAT_VERSION {
        return Err(ArtifactError::Incompatible {
            path: path.to_path_buf(),
            reason: format!("format version {}, expected {}", head[4], FORMAT_VERSION),
        });
    }
    let found = u16::from_le_bytes([head[6], head[7]]);
    if found != schema_version {
        return Err(ArtifactError::Incompatible {
            path: path.to_path_buf(),
            reason: format!("schema version {found}, expected {schema_version}"),
        });
    }
    Compression::from_flag(head[5])
        .ok_or_else(|| deserialization(path, format!("unknown compression flag {}", head[5])))
}

fn deserialization(path: &Path, reason: impl ToString) -> ArtifactError {
    ArtifactError::Deserialization {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
