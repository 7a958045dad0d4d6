//! Modd Core - decoding, aggregation and video association for camcorder .modd sidecars

pub mod time;
pub mod sub_record;
pub mod metadata;
pub mod record_set;
pub mod video_file;
pub mod video_index;
pub mod scanner;
pub mod serde_fixed;

pub use time::{convert, LegacyZone};
pub use sub_record::SubRecord;
pub use metadata::{MetadataRecord, ModdDecoder};
pub use record_set::RecordSet;
pub use video_file::{ContainerKind, ContentHash, HashPolicy, VideoAssociator, VideoDescriptor};
pub use video_index::{AssociationFailure, IndexBuild, VideoIndex};
pub use scanner::{ScanFailure, ScanReport, SidecarScanner};

use std::path::PathBuf;

/// Result type for Modd Core operations
pub type Result<T> = std::result::Result<T, ModdError>;

/// Error types for Modd Core operations
#[derive(thiserror::Error, Debug)]
pub enum ModdError {
    #[error("malformed field {key}: {value:?}")]
    MalformedField { key: String, value: String },

    #[error("malformed sub-record {line:?}: {reason}")]
    MalformedSubRecord { line: String, reason: String },

    #[error("index {index} out of bounds for record set of length {len}")]
    OutOfBounds { index: usize, len: usize },

    #[error("no video file found next to sidecar {}", .sidecar.display())]
    VideoNotFound { sidecar: PathBuf },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timestamp {days} days (offset {offset}s) is outside the representable range")]
    Timestamp { days: f64, offset: i64 },

    #[error("Path error: {0}")]
    Path(String),

    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl ModdError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModdError::Io {
            path: path.into(),
            source,
        }
    }
}
