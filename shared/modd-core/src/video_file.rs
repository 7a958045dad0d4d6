//! Locating the video a sidecar describes and fingerprinting its content

use crate::{serde_fixed, MetadataRecord, ModdError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Extension order used when looking for the video next to a sidecar
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    ".mpg", ".MPG", ".mpeg", ".MPEG", ".mp4", ".MP4", ".m4v", ".M4V", ".mkv", ".MKV",
];

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Container family, inferred from the file extension only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    #[serde(rename = "mpeg")]
    Mpeg,
    #[serde(rename = "mp4")]
    Mp4,
    #[serde(rename = "matroska")]
    Mkv,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ContainerKind {
    /// Classify an extension, with or without the leading dot
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mpg" | "mpeg" => ContainerKind::Mpeg,
            "mp4" | "m4v" => ContainerKind::Mp4,
            "mkv" => ContainerKind::Mkv,
            _ => ContainerKind::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(ContainerKind::Unknown)
    }
}

/// SHA-256 digest of (part of) a video file
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash an in-memory buffer
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", Output::<Sha256>::from(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self)
    }
}

impl FromStr for ContentHash {
    type Err = ModdError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ModdError::InvalidHash(s.to_string());
        if s.len() != 64 || !s.is_ascii() {
            return Err(invalid());
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// How much of a video file goes into its content hash.
///
/// `Prefix` is the partial fingerprint the legacy tool used: the first
/// `size / divisor` bytes. It is cheap and good enough to tell this
/// dataset's clips apart, but it is not collision resistant against crafted
/// input. `FullFile` hashes everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HashPolicy {
    Prefix { divisor: u64 },
    FullFile,
}

impl Default for HashPolicy {
    fn default() -> Self {
        HashPolicy::Prefix { divisor: 10 }
    }
}

impl HashPolicy {
    /// Number of leading bytes to hash for a file of `file_size` bytes
    pub fn read_length(&self, file_size: u64) -> u64 {
        match self {
            HashPolicy::Prefix { divisor } => file_size / (*divisor).max(1),
            HashPolicy::FullFile => file_size,
        }
    }
}

/// A video file matched to a sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    /// File name of the matched video
    pub name: String,

    /// Resolved location of the video
    pub matched_path: PathBuf,

    /// Size of the video on disk
    pub size: u64,

    /// Copied from the linked record's actual timestamp
    pub creation_time: Option<DateTime<Utc>>,

    #[serde(with = "serde_fixed")]
    pub duration_seconds: f64,

    pub container_kind: ContainerKind,

    pub content_hash: ContentHash,

    /// The record this video was matched from
    pub linked_record: Arc<MetadataRecord>,
}

impl VideoDescriptor {
    /// Whether the size written in the sidecar disagrees with the file on disk
    pub fn declared_size_is_stale(&self) -> bool {
        self.linked_record.file_size_bytes != self.size
    }
}

/// Finds the video for a sidecar and hashes it
#[derive(Debug, Clone)]
pub struct VideoAssociator {
    extensions: Vec<String>,
    hash_policy: HashPolicy,
    read_timeout: Duration,
}

impl Default for VideoAssociator {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoAssociator {
    pub fn new() -> Self {
        Self {
            extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            hash_policy: HashPolicy::default(),
            read_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_hash_policy(mut self, policy: HashPolicy) -> Self {
        self.hash_policy = policy;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn hash_policy(&self) -> HashPolicy {
        self.hash_policy
    }

    /// Find the first existing `<dir>/<stem><ext>` in extension order
    pub async fn locate(&self, sidecar: &Path) -> Option<PathBuf> {
        let stem = sidecar.file_stem()?.to_string_lossy().into_owned();
        let directory = sidecar.parent().unwrap_or(Path::new("."));

        for ext in &self.extensions {
            let candidate = directory.join(format!("{}{}", stem, ext));
            if let Ok(meta) = fs::metadata(&candidate).await {
                if meta.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Match a record to its video, classify it and compute its content hash
    pub async fn associate(&self, record: Arc<MetadataRecord>) -> Result<VideoDescriptor> {
        let matched_path = self
            .locate(&record.source_path)
            .await
            .ok_or_else(|| ModdError::VideoNotFound {
                sidecar: record.source_path.clone(),
            })?;

        let size = fs::metadata(&matched_path)
            .await
            .map_err(|e| ModdError::io(&matched_path, e))?
            .len();

        let content_hash = self.hash_file(&matched_path, size).await?;

        let descriptor = VideoDescriptor {
            name: matched_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            container_kind: ContainerKind::from_path(&matched_path),
            matched_path,
            size,
            creation_time: record.actual_timestamp,
            duration_seconds: record.duration_seconds,
            content_hash,
            linked_record: record,
        };

        if descriptor.declared_size_is_stale() {
            warn!(
                "Sidecar {} declares {} bytes but {} is {} bytes",
                descriptor.linked_record.source_path.display(),
                descriptor.linked_record.file_size_bytes,
                descriptor.matched_path.display(),
                descriptor.size
            );
        }

        debug!("Matched {} -> {} ({})", descriptor.linked_record.display_name, descriptor.name, descriptor.content_hash);
        Ok(descriptor)
    }

    /// Hash the leading bytes selected by the policy for a file of
    /// `file_size` bytes.
    ///
    /// The read timeout bounds the open and each chunk read separately, so a
    /// slow but progressing disk is fine while a stalled one fails with
    /// `ErrorKind::TimedOut`. A file shorter than the hashed length fails with
    /// `ErrorKind::UnexpectedEof`.
    pub async fn hash_file(&self, path: &Path, file_size: u64) -> Result<ContentHash> {
        let length = self.hash_policy.read_length(file_size);
        let limit = self.read_timeout;

        let mut file = within(limit, path, fs::File::open(path)).await?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];
        let mut remaining = length;

        while remaining > 0 {
            let want = remaining.min(READ_CHUNK_SIZE as u64) as usize;
            within(limit, path, file.read_exact(&mut buffer[..want])).await?;
            hasher.update(&buffer[..want]);
            remaining -= want as u64;
        }

        Ok(ContentHash(hasher.finalize().into()))
    }
}

/// Run one I/O step under the read timeout
async fn within<T>(
    limit: Duration,
    path: &Path,
    step: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result.map_err(|e| ModdError::io(path, e)),
        Err(_) => Err(ModdError::io(
            path,
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no progress reading within {:?}", limit),
            ),
        )),
    }
}
