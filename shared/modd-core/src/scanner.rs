//! Recursive discovery and decoding of sidecar files

use crate::{ModdDecoder, ModdError, RecordSet, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A sidecar that could not be read or decoded
#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: ModdError,
}

/// Records decoded from a tree, plus the files that were skipped
#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: RecordSet,
    pub failures: Vec<ScanFailure>,
    pub files_seen: usize,
}

/// Walks a directory tree decoding every sidecar it finds
#[derive(Debug, Clone)]
pub struct SidecarScanner {
    decoder: ModdDecoder,
    extension: String,
    follow_links: bool,
    max_depth: Option<usize>,
}

impl Default for SidecarScanner {
    fn default() -> Self {
        Self::new(ModdDecoder::default())
    }
}

impl SidecarScanner {
    pub fn new(decoder: ModdDecoder) -> Self {
        Self {
            decoder,
            extension: "modd".to_string(),
            follow_links: false,
            max_depth: None,
        }
    }

    /// Sidecar extension to look for, without the dot; matched case-insensitively
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Check if a path has the sidecar extension
    pub fn is_sidecar(&self, path: &Path) -> bool {
        has_extension(path, &self.extension)
    }

    /// Decode one sidecar file
    pub async fn decode_file(&self, path: &Path) -> Result<crate::MetadataRecord> {
        let bytes = fs::read(path).await.map_err(|e| ModdError::io(path, e))?;
        let text = String::from_utf8_lossy(&bytes);
        self.decoder.decode(&text, path)
    }

    /// Scan `root` recursively. Unreadable entries and undecodable sidecars
    /// are reported in the result rather than aborting the scan.
    ///
    /// The directory walk runs on the blocking pool; decoding reads each
    /// sidecar asynchronously.
    pub async fn scan(&self, root: &Path) -> Result<ScanReport> {
        let is_dir = fs::metadata(root).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(ModdError::Path(format!(
                "Directory does not exist: {}",
                root.display()
            )));
        }

        let walk = Walk {
            root: root.to_path_buf(),
            extension: self.extension.clone(),
            follow_links: self.follow_links,
            max_depth: self.max_depth,
        };
        let (sidecars, walk_failures) = tokio::task::spawn_blocking(move || walk.run())
            .await
            .map_err(|e| ModdError::Task(e.to_string()))?;

        let mut report = ScanReport {
            failures: walk_failures,
            files_seen: sidecars.len(),
            ..ScanReport::default()
        };

        for path in sidecars {
            match self.decode_file(&path).await {
                Ok(record) => {
                    if !report.records.insert(record) {
                        debug!("Duplicate sidecar content at {}", path.display());
                    }
                }
                Err(error) => {
                    warn!("Failed to decode {}: {}", path.display(), error);
                    report.failures.push(ScanFailure { path, error });
                }
            }
        }

        info!(
            "📄 Decoded {} records from {} sidecars under {}",
            report.records.len(),
            report.files_seen,
            root.display()
        );
        Ok(report)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Blocking directory walk collecting sidecar paths
struct Walk {
    root: PathBuf,
    extension: String,
    follow_links: bool,
    max_depth: Option<usize>,
}

impl Walk {
    fn run(self) -> (Vec<PathBuf>, Vec<ScanFailure>) {
        let mut walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(self.follow_links);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut sidecars = Vec::new();
        let mut failures = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && has_extension(entry.path(), &self.extension) {
                        sidecars.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    warn!("Cannot read {}: {}", path.display(), e);
                    let error = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
                    failures.push(ScanFailure {
                        error: ModdError::io(&path, error),
                        path,
                    });
                }
            }
        }
        (sidecars, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_walk_filters_and_limits_depth() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join("top.MODD"), "").unwrap();
        std::fs::write(temp_dir.path().join("top.mp4"), "").unwrap();
        std::fs::write(nested.join("deep.modd"), "").unwrap();

        let walk = |max_depth| Walk {
            root: temp_dir.path().to_path_buf(),
            extension: "modd".to_string(),
            follow_links: false,
            max_depth,
        };

        let (all, failures) = walk(None).run();
        assert_eq!(all.len(), 2);
        assert!(failures.is_empty());

        let (shallow, _) = walk(Some(1)).run();
        assert_eq!(shallow.len(), 1);
        assert!(shallow[0].ends_with("top.MODD"));
    }
}
