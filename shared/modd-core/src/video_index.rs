//! Content-addressed index of associated videos

use crate::{ContentHash, MetadataRecord, ModdError, RecordSet, VideoAssociator, VideoDescriptor};
use futures::stream::{self, StreamExt};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Videos keyed by content hash. A later insert with the same hash replaces
/// the earlier one.
#[derive(Debug, Clone, Default)]
pub struct VideoIndex {
    data: BTreeMap<ContentHash, VideoDescriptor>,
}

/// A record that could not be matched or hashed
#[derive(Debug)]
pub struct AssociationFailure {
    pub sidecar: PathBuf,
    pub error: ModdError,
}

/// Outcome of building an index from a record set
#[derive(Debug, Default)]
pub struct IndexBuild {
    pub index: VideoIndex,
    pub failures: Vec<AssociationFailure>,
}

impl VideoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the descriptor's hash, returning whatever it displaced
    pub fn insert(&mut self, descriptor: VideoDescriptor) -> Option<VideoDescriptor> {
        self.data.insert(descriptor.content_hash, descriptor)
    }

    pub fn get(&self, hash: &ContentHash) -> Option<&VideoDescriptor> {
        self.data.get(hash)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &VideoDescriptor> {
        self.data.values()
    }

    /// Associate every record in `set` and index the results.
    ///
    /// Up to `max_workers` hashes run at once, each on its own task with its
    /// own file handle. Results are consumed in set order, so when two records
    /// hash the same the later one wins. Failures are collected instead of
    /// aborting the build.
    pub async fn build(set: &RecordSet, associator: &VideoAssociator, max_workers: usize) -> IndexBuild {
        let records: Vec<Arc<MetadataRecord>> = set.iter().cloned().map(Arc::new).collect();
        info!("🔍 Associating {} records with video files", records.len());

        let mut results = stream::iter(records)
            .map(|record| {
                let associator = associator.clone();
                let sidecar = record.source_path.clone();
                let handle = tokio::spawn(async move { associator.associate(record).await });
                async move { (sidecar, handle.await) }
            })
            .buffered(max_workers.max(1));

        let mut build = IndexBuild::default();
        while let Some((sidecar, joined)) = results.next().await {
            let outcome = joined.unwrap_or_else(|e| Err(ModdError::Task(e.to_string())));

            match outcome {
                Ok(descriptor) => {
                    if let Some(previous) = build.index.insert(descriptor) {
                        warn!(
                            "Hash collision: {} replaced by a later record",
                            previous.matched_path.display()
                        );
                    }
                }
                Err(error) => {
                    warn!("Skipping {}: {}", sidecar.display(), error);
                    build.failures.push(AssociationFailure { sidecar, error });
                }
            }
        }

        info!(
            "📹 Indexed {} videos, {} records skipped",
            build.index.len(),
            build.failures.len()
        );
        build
    }
}

impl Serialize for VideoIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.data.iter())
    }
}
