/// Modd Organizer
///
/// Decodes camcorder `.modd` sidecars, matches them with their video files,
/// indexes the videos by content hash and syncs the result into SQLite.

pub mod config;
pub mod processing;
pub mod store;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::processing::{Pipeline, PipelineReport, PipelineSummary};
pub use crate::store::{RecordStore, SyncStats, UpsertOutcome};
pub use modd_core::{
    ContentHash, HashPolicy, MetadataRecord, ModdDecoder, ModdError, RecordSet, VideoDescriptor,
    VideoIndex,
};
