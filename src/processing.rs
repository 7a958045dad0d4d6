use anyhow::{Context, Result};
use modd_core::{AssociationFailure, IndexBuild, RecordSet, ScanFailure, VideoIndex};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::store::{RecordStore, SyncStats};

/// Everything one pipeline run produced
#[derive(Debug)]
pub struct PipelineReport {
    pub root: PathBuf,
    pub records: RecordSet,
    pub index: VideoIndex,
    pub scan_failures: Vec<ScanFailure>,
    pub association_failures: Vec<AssociationFailure>,
    pub sync: Option<SyncStats>,
    pub files_seen: usize,
    pub total_time: Duration,
}

/// Printable view of a skipped file
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Counts for the end-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub sidecars_seen: usize,
    pub records: usize,
    pub videos: usize,
    pub skipped: Vec<SkippedFile>,
}

impl PipelineReport {
    fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            records: RecordSet::default(),
            index: VideoIndex::new(),
            scan_failures: Vec::new(),
            association_failures: Vec::new(),
            sync: None,
            files_seen: 0,
            total_time: Duration::ZERO,
        }
    }

    pub fn summary(&self) -> PipelineSummary {
        let skipped = self
            .scan_failures
            .iter()
            .map(|f| SkippedFile {
                path: f.path.clone(),
                reason: f.error.to_string(),
            })
            .chain(self.association_failures.iter().map(|f| SkippedFile {
                path: f.sidecar.clone(),
                reason: f.error.to_string(),
            }))
            .collect();

        PipelineSummary {
            sidecars_seen: self.files_seen,
            records: self.records.len(),
            videos: self.index.len(),
            skipped,
        }
    }
}

/// Scan, associate and optionally persist a directory of sidecars
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        info!(
            "🔧 Initializing pipeline with {} workers",
            config.association.max_workers
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decode every sidecar under `root`
    pub async fn scan(&self, root: &Path) -> Result<PipelineReport> {
        let start_time = Instant::now();
        info!("🔍 Scanning {}", root.display());

        let scan = self
            .config
            .scanner()
            .scan(root)
            .await
            .with_context(|| format!("Failed to scan {}", root.display()))?;

        let mut report = PipelineReport::empty(root);
        report.records = scan.records;
        report.scan_failures = scan.failures;
        report.files_seen = scan.files_seen;
        report.total_time = start_time.elapsed();
        Ok(report)
    }

    /// Scan, then match every record with its video and index by content hash
    pub async fn index(&self, root: &Path) -> Result<PipelineReport> {
        let start_time = Instant::now();
        let mut report = self.scan(root).await?;

        if report.records.is_empty() {
            warn!("No sidecars decoded under {}", root.display());
            report.total_time = start_time.elapsed();
            return Ok(report);
        }

        let IndexBuild { index, failures } = VideoIndex::build(
            &report.records,
            &self.config.associator(),
            self.config.association.max_workers,
        )
        .await;

        report.index = index;
        report.association_failures = failures;
        report.total_time = start_time.elapsed();
        Ok(report)
    }

    /// Index `root` and upsert the results into the configured database
    pub async fn sync(&self, root: &Path) -> Result<PipelineReport> {
        let database = self
            .config
            .output
            .database_path
            .clone()
            .context("No database configured; set output.database_path or --database")?;

        let start_time = Instant::now();
        let mut report = self.index(root).await?;

        let mut store = RecordStore::open(&database)?;
        report.sync = Some(store.sync(report.records.iter(), &report.index)?);
        report.total_time = start_time.elapsed();

        info!("💾 Synced into {}", database.display());
        Ok(report)
    }
}
