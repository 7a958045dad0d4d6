use anyhow::{anyhow, Context, Result};
use modd_core::time::LegacyZone;
use modd_core::video_file::DEFAULT_VIDEO_EXTENSIONS;
use modd_core::{HashPolicy, ModdDecoder, SidecarScanner, VideoAssociator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the modd organizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sidecar discovery settings
    pub scan: ScanConfig,

    /// Decoding settings
    pub decode: DecodeConfig,

    /// Video association and hashing settings
    pub association: AssociationConfig,

    /// Output and storage settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Sidecar file extension (matched case-insensitively)
    pub sidecar_extension: String,

    /// Follow symbolic links while walking
    pub follow_links: bool,

    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Seconds added to camera-local time to reach UTC
    pub tz_offset_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Extensions tried next to each sidecar, in order
    pub video_extensions: Vec<String>,

    /// How much of each video is hashed
    pub hash_policy: HashPolicy,

    /// Stall limit for opening a video and for each chunk read while hashing (seconds)
    pub read_timeout_secs: u64,

    /// Maximum number of concurrent hash tasks
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// SQLite database to sync into
    pub database_path: Option<PathBuf>,

    /// Pretty-print JSON output
    pub pretty_json: bool,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "modd-organizer.toml",
            "config/modd-organizer.toml",
            "/etc/modd-organizer/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file; unlike `load`, a bad file is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(offset) = std::env::var("MODD_ORGANIZER_TZ_OFFSET") {
            config.decode.tz_offset_seconds = parse_tz_offset(&offset)?;
        }

        if let Ok(workers) = std::env::var("MODD_ORGANIZER_WORKERS") {
            config.association.max_workers = workers
                .parse()
                .map_err(|e| anyhow!("invalid MODD_ORGANIZER_WORKERS {:?}: {}", workers, e))?;
        }

        if let Ok(database) = std::env::var("MODD_ORGANIZER_DATABASE") {
            config.output.database_path = Some(PathBuf::from(database));
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.association.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.association.video_extensions.is_empty() {
            return Err(anyhow!("video_extensions must not be empty"));
        }

        if let HashPolicy::Prefix { divisor: 0 } = self.association.hash_policy {
            return Err(anyhow!("hash_policy divisor must be greater than 0"));
        }

        if self.association.read_timeout_secs == 0 {
            return Err(anyhow!("read_timeout_secs must be greater than 0"));
        }

        if self.scan.sidecar_extension.trim_start_matches('.').is_empty() {
            return Err(anyhow!("sidecar_extension must not be empty"));
        }

        Ok(())
    }

    pub fn decoder(&self) -> ModdDecoder {
        ModdDecoder::new(self.decode.tz_offset_seconds)
    }

    pub fn scanner(&self) -> SidecarScanner {
        SidecarScanner::new(self.decoder())
            .with_extension(self.scan.sidecar_extension.clone())
            .with_follow_links(self.scan.follow_links)
            .with_max_depth(self.scan.max_depth)
    }

    pub fn associator(&self) -> VideoAssociator {
        VideoAssociator::new()
            .with_extensions(self.association.video_extensions.clone())
            .with_hash_policy(self.association.hash_policy)
            .with_read_timeout(Duration::from_secs(self.association.read_timeout_secs))
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Modd Organizer Configuration:\n\
            - Sidecar Extension: .{}\n\
            - Timezone Offset: {}s\n\
            - Video Extensions: {}\n\
            - Hash Policy: {:?}\n\
            - Workers: {}\n\
            - Database: {}",
            self.scan.sidecar_extension,
            self.decode.tz_offset_seconds,
            self.association.video_extensions.join(", "),
            self.association.hash_policy,
            self.association.max_workers,
            self.output
                .database_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }
}

/// Accept a zone preset name (`cst`, `pacific`, ...) or a number of seconds
pub fn parse_tz_offset(value: &str) -> Result<i64> {
    if let Some(zone) = LegacyZone::from_name(value.trim()) {
        return Ok(zone.offset_seconds());
    }
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid timezone offset {:?}: expected est/cst/mst/pst or seconds", value))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig {
                sidecar_extension: "modd".to_string(),
                follow_links: false,
                max_depth: None,
            },
            decode: DecodeConfig {
                tz_offset_seconds: LegacyZone::Central.offset_seconds(),
            },
            association: AssociationConfig {
                video_extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
                hash_policy: HashPolicy::default(),
                read_timeout_secs: 30,
                max_workers: num_cpus::get().min(8), // Use available cores, max 8
            },
            output: OutputConfig {
                database_path: None,
                pretty_json: true,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.association.max_workers = workers;
        self
    }

    pub fn with_tz_offset(mut self, seconds: i64) -> Self {
        self.config.decode.tz_offset_seconds = seconds;
        self
    }

    pub fn with_hash_policy(mut self, policy: HashPolicy) -> Self {
        self.config.association.hash_policy = policy;
        self
    }

    pub fn with_database(mut self, path: PathBuf) -> Self {
        self.config.output.database_path = Some(path);
        self
    }

    pub fn with_sidecar_extension(mut self, extension: &str) -> Self {
        self.config.scan.sidecar_extension = extension.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
