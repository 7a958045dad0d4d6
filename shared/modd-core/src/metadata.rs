//! Sidecar metadata record and the .modd decoder

use crate::time::{convert, LegacyZone};
use crate::{serde_fixed, ModdError, Result, SubRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;
const DATA_HEADER: &str =
    r#"<plist version="1.0"><dict><key>MetaDataList</key><array><dict>"#;
const DATA_FOOTER: &str =
    r#"</dict></array><key>XMLFileType</key><string>ModdXML</string></dict></plist>"#;

/// Tag rewrites applied after the envelope is gone. Keys become `key,`,
/// scalar values end a line, and the one array becomes a `[` ... `]` block
/// with each bracket on its own line.
const TAG_REWRITES: &[(&str, &str)] = &[
    ("<key>", ""),
    ("</key>", ","),
    ("<string>", ""),
    ("</string>", "\n"),
    ("<real>", ""),
    ("</real>", "\n"),
    ("<integer>", ""),
    ("</integer>", "\n"),
    ("<array>", "[\n"),
    ("</array>", "\n]\n"),
];

const ARRAY_OPEN: &str = "[";
const ARRAY_CLOSE: char = ']';

/// One decoded .modd sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Sidecar file name without its extension
    pub display_name: String,

    /// Where the sidecar was read from
    pub source_path: PathBuf,

    /// Opaque identifier token, kept verbatim
    pub check_code: String,

    /// Days since 1899-12-30 exactly as stored in the file
    #[serde(with = "serde_fixed")]
    pub original_timestamp: f64,

    /// `original_timestamp` converted to UTC, if the file carried one
    pub actual_timestamp: Option<DateTime<Utc>>,

    /// Playback duration in seconds
    #[serde(with = "serde_fixed")]
    pub duration_seconds: f64,

    /// Video size as declared by the sidecar (may be stale)
    pub file_size_bytes: u64,

    /// `VTList` entries in file order
    pub sub_records: Vec<SubRecord>,
}

impl MetadataRecord {
    /// Empty record for a sidecar path; fields are filled in by the decoder
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        Self {
            display_name: display_name_for(&source_path),
            source_path,
            check_code: String::new(),
            original_timestamp: 0.0,
            actual_timestamp: None,
            duration_seconds: 0.0,
            file_size_bytes: 0,
            sub_records: Vec::new(),
        }
    }

    /// Set the legacy timestamp and recompute the absolute time from it
    pub fn set_original_timestamp(&mut self, days: f64, tz_offset_seconds: i64) -> Result<()> {
        self.actual_timestamp = Some(convert(days, tz_offset_seconds)?);
        self.original_timestamp = days;
        Ok(())
    }

    /// The check code read as a base-16 integer, as an early revision of the
    /// format tooling did. Lossy: leading zeros and non-hex tokens are not
    /// representable, so this must never be used as an identity.
    pub fn legacy_check_code(&self) -> Option<u64> {
        u64::from_str_radix(&self.check_code, 16).ok()
    }

    /// Get formatted duration string
    pub fn duration_formatted(&self) -> String {
        let hours = (self.duration_seconds / 3600.0) as u32;
        let minutes = ((self.duration_seconds % 3600.0) / 60.0) as u32;
        let seconds = (self.duration_seconds % 60.0) as u32;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }
}

fn display_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Scalar,
    Array,
}

/// Line-oriented decoder for the plist dialect written by the camcorders
#[derive(Debug, Clone, Copy)]
pub struct ModdDecoder {
    tz_offset_seconds: i64,
}

impl Default for ModdDecoder {
    fn default() -> Self {
        Self::new(LegacyZone::default().offset_seconds())
    }
}

impl ModdDecoder {
    /// Create a decoder that converts timestamps using the given UTC offset
    pub fn new(tz_offset_seconds: i64) -> Self {
        Self { tz_offset_seconds }
    }

    pub fn tz_offset_seconds(&self) -> i64 {
        self.tz_offset_seconds
    }

    /// Decode raw sidecar text read from `source_path`
    pub fn decode(&self, raw_text: &str, source_path: impl AsRef<Path>) -> Result<MetadataRecord> {
        let mut record = MetadataRecord::new(source_path.as_ref());
        let cleaned = clean_text(raw_text);
        let mut state = DecodeState::Scalar;

        for line in cleaned.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match state {
                DecodeState::Scalar => {
                    let (key, value) = line.split_once(',').unwrap_or((line, ""));
                    if self.apply_field(&mut record, key.trim(), value.trim())? {
                        state = DecodeState::Array;
                    }
                }
                DecodeState::Array => {
                    if line.contains(ARRAY_CLOSE) {
                        state = DecodeState::Scalar;
                        continue;
                    }
                    record.sub_records.push(SubRecord::parse(line)?);
                }
            }
        }

        Ok(record)
    }

    /// Store one scalar field. Returns true when the line opens the VT array.
    fn apply_field(&self, record: &mut MetadataRecord, key: &str, value: &str) -> Result<bool> {
        match key.to_ascii_lowercase().as_str() {
            "checkcode" => record.check_code = value.to_string(),
            "datetimeoriginal" => {
                let days = parse_float(key, value)?;
                record
                    .set_original_timestamp(days, self.tz_offset_seconds)
                    .map_err(|_| malformed(key, value))?;
            }
            "duration" => record.duration_seconds = parse_float(key, value)?,
            "filesize" => {
                record.file_size_bytes = value.parse().map_err(|_| malformed(key, value))?;
            }
            "vtlist" => return Ok(value == ARRAY_OPEN),
            _ => debug!("Skipping unsupported key '{}' in {}", key, record.source_path.display()),
        }
        Ok(false)
    }
}

/// Strip the plist envelope and flatten tags into `key,value` lines
fn clean_text(raw_text: &str) -> String {
    let mut text = raw_text
        .replacen(XML_HEADER, "", 1)
        .replacen(DATA_HEADER, "", 1)
        .replacen(DATA_FOOTER, "", 1);

    for &(tag, replacement) in TAG_REWRITES {
        text = text.replace(tag, replacement);
    }

    text.trim().to_string()
}

fn malformed(key: &str, value: &str) -> ModdError {
    ModdError::MalformedField {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(malformed(key, value)),
    }
}
