//! Conversion of legacy fractional-day timestamps
//!
//! Sidecars store `DateTimeOriginal` as elapsed days since 1899-12-30, the
//! spreadsheet epoch. The value is local camera time, so converting it to UTC
//! requires the offset of the zone the camera clock was set to.

use crate::{ModdError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds between 1899-12-30T00:00:00Z and the Unix epoch
pub const LEGACY_EPOCH_OFFSET_SECS: i64 = 2_209_161_600;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// North American zones the legacy tool knew about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyZone {
    Eastern,
    #[default]
    Central,
    Mountain,
    Pacific,
}

impl LegacyZone {
    /// Offset in seconds that is added to local time to reach UTC
    pub fn offset_seconds(&self) -> i64 {
        let hours = match self {
            LegacyZone::Eastern => 5,
            LegacyZone::Central => 6,
            LegacyZone::Mountain => 7,
            LegacyZone::Pacific => 8,
        };
        hours * 3600
    }

    /// Parse the short names used on the command line (`est`, `cst`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "est" | "eastern" => Some(LegacyZone::Eastern),
            "cst" | "central" => Some(LegacyZone::Central),
            "mst" | "mountain" => Some(LegacyZone::Mountain),
            "pst" | "pacific" => Some(LegacyZone::Pacific),
            _ => None,
        }
    }
}

/// Convert fractional days since the legacy epoch into an absolute UTC time.
///
/// Sub-second precision is dropped: the scaled value is truncated toward zero.
/// Values that do not fit a 64-bit second count are rejected rather than wrapped.
pub fn convert(original_days: f64, tz_offset_seconds: i64) -> Result<DateTime<Utc>> {
    let out_of_range = || ModdError::Timestamp {
        days: original_days,
        offset: tz_offset_seconds,
    };

    let scaled = (original_days * SECONDS_PER_DAY).trunc();
    if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
        return Err(out_of_range());
    }

    let unix_secs = (scaled as i64)
        .checked_sub(LEGACY_EPOCH_OFFSET_SECS)
        .and_then(|secs| secs.checked_add(tz_offset_seconds))
        .ok_or_else(out_of_range)?;

    DateTime::from_timestamp(unix_secs, 0).ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_zero_is_legacy_epoch() {
        let t = convert(0.0, 0).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(1899, 12, 30, 0, 0, 0).unwrap());
        assert_eq!(t.timestamp(), -LEGACY_EPOCH_OFFSET_SECS);
    }

    #[test]
    fn test_unix_epoch_day() {
        // 25569 days after the legacy epoch is 1970-01-01
        assert_eq!(convert(25569.0, 0).unwrap().timestamp(), 0);
        assert_eq!(convert(25569.0, 21600).unwrap().timestamp(), 21600);
    }

    #[test]
    fn test_fraction_truncated() {
        // half a day plus a fraction of a second
        let t = convert(25569.5 + 0.4 / 86400.0, 0).unwrap();
        assert_eq!(t.timestamp(), 43200);
        assert_eq!(t.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_monotonic_for_fixed_offset() {
        let samples = [0.0, 1.25, 25569.0, 40194.4623, 40194.4624, 45000.0];
        let offset = LegacyZone::Central.offset_seconds();
        let times: Vec<_> = samples.iter().map(|d| convert(*d, offset).unwrap()).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(convert(f64::NAN, 0), Err(ModdError::Timestamp { .. })));
        assert!(matches!(convert(f64::INFINITY, 0), Err(ModdError::Timestamp { .. })));
        assert!(matches!(convert(1e300, 0), Err(ModdError::Timestamp { .. })));
    }

    #[test]
    fn test_zone_presets() {
        assert_eq!(LegacyZone::Eastern.offset_seconds(), 18000);
        assert_eq!(LegacyZone::default().offset_seconds(), 21600);
        assert_eq!(LegacyZone::from_name("PST"), Some(LegacyZone::Pacific));
        assert_eq!(LegacyZone::from_name("utc"), None);
    }
}
