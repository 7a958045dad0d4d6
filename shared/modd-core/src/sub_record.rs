//! VT sub-record parsing
//!
//! A `VTList` entry is six colon-separated numbers. Their meaning is
//! undocumented, so they are kept as positional fields.

use crate::{serde_fixed, ModdError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const FIELD_COUNT: usize = 6;

/// One `VTList` element: `(u64, u64, f64, f64, f64, u64)` in file order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubRecord {
    pub field0: u64,
    pub field1: u64,
    #[serde(with = "serde_fixed")]
    pub field2: f64,
    #[serde(with = "serde_fixed")]
    pub field3: f64,
    #[serde(with = "serde_fixed")]
    pub field4: f64,
    pub field5: u64,
}

impl SubRecord {
    /// Parse a `a:b:c:d:e:f` line
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != FIELD_COUNT {
            return Err(malformed(
                line,
                format!("expected {} fields, found {}", FIELD_COUNT, parts.len()),
            ));
        }

        Ok(Self {
            field0: parse_field(line, 0, parts[0])?,
            field1: parse_field(line, 1, parts[1])?,
            field2: parse_float(line, 2, parts[2])?,
            field3: parse_float(line, 3, parts[3])?,
            field4: parse_float(line, 4, parts[4])?,
            field5: parse_field(line, 5, parts[5])?,
        })
    }

    /// Fields in positional order, floats widened
    pub fn as_tuple(&self) -> (u64, u64, f64, f64, f64, u64) {
        (
            self.field0,
            self.field1,
            self.field2,
            self.field3,
            self.field4,
            self.field5,
        )
    }
}

impl FromStr for SubRecord {
    type Err = ModdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SubRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.field0, self.field1, self.field2, self.field3, self.field4, self.field5
        )
    }
}

fn malformed(line: &str, reason: String) -> ModdError {
    ModdError::MalformedSubRecord {
        line: line.to_string(),
        reason,
    }
}

fn parse_field<T: FromStr>(line: &str, position: usize, raw: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| malformed(line, format!("field {} ({:?}): {}", position, raw, e)))
}

fn parse_float(line: &str, position: usize, raw: &str) -> Result<f64> {
    let value: f64 = parse_field(line, position, raw)?;
    if !value.is_finite() {
        return Err(malformed(line, format!("field {} is not a finite number", position)));
    }
    Ok(value)
}
