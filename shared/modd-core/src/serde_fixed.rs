//! Fixed-precision float serialization
//!
//! Floats are written with exactly 15 fractional digits (`45123.456789000000000`)
//! so JSON output lines up with what earlier tooling produced. The digits are
//! emitted as a raw JSON number, so this only applies to `serde_json` output.
//! Deserialization accepts any JSON number.

use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Fractional digits written for every float field
pub const FLOAT_DIGITS: usize = 15;

fn fixed_number(value: f64) -> Result<Box<RawValue>, String> {
    if !value.is_finite() {
        return Err(format!("cannot serialize non-finite float {}", value));
    }
    RawValue::from_string(format!("{:.*}", FLOAT_DIGITS, value)).map_err(|e| e.to_string())
}

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    fixed_number(*value)
        .map_err(S::Error::custom)?
        .serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer)
}
