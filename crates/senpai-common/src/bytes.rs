//! Byte quantity parsing and representation.
//!
//! Supports the usual memory quantity spellings:
//! - Binary: "128Ki", "512Mi", "1Gi" (powers of 1024)
//! - Decimal: "128k", "512M", "1G" (powers of 1000)
//! - Plain numbers are bytes

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::{SenpaiError, SenpaiResult};

const KI: u64 = 1024;
const MI: u64 = 1024 * 1024;
const GI: u64 = 1024 * 1024 * 1024;
const TI: u64 = 1024 * 1024 * 1024 * 1024;

/// A byte quantity.
///
/// Displays in binary units, exact when possible ("512Mi"), rounded to two
/// decimals otherwise ("1.07Gi") so limit values stay readable in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Create a quantity from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create a quantity from mebibytes (MiB).
    #[must_use]
    pub const fn from_mebibytes(mib: u64) -> Self {
        Self(mib * MI)
    }

    /// Create a quantity from gibibytes (GiB).
    #[must_use]
    pub const fn from_gibibytes(gib: u64) -> Self {
        Self(gib * GI)
    }

    /// The raw value in bytes.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Parse a byte quantity string.
    ///
    /// Formats (binary - powers of 1024):
    /// - "128Ki" -> 128 * 1024 bytes
    /// - "128Mi" -> 128 * 1024^2 bytes
    /// - "1Gi" -> 1 * 1024^3 bytes
    ///
    /// Formats (decimal - powers of 1000):
    /// - "128k" -> 128 * 1000 bytes
    /// - "128M" -> 128 * 1000^2 bytes
    /// - "1G" -> 1 * 1000^3 bytes
    ///
    /// Plain number is bytes.
    pub fn parse(s: &str) -> SenpaiResult<Self> {
        let s = s.trim();

        // Binary suffixes (powers of 1024)
        let binary_suffixes = [("Ki", KI), ("Mi", MI), ("Gi", GI), ("Ti", TI)];

        for (suffix, multiplier) in binary_suffixes {
            if let Some(stripped) = s.strip_suffix(suffix) {
                let value: u64 = stripped
                    .parse()
                    .map_err(|_| SenpaiError::InvalidByteSize {
                        value: s.to_string(),
                    })?;
                return Ok(Self(value * multiplier));
            }
        }

        // Decimal suffixes (powers of 1000)
        let decimal_suffixes = [
            ("k", 1000u64),
            ("K", 1000),
            ("m", 1000 * 1000), // Note: lowercase 'm' for mega, not milli
            ("M", 1000 * 1000),
            ("g", 1000 * 1000 * 1000),
            ("G", 1000 * 1000 * 1000),
            ("t", 1000 * 1000 * 1000 * 1000),
            ("T", 1000 * 1000 * 1000 * 1000),
        ];

        for (suffix, multiplier) in decimal_suffixes {
            if let Some(stripped) = s.strip_suffix(suffix) {
                let value: u64 = stripped
                    .parse()
                    .map_err(|_| SenpaiError::InvalidByteSize {
                        value: s.to_string(),
                    })?;
                return Ok(Self(value * multiplier));
            }
        }

        // Plain bytes
        let bytes: u64 = s.parse().map_err(|_| SenpaiError::InvalidByteSize {
            value: s.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = [("Ti", TI), ("Gi", GI), ("Mi", MI), ("Ki", KI)];

        for (suffix, multiplier) in units {
            if self.0 >= multiplier {
                if self.0 % multiplier == 0 {
                    return write!(f, "{}{}", self.0 / multiplier, suffix);
                }
                #[allow(clippy::cast_precision_loss)]
                return write!(f, "{:.2}{}", self.0 as f64 / multiplier as f64, suffix);
            }
        }

        write!(f, "{}", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = SenpaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.0
    }
}

struct ByteSizeVisitor;

impl Visitor<'_> for ByteSizeVisitor {
    type Value = ByteSize;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a byte count or a quantity string like \"512Mi\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(ByteSize::from_bytes(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(ByteSize::from_bytes)
            .map_err(|_| E::custom("byte quantity cannot be negative"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        ByteSize::parse(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ByteSizeVisitor)
    }
}
