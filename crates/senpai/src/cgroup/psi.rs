//! Pressure-stall information (PSI) for the memory controller.
//!
//! File format, one line per pressure class:
//!
//! ```text
//! some avg10=0.00 avg60=0.00 avg300=0.00 total=0
//! full avg10=0.00 avg60=0.00 avg300=0.00 total=0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use senpai_common::{SenpaiError, SenpaiResult};

use super::{PressureSource, StallSample};

/// One line of a PSI file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PressureRecord {
    /// Average pressure over 10 seconds, percent.
    pub avg10: f64,
    /// Average pressure over 60 seconds, percent.
    pub avg60: f64,
    /// Average pressure over 300 seconds, percent.
    pub avg300: f64,
    /// Total stall time in microseconds.
    pub total: u64,
}

impl PressureRecord {
    fn parse(line: &str) -> Self {
        let mut record = Self::default();

        for part in line.split_whitespace().skip(1) {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "avg10" => record.avg10 = value.parse().unwrap_or(0.0),
                    "avg60" => record.avg60 = value.parse().unwrap_or(0.0),
                    "avg300" => record.avg300 = value.parse().unwrap_or(0.0),
                    "total" => record.total = value.parse().unwrap_or(0),
                    _ => {}
                }
            }
        }

        record
    }
}

/// Parsed contents of a memory.pressure file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryPressure {
    /// Time in which at least one task stalled on memory.
    pub some: PressureRecord,
    /// Time in which all tasks stalled on memory.
    pub full: PressureRecord,
}

impl MemoryPressure {
    /// Parse pressure from cgroup file content.
    ///
    /// Returns `None` when the "some" line is absent; the controller keys
    /// off that line, so content without it is unusable.
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        let mut some = None;
        let mut full = None;

        for line in content.lines() {
            if line.starts_with("some") {
                some = Some(PressureRecord::parse(line));
            } else if line.starts_with("full") {
                full = Some(PressureRecord::parse(line));
            }
        }

        Some(Self {
            some: some?,
            full: full.unwrap_or_default(),
        })
    }
}

/// Filesystem-backed pressure source for one cgroup.
///
/// Holds the last observed cumulative stall counter so every sample carries
/// a ready-made delta.
#[derive(Debug)]
pub struct PsiSource {
    path: PathBuf,
    last_total: u64,
}

impl PsiSource {
    /// Open the pressure interface of a cgroup and seed the stall baseline.
    ///
    /// The initial read doubles as the availability check: kernels without
    /// PSI (pre-4.20, or psi=0) have no memory.pressure file.
    pub fn new(cgroup: &Path) -> SenpaiResult<Self> {
        let path = cgroup.join("memory.pressure");
        let pressure = read_pressure(&path)?;

        Ok(Self {
            path,
            last_total: pressure.some.total,
        })
    }
}

impl PressureSource for PsiSource {
    fn sample(&mut self) -> SenpaiResult<StallSample> {
        let pressure = read_pressure(&self.path)?;
        let total = pressure.some.total;

        // A total below the baseline means the counter was reset
        // (cgroup recreated), not negative stall.
        let delta = total.saturating_sub(self.last_total);
        self.last_total = total;

        Ok(StallSample {
            total_usec: total,
            delta_usec: delta,
            avg10: pressure.some.avg10,
        })
    }
}

fn read_pressure(path: &Path) -> SenpaiResult<MemoryPressure> {
    let content =
        fs::read_to_string(path).map_err(|source| SenpaiError::ObservabilityUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

    MemoryPressure::parse(&content).ok_or_else(|| SenpaiError::MalformedAttribute {
        path: path.to_path_buf(),
        content: content.chars().take(128).collect(),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_pressure(dir: &TempDir, total: u64) {
        let content = format!(
            "some avg10=0.12 avg60=0.05 avg300=0.01 total={total}\n\
             full avg10=0.00 avg60=0.00 avg300=0.00 total=0\n"
        );
        std::fs::write(dir.path().join("memory.pressure"), content).unwrap();
    }

    #[test]
    fn parse_keeps_some_and_full_separate() {
        let content = "some avg10=1.50 avg60=0.75 avg300=0.10 total=123456\n\
                       full avg10=0.20 avg60=0.10 avg300=0.00 total=7890";
        let pressure = MemoryPressure::parse(content).unwrap();
        assert_eq!(pressure.some.avg10, 1.50);
        assert_eq!(pressure.some.total, 123_456);
        assert_eq!(pressure.full.avg10, 0.20);
        assert_eq!(pressure.full.total, 7890);
    }

    #[test]
    fn parse_without_some_line_is_unusable() {
        assert!(MemoryPressure::parse("cpu avg10=0.00 total=0").is_none());
        assert!(MemoryPressure::parse("").is_none());
    }

    #[test]
    fn sample_computes_delta_between_reads() {
        let dir = TempDir::new().unwrap();
        write_pressure(&dir, 1000);

        let mut source = PsiSource::new(dir.path()).unwrap();
        write_pressure(&dir, 4500);

        let sample = source.sample().unwrap();
        assert_eq!(sample.delta_usec, 3500);
        assert_eq!(sample.total_usec, 4500);
    }

    #[test]
    fn counter_reset_yields_zero_delta() {
        let dir = TempDir::new().unwrap();
        write_pressure(&dir, 9000);

        let mut source = PsiSource::new(dir.path()).unwrap();
        write_pressure(&dir, 200);

        let sample = source.sample().unwrap();
        assert_eq!(sample.delta_usec, 0);

        // The baseline rebased to the new total, so counting resumes from there.
        write_pressure(&dir, 1200);
        let sample = source.sample().unwrap();
        assert_eq!(sample.delta_usec, 1000);
    }

    #[test]
    fn missing_interface_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = PsiSource::new(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            SenpaiError::ObservabilityUnavailable { .. }
        ));
    }
}
