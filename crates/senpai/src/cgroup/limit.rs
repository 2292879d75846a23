//! Memory ceiling actuation through cgroupfs.

use std::fs;
use std::path::{Path, PathBuf};

use senpai_common::{SenpaiError, SenpaiResult};

use super::{LimitPort, LimitValue};

const PAGE_MASK: u64 = !4095;

/// Clamp a requested ceiling into `[min, max]`, aligned down to the page.
///
/// Alignment happens before the clamp so an unaligned `min` can never be
/// undershot by the mask.
#[must_use]
pub fn sanitize_limit(bytes: u64, min: u64, max: u64) -> u64 {
    (bytes & PAGE_MASK).clamp(min, max)
}

/// Filesystem-backed limit port for one cgroup.
///
/// Reads `memory.current` and reads/writes `memory.high` under the cgroup
/// directory.
#[derive(Debug)]
pub struct MemoryLimitFile {
    cgroup: PathBuf,
    min: u64,
    max: u64,
}

impl MemoryLimitFile {
    /// Create a port for a cgroup directory with hard bounds on writes.
    #[must_use]
    pub fn new(cgroup: &Path, min: u64, max: u64) -> Self {
        Self {
            cgroup: cgroup.to_path_buf(),
            min,
            max,
        }
    }

    fn attribute(&self, name: &str) -> PathBuf {
        self.cgroup.join(name)
    }

    fn read_attribute(&self, name: &str) -> SenpaiResult<String> {
        let path = self.attribute(name);
        fs::read_to_string(&path).map_err(|source| SenpaiError::CgroupUnavailable { path, source })
    }

    fn write_attribute(&self, name: &str, value: &str) -> SenpaiResult<()> {
        let path = self.attribute(name);

        // One retry on a transient write failure, then give up.
        if fs::write(&path, value).is_ok() {
            return Ok(());
        }
        fs::write(&path, value).map_err(|source| SenpaiError::CgroupUnavailable { path, source })
    }
}

impl LimitPort for MemoryLimitFile {
    fn read_usage(&self) -> SenpaiResult<u64> {
        let content = self.read_attribute("memory.current")?;
        content
            .trim()
            .parse()
            .map_err(|_| SenpaiError::MalformedAttribute {
                path: self.attribute("memory.current"),
                content: content.trim().to_string(),
            })
    }

    fn read_limit(&self) -> SenpaiResult<LimitValue> {
        let content = self.read_attribute("memory.high")?;
        let trimmed = content.trim();

        if trimmed == "max" {
            return Ok(LimitValue::Max);
        }
        trimmed
            .parse()
            .map(LimitValue::Bytes)
            .map_err(|_| SenpaiError::MalformedAttribute {
                path: self.attribute("memory.high"),
                content: trimmed.to_string(),
            })
    }

    fn write_limit(&mut self, bytes: u64) -> SenpaiResult<u64> {
        let limit = sanitize_limit(bytes, self.min, self.max);
        self.write_attribute("memory.high", &limit.to_string())?;
        Ok(limit)
    }

    fn reset_limit(&mut self, value: LimitValue) -> SenpaiResult<()> {
        match value {
            LimitValue::Max => self.write_attribute("memory.high", "max"),
            LimitValue::Bytes(bytes) => self.write_attribute("memory.high", &bytes.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const MIN: u64 = 100 * 1024 * 1024;
    const MAX: u64 = 100 * 1024 * 1024 * 1024;

    fn cgroup_with(dir: &TempDir, current: &str, high: &str) -> MemoryLimitFile {
        std::fs::write(dir.path().join("memory.current"), current).unwrap();
        std::fs::write(dir.path().join("memory.high"), high).unwrap();
        MemoryLimitFile::new(dir.path(), MIN, MAX)
    }

    #[test]
    fn sanitize_aligns_down_to_page() {
        assert_eq!(sanitize_limit(MIN + 5000, MIN, MAX), MIN + 4096);
        assert_eq!(sanitize_limit(MIN + 4096, MIN, MAX), MIN + 4096);
    }

    #[test]
    fn sanitize_clamps_into_bounds() {
        assert_eq!(sanitize_limit(0, MIN, MAX), MIN);
        assert_eq!(sanitize_limit(u64::MAX, MIN, MAX), MAX);
    }

    #[test]
    fn sanitize_never_undershoots_unaligned_min() {
        // A min inside a page is respected even though the mask rounds down.
        let min = 4096 * 10 + 123;
        assert_eq!(sanitize_limit(min, min, MAX), min);
    }

    #[test]
    fn read_usage_parses_bytes() {
        let dir = TempDir::new().unwrap();
        let port = cgroup_with(&dir, "734003200\n", "max\n");
        assert_eq!(port.read_usage().unwrap(), 734_003_200);
    }

    #[test]
    fn read_limit_understands_max() {
        let dir = TempDir::new().unwrap();
        let port = cgroup_with(&dir, "0\n", "max\n");
        assert_eq!(port.read_limit().unwrap(), LimitValue::Max);
    }

    #[test]
    fn write_limit_sanitizes_and_reports_written_value() {
        let dir = TempDir::new().unwrap();
        let mut port = cgroup_with(&dir, "0\n", "max\n");

        let written = port.write_limit(MIN + 5000).unwrap();
        assert_eq!(written, MIN + 4096);
        let on_disk = std::fs::read_to_string(dir.path().join("memory.high")).unwrap();
        assert_eq!(on_disk, (MIN + 4096).to_string());
    }

    #[test]
    fn reset_limit_restores_max_verbatim() {
        let dir = TempDir::new().unwrap();
        let mut port = cgroup_with(&dir, "0\n", "12345\n");

        port.reset_limit(LimitValue::Max).unwrap();
        let on_disk = std::fs::read_to_string(dir.path().join("memory.high")).unwrap();
        assert_eq!(on_disk, "max");
    }

    #[test]
    fn missing_attribute_is_cgroup_unavailable() {
        let dir = TempDir::new().unwrap();
        let port = MemoryLimitFile::new(dir.path(), MIN, MAX);
        assert!(matches!(
            port.read_usage().unwrap_err(),
            SenpaiError::CgroupUnavailable { .. }
        ));
    }
}
