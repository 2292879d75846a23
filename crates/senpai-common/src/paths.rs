//! Cgroupfs path resolution.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// Mount point of the unified cgroup v2 hierarchy.
pub static CGROUP_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("SENPAI_CGROUP_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/sys/fs/cgroup"))
});

/// Resolve a cgroup given on the command line to a directory path.
///
/// Absolute paths are taken as-is; anything else is a cgroup name relative
/// to the hierarchy root, so `workload.slice/app` becomes
/// `/sys/fs/cgroup/workload.slice/app`.
#[must_use]
pub fn resolve_cgroup(cgroup: &Path) -> PathBuf {
    if cgroup.is_absolute() {
        cgroup.to_path_buf()
    } else {
        CGROUP_ROOT.join(cgroup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_taken_verbatim() {
        let resolved = resolve_cgroup(Path::new("/sys/fs/cgroup/workload"));
        assert_eq!(resolved, PathBuf::from("/sys/fs/cgroup/workload"));
    }

    #[test]
    fn relative_name_joined_to_root() {
        let resolved = resolve_cgroup(Path::new("workload.slice/app"));
        assert!(resolved.ends_with("workload.slice/app"));
        assert!(resolved.starts_with(CGROUP_ROOT.as_path()));
    }
}
