//! On-disk marker for the embedded tool cache's bundle version, persisted
//! atomically in the style of `uv`'s cache: write to a temp file in the
//! same directory, then rename over the target.
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ResolverError;

/// The version of the embedded tool bundle shipped with this build. Bumped
/// whenever the embedded toolset changes; a cache whose `.version` marker
/// differs from this is considered stale (`spec.md` §3).
pub const BUNDLE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The bundle version that last extracted tools into a cache directory.
///
/// Extracted tools live at a deterministic `<cache_dir>/<exe-name>`, so the
/// only state worth persisting across runs is the version marker itself
/// (`spec.md` §4/"Tool cache layout": `.version` is a single-line
/// `bundle_version` string, nothing more).
#[derive(Debug, Clone, Default)]
pub struct CacheManifest {
    bundle_version: String,
}

impl CacheManifest {
    /// Load the `.version` marker from `cache_dir`, if present.
    ///
    /// A missing or unreadable marker is treated as stale rather than an
    /// error: it simply means nothing has been extracted at this version yet.
    #[must_use]
    pub fn load(cache_dir: &Path) -> Self {
        let bundle_version = fs::read_to_string(manifest_path(cache_dir))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        Self { bundle_version }
    }

    /// Whether this marker matches the running binary's bundle version.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.bundle_version == BUNDLE_VERSION
    }

    /// The extracted path for `tool` under `cache_dir`, if the cache is
    /// current. Existence and executability are the caller's responsibility.
    #[must_use]
    pub fn path_for(&self, cache_dir: &Path, tool: &str) -> Option<PathBuf> {
        self.is_current().then(|| cache_dir.join(tool))
    }

    /// Stamp `cache_dir`'s `.version` marker with the running bundle version.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::ExtractFailed`] if the marker cannot be
    /// written to the cache directory.
    pub fn record(cache_dir: &Path) -> Result<(), ResolverError> {
        fs::create_dir_all(cache_dir)
            .map_err(|e| ResolverError::ExtractFailed(format!("creating cache dir: {e}")))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".version-")
            .tempfile_in(cache_dir)
            .map_err(|e| ResolverError::ExtractFailed(format!("creating temp version file: {e}")))?;
        use std::io::Write as _;
        tmp.write_all(BUNDLE_VERSION.as_bytes())
            .map_err(|e| ResolverError::ExtractFailed(format!("writing temp version file: {e}")))?;
        tmp.persist(manifest_path(cache_dir))
            .map_err(|e| {
                ResolverError::ExtractFailed(format!("renaming version marker into place: {e}"))
            })?;
        Ok(())
    }
}

fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(".version")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_loads_as_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = CacheManifest::load(dir.path());
        assert!(!manifest.is_current());
        assert_eq!(manifest.path_for(dir.path(), "rustfmt"), None);
    }

    #[test]
    fn record_then_load_round_trips_as_a_bare_string() {
        let dir = tempfile::tempdir().expect("tempdir");
        CacheManifest::record(dir.path()).expect("record succeeds");

        let on_disk = fs::read_to_string(dir.path().join(".version")).expect("read .version");
        assert_eq!(on_disk.trim(), BUNDLE_VERSION);

        let reloaded = CacheManifest::load(dir.path());
        assert!(reloaded.is_current());
        assert_eq!(
            reloaded.path_for(dir.path(), "rustfmt"),
            Some(dir.path().join("rustfmt"))
        );
    }

    #[test]
    fn stale_bundle_version_is_not_current() {
        let manifest = CacheManifest {
            bundle_version: "0.0.0-stale".to_string(),
        };
        assert!(!manifest.is_current());
        assert_eq!(manifest.path_for(Path::new("/tmp"), "rustfmt"), None);
    }
}
