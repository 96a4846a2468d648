//! Tool Resolver (C4.1): locates an executable for a tool by trying, in
//! order, an embedded copy, the `PATH`, a well-known in-container location,
//! and finally delegation to a container runtime (`spec.md` §4.1).
pub mod cache;
pub mod embedded;

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ResolverError;
use crate::platform::Platform;
use cache::CacheManifest;

/// A container invocation that should run the tool instead of a local binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    /// The container runtime executable (e.g. `docker`).
    pub program: String,
    /// Arguments to invoke the tool's container image.
    pub args: Vec<String>,
}

/// The outcome of resolving a tool's executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A usable binary was found at this path.
    Found(PathBuf),
    /// No local binary exists; invoke the tool via a container runtime.
    Delegated(Launcher),
    /// No strategy produced a usable binary.
    NotFound,
}

const IN_CONTAINER_SEARCH_DIRS: [&str; 2] = ["/usr/local/bin", "/usr/bin"];

/// Resolves tool executables using the four-strategy order from `spec.md` §4.1.
#[derive(Debug)]
pub struct Resolver {
    platform: Platform,
    cache_dir: PathBuf,
    /// Guards embedded-tool extraction: process-internal, not a filesystem
    /// lock, since only this process ever writes to its own cache directory
    /// concurrently (from scheduler worker threads resolving different tools
    /// at once).
    extraction_lock: Mutex<()>,
}

impl Resolver {
    /// Construct a resolver rooted at `cache_dir` (typically
    /// `$XDG_CACHE_HOME/huskycat/tools`).
    #[must_use]
    pub fn new(platform: Platform, cache_dir: PathBuf) -> Self {
        Self {
            platform,
            cache_dir,
            extraction_lock: Mutex::new(()),
        }
    }

    /// Resolve `executable`, trying each strategy in order.
    #[must_use]
    pub fn resolve(&self, executable: &str) -> Resolution {
        if let Some(path) = self.resolve_embedded(executable) {
            return Resolution::Found(path);
        }
        if let Ok(path) = which::which(executable) {
            return Resolution::Found(path);
        }
        if self.platform.in_container {
            if let Some(path) = self.resolve_in_container(executable) {
                return Resolution::Found(path);
            }
        } else if let Some(launcher) = self.resolve_container_delegation(executable) {
            return Resolution::Delegated(launcher);
        }
        Resolution::NotFound
    }

    fn resolve_embedded(&self, executable: &str) -> Option<PathBuf> {
        let manifest = CacheManifest::load(&self.cache_dir);
        if let Some(path) = manifest.path_for(&self.cache_dir, executable) {
            if is_executable(&path) {
                return Some(path);
            }
        }

        let bytes = embedded::lookup(executable)?;
        match self.extract(executable, bytes) {
            Ok(path) => Some(path),
            Err(_extract_failed) => {
                // `ResolverError::ExtractFailed` is swallowed here by design:
                // the caller falls through to the PATH strategy without retry.
                None
            }
        }
    }

    fn extract(&self, executable: &str, bytes: &[u8]) -> Result<PathBuf, ResolverError> {
        let _guard = self
            .extraction_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let manifest = CacheManifest::load(&self.cache_dir);
        if let Some(path) = manifest.path_for(&self.cache_dir, executable) {
            if is_executable(&path) {
                return Ok(path);
            }
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| ResolverError::ExtractFailed(format!("creating cache dir: {e}")))?;
        let dest = self.cache_dir.join(executable);
        let mut tmp = tempfile::Builder::new()
            .prefix(".extract-")
            .tempfile_in(&self.cache_dir)
            .map_err(|e| ResolverError::ExtractFailed(format!("creating temp file: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| ResolverError::ExtractFailed(format!("writing temp file: {e}")))?;
        set_executable_permissions(tmp.path())?;
        tmp.persist(&dest)
            .map_err(|e| ResolverError::ExtractFailed(format!("renaming into place: {e}")))?;

        CacheManifest::record(&self.cache_dir)?;
        Ok(dest)
    }

    fn resolve_in_container(&self, executable: &str) -> Option<PathBuf> {
        IN_CONTAINER_SEARCH_DIRS
            .iter()
            .map(|dir| Path::new(dir).join(executable))
            .find(|candidate| is_executable(candidate))
    }

    fn resolve_container_delegation(&self, executable: &str) -> Option<Launcher> {
        if !self.platform.is_linux() {
            return None;
        }
        let runtime = which::which("docker").ok()?;
        Some(Launcher {
            program: runtime.to_string_lossy().into_owned(),
            args: vec![
                "run".to_string(),
                "--rm".to_string(),
                "-v".to_string(),
                "${PWD}:/workspace".to_string(),
                "-w".to_string(),
                "/workspace".to_string(),
                format!("huskycat/{executable}"),
            ],
        })
    }
}

#[cfg(unix)]
fn set_executable_permissions(path: &Path) -> Result<(), ResolverError> {
    use std::os::unix::fs::PermissionsExt as _;
    let mut perms = fs::metadata(path)
        .map_err(|e| ResolverError::ExtractFailed(format!("reading permissions: {e}")))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .map_err(|e| ResolverError::ExtractFailed(format!("setting permissions: {e}")))
}

#[cfg(not(unix))]
fn set_executable_permissions(_path: &Path) -> Result<(), ResolverError> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::Os;

    #[test]
    fn unknown_executable_resolves_not_found_or_delegated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = Resolver::new(Platform::new(Os::Linux, false), dir.path().to_path_buf());
        let resolution = resolver.resolve("definitely-not-a-real-tool-xyz");
        assert!(matches!(
            resolution,
            Resolution::NotFound | Resolution::Delegated(_)
        ));
    }

    #[test]
    fn in_container_without_candidate_falls_through() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = Resolver::new(Platform::new(Os::Linux, true), dir.path().to_path_buf());
        let resolution = resolver.resolve("definitely-not-a-real-tool-xyz");
        assert_eq!(resolution, Resolution::NotFound);
    }

    #[test]
    fn extraction_is_a_noop_when_nothing_is_embedded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = Resolver::new(Platform::new(Os::Linux, false), dir.path().to_path_buf());
        assert!(resolver.resolve_embedded("rustfmt").is_none());
    }
}
