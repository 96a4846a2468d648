//! Resolves `--staged`/`--all`/`--files` into a concrete file list using the
//! repository's git index, via the teacher's existing `git2` dependency.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository, Status, StatusOptions};

/// Discover the repository root containing `start` (or the current
/// directory, if `start` is `None`).
///
/// # Errors
///
/// Returns an error if no git repository is found at or above `start`.
pub fn discover_repo_root(start: Option<&Path>) -> Result<PathBuf> {
    let start = match start {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let repo = Repository::discover(&start).context("not inside a git repository")?;
    repo.workdir()
        .map(Path::to_path_buf)
        .context("repository has no working directory (bare repo)")
}

/// List files staged for commit (index differs from `HEAD`), repository-relative.
///
/// # Errors
///
/// Returns an error if the repository or its index cannot be read.
pub fn staged_files(repo_root: &Path) -> Result<Vec<PathBuf>> {
    let repo = Repository::open(repo_root).context("failed to open repository")?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).recurse_untracked_dirs(false);
    let statuses = repo.statuses(Some(&mut opts)).context("failed to read git status")?;

    let staged_mask = Status::INDEX_NEW
        | Status::INDEX_MODIFIED
        | Status::INDEX_DELETED
        | Status::INDEX_RENAMED
        | Status::INDEX_TYPECHANGE;

    Ok(statuses
        .iter()
        .filter(|entry| entry.status().intersects(staged_mask))
        .filter_map(|entry| entry.path().map(PathBuf::from))
        .collect())
}

/// List every file tracked by git, repository-relative.
///
/// # Errors
///
/// Returns an error if the repository or its index cannot be read.
pub fn all_tracked_files(repo_root: &Path) -> Result<Vec<PathBuf>> {
    let repo = Repository::open(repo_root).context("failed to open repository")?;
    let index = repo.index().context("failed to read git index")?;
    Ok(index
        .iter()
        .map(|entry| PathBuf::from(String::from_utf8_lossy(&entry.path).into_owned()))
        .collect())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn init_repo_with_commit(dir: &Path) -> Repository {
        let repo = Repository::init(dir).expect("init repo");
        std::fs::write(dir.join("tracked.txt"), b"hello").expect("write file");
        let mut index = repo.index().expect("index");
        index.add_path(Path::new("tracked.txt")).expect("add path");
        index.write().expect("write index");
        let tree_id = index.write_tree().expect("write tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let sig = git2::Signature::now("test", "test@example.com").expect("signature");
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .expect("commit");
        repo
    }

    #[test]
    fn discover_repo_root_finds_the_workdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        init_repo_with_commit(dir.path());
        let root = discover_repo_root(Some(dir.path())).expect("discover");
        assert_eq!(
            root.canonicalize().expect("canonicalize"),
            dir.path().canonicalize().expect("canonicalize")
        );
    }

    #[test]
    fn all_tracked_files_lists_committed_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        init_repo_with_commit(dir.path());
        let files = all_tracked_files(dir.path()).expect("list files");
        assert_eq!(files, vec![PathBuf::from("tracked.txt")]);
    }

    #[test]
    fn staged_files_reports_newly_added_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = init_repo_with_commit(dir.path());
        std::fs::write(dir.path().join("new.txt"), b"new").expect("write file");
        let mut index = repo.index().expect("index");
        index.add_path(Path::new("new.txt")).expect("add path");
        index.write().expect("write index");

        let files = staged_files(dir.path()).expect("list staged");
        assert_eq!(files, vec![PathBuf::from("new.txt")]);
    }
}
