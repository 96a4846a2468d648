// Shared helpers for integration tests.
//
// Provides a minimal tool descriptor builder and an isolated, temp-dir-backed
// run store so scheduler scenario tests can exercise the full
// registry→resolver→scheduler→run-store path without touching a real
// repository.
#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use huskycat::registry::{ArgvToken, Category, ToolDescriptor};
use huskycat::resolver::Resolver;
use huskycat::run_store::RunStore;
use huskycat::scheduler::RunRequest;

/// Build a descriptor that runs a fixed shell command with no templated
/// arguments, applicable to every file.
pub fn shell_tool(name: &str, program: &str, depends_on: &[&str]) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        executable: program.to_string(),
        argv_template: vec![],
        applies_to: vec![ToolDescriptor::compile_glob(name, "**/*").expect("valid glob")],
        depends_on: depends_on.iter().map(|s| (*s).to_string()).collect(),
        fixable: false,
        fix_flag: None,
        check_flag: None,
        category: Category::Linter,
    }
}

/// Build a descriptor whose single `{file}`-templated argument is `arg`,
/// e.g. `sleep_tool("slow", "sleep", "60")` dispatches `sleep 60` once per
/// applicable file.
pub fn argv_tool(name: &str, program: &str, literal_arg: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        executable: program.to_string(),
        argv_template: vec![ArgvToken::Literal(literal_arg.to_string())],
        applies_to: vec![ToolDescriptor::compile_glob(name, "**/*").expect("valid glob")],
        depends_on: vec![],
        fixable: false,
        fix_flag: None,
        check_flag: None,
        category: Category::Linter,
    }
}

/// A disposable run store backed by a temp directory, and the resolver
/// every scenario test needs to dispatch real subprocesses.
pub struct Harness {
    pub repo_root: tempfile::TempDir,
    // Kept alive for the resolver's cache_dir; never read directly.
    _cache_dir: tempfile::TempDir,
    pub store: RunStore,
    pub resolver: Resolver,
}

impl Harness {
    pub fn new() -> Self {
        let repo_root = tempfile::tempdir().expect("create temp repo root");
        let store = RunStore::new(repo_root.path().to_path_buf());
        let cache_dir = tempfile::tempdir().expect("create temp cache dir");
        let resolver = Resolver::new(huskycat::platform::Platform::detect(), cache_dir.path().to_path_buf());
        Self {
            repo_root,
            _cache_dir: cache_dir,
            store,
            resolver,
        }
    }

    pub fn request(&self, files: &[&str]) -> RunRequest {
        let mut request = RunRequest::new(
            self.repo_root.path().to_path_buf(),
            files.iter().map(PathBuf::from).collect(),
        );
        request.per_tool_timeout = Duration::from_secs(5);
        request
    }
}
