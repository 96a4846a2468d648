#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Fork controller tests: P7 (parent latency) and S6 (non-blocking hook
//! round-trip), driven against the real compiled binary the way the
//! teacher's own integration tests drive `commands::install::run` rather
//! than re-implementing the command in the test.

use std::path::Path;
use std::time::{Duration, Instant};

use git2::{Repository, Signature};
use huskycat::modes::{self, ForkOutcome};
use huskycat::run_store::RunStore;

fn init_repo_with_commit(dir: &Path) {
    let repo = Repository::init(dir).expect("init repo");
    std::fs::write(dir.join("tracked.txt"), b"hello").expect("write file");
    let mut index = repo.index().expect("index");
    index.add_path(Path::new("tracked.txt")).expect("add path");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let sig = Signature::now("test", "test@example.com").expect("signature");
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .expect("commit");
}

/// P7: the parent-side `fork_and_detach` call must return well within the
/// 100 ms budget — it only opens a run record and spawns a child, never
/// waits on the scheduler.
#[test]
fn parent_returns_within_the_non_blocking_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    init_repo_with_commit(dir.path());
    let store = RunStore::new(dir.path().to_path_buf());
    modes::ensure_store_dirs(dir.path()).expect("ensure dirs");

    let current_exe = Path::new(env!("CARGO_BIN_EXE_huskycat"));

    let started = Instant::now();
    let outcome = modes::fork_and_detach(&store, current_exe, &[], &[], false)
        .expect("fork_and_detach succeeds");
    let elapsed = started.elapsed();

    assert!(matches!(outcome, ForkOutcome::Detached));
    assert!(elapsed <= Duration::from_millis(100), "parent took {elapsed:?}");
}

/// S6: the non-blocking round-trip. The parent exits immediately with an
/// in-flight record on disk; once the detached child finishes, `latest`
/// points to a finalized record. A second invocation while the first is
/// still in flight does not spawn another child.
#[test]
fn non_blocking_round_trip_finalizes_exactly_one_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    init_repo_with_commit(dir.path());
    let store = RunStore::new(dir.path().to_path_buf());
    modes::ensure_store_dirs(dir.path()).expect("ensure dirs");

    let current_exe = Path::new(env!("CARGO_BIN_EXE_huskycat"));

    let outcome = modes::fork_and_detach(&store, current_exe, &[], &[], false)
        .expect("fork_and_detach succeeds");
    assert!(matches!(outcome, ForkOutcome::Detached));

    let first_record = store.latest().expect("in-flight record present");
    assert!(first_record.is_in_progress());
    let run_id = first_record.run_id.clone();

    // A second invocation while the first child is still running must not
    // spawn a competing child.
    let second_outcome = modes::fork_and_detach(&store, current_exe, &[], &[], false)
        .expect("fork_and_detach succeeds");
    assert!(matches!(
        second_outcome,
        ForkOutcome::AlreadyInFlight | ForkOutcome::Blocked { .. }
    ));

    let deadline = Instant::now() + Duration::from_secs(10);
    let finalized = loop {
        let record = store.latest().expect("record present");
        if !record.is_in_progress() {
            break record;
        }
        assert!(Instant::now() < deadline, "child did not finish in time");
        std::thread::sleep(Duration::from_millis(50));
    };

    assert_eq!(finalized.run_id, run_id);
}
