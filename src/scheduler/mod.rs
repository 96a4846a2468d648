//! DAG Scheduler (C4.4): Phase 1 level computation plus Phase 2 bounded,
//! dependency-aware dispatch (`spec.md` §4.4).
pub mod engine;
pub mod graph;
pub mod levels;
pub mod process_group;
pub mod request;

pub use engine::{run, NullProgressSink, ProgressEvent, ProgressSink};
pub use levels::compute_levels;
pub use request::{default_max_workers, RunRequest, ToolSelection};
