//! Progress TUI (C4.5): renders scheduler events as they arrive, reusing the
//! teacher's `Logger` progress-line mechanism instead of a bespoke renderer
//! (`spec.md` §4.5).
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::logging::Log;
use crate::scheduler::{ProgressEvent, ProgressSink};

/// Minimum interval between progress-line redraws, bounding refresh rate to
/// roughly 10 Hz as `spec.md` §4.5 recommends.
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// A [`ProgressSink`] that drives a [`Log`] implementation's existing
/// tool-summary and progress-line machinery.
///
/// Attaches only when the caller decides the run is interactive and the
/// mode wants progress output (`spec.md` §4.5); callers that don't want a
/// live display should use [`crate::scheduler::NullProgressSink`] instead.
pub struct LoggerProgressSink<'a> {
    log: &'a dyn Log,
    last_redraw: Mutex<Instant>,
}

impl<'a> LoggerProgressSink<'a> {
    /// Wrap `log`, driving its progress output from scheduler events.
    #[must_use]
    pub fn new(log: &'a dyn Log) -> Self {
        Self {
            log,
            last_redraw: Mutex::new(Instant::now() - REFRESH_INTERVAL),
        }
    }

    fn should_redraw(&self) -> bool {
        let mut guard = self
            .last_redraw
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.elapsed() >= REFRESH_INTERVAL {
            *guard = Instant::now();
            true
        } else {
            false
        }
    }
}

impl ProgressSink for LoggerProgressSink<'_> {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ToolQueued(name) => {
                self.log.debug(&format!("{name}: queued"));
            }
            ProgressEvent::ToolStarted(name) => {
                if self.should_redraw() {
                    self.log.info(&format!("{name}: running"));
                }
            }
            ProgressEvent::ToolFinished(name, outcome) => {
                // Always recorded, regardless of redraw throttling: a
                // dropped final status would corrupt the run summary.
                self.log.record_task(&name, outcome, None);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logging::{Logger, ToolOutcome};

    #[test]
    fn finished_event_records_on_the_logger() {
        let logger = Logger::new("test");
        let sink = LoggerProgressSink::new(&logger);
        sink.on_event(ProgressEvent::ToolFinished("rustfmt".to_string(), ToolOutcome::Success));
        assert!(!logger.has_failures());
    }

    #[test]
    fn finished_failure_is_visible_as_a_failure() {
        let logger = Logger::new("test");
        let sink = LoggerProgressSink::new(&logger);
        sink.on_event(ProgressEvent::ToolFinished("clippy".to_string(), ToolOutcome::Failed));
        assert!(logger.has_failures());
    }
}
