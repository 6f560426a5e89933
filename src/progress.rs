//! Progress-callback trait for assembly events and the live log feed.
//!
//! Inject an [`Arc<dyn AssemblyProgressCallback>`] via
//! [`crate::config::AssemblyConfigBuilder::progress_callback`] to receive
//! stage transitions, per-fragment events, and every line the external
//! generator and renderer print, as they print it.
//!
//! # Example
//!
//! ```rust
//! use repodoc::{AssemblyConfig, AssemblyProgressCallback, OutputStream};
//! use std::sync::Arc;
//!
//! struct StderrLog;
//!
//! impl AssemblyProgressCallback for StderrLog {
//!     fn on_log_line(&self, stream: OutputStream, line: &str) {
//!         eprintln!("[{stream}] {line}");
//!     }
//! }
//!
//! let config = AssemblyConfig::builder()
//!     .progress_callback(Arc::new(StderrLog) as Arc<dyn AssemblyProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::AssemblyStats;
use crate::process::OutputStream;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Coarse pipeline stages, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generating,
    Collecting,
    Rendering,
    Merging,
    Converting,
    Saving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Generating => "Generating",
            Stage::Collecting => "Collecting",
            Stage::Rendering => "Rendering",
            Stage::Merging => "Merging",
            Stage::Converting => "Converting",
            Stage::Saving => "Saving",
        };
        f.write_str(label)
    }
}

/// Called by the assembly pipeline as it runs.
///
/// Implementations must be `Send + Sync`; with render concurrency above one,
/// `on_log_line` and `on_diagram_rendered` can arrive from overlapping
/// renderer runs. All methods default to no-ops.
pub trait AssemblyProgressCallback: Send + Sync {
    /// Called when the pipeline enters a new stage.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called for every line an external process writes, verbatim.
    fn on_log_line(&self, stream: OutputStream, line: &str) {
        let _ = (stream, line);
    }

    /// Called before a fragment is normalised and rasterised.
    ///
    /// # Arguments
    /// * `name` : fragment filename
    /// * `index`: 1-indexed position in read order
    /// * `total`: number of fragments found
    fn on_fragment_start(&self, name: &str, index: usize, total: usize) {
        let _ = (name, index, total);
    }

    /// Called once a fragment is fully rasterised and classified.
    fn on_fragment_complete(&self, name: &str, rank: u32, diagrams: usize) {
        let _ = (name, rank, diagrams);
    }

    /// Called after each diagram is substituted.
    ///
    /// `block` is 1-indexed within the fragment; `image_bytes` is the raw
    /// size of the rendered image before encoding.
    fn on_diagram_rendered(&self, fragment: &str, block: usize, image_bytes: usize) {
        let _ = (fragment, block, image_bytes);
    }

    /// Called once when the run ends: after the document is saved, or after
    /// the destination prompt is declined.
    fn on_run_complete(&self, stats: &AssemblyStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl AssemblyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AssemblyConfig`].
pub type ProgressCallback = Arc<dyn AssemblyProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        lines: AtomicUsize,
        fragments: AtomicUsize,
    }

    impl AssemblyProgressCallback for TrackingCallback {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_log_line(&self, _stream: OutputStream, _line: &str) {
            self.lines.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fragment_complete(&self, _name: &str, _rank: u32, _diagrams: usize) {
            self.fragments.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(Stage::Generating);
        cb.on_log_line(OutputStream::Stdout, "Wrote: app/docs/overview.md");
        cb.on_fragment_start("overview.md", 1, 3);
        cb.on_fragment_complete("overview.md", 0, 0);
        cb.on_diagram_rendered("overview.md", 1, 2048);
        cb.on_run_complete(&AssemblyStats::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage(Stage::Generating);
        tracker.on_log_line(OutputStream::Stdout, "Writing Objective & Scope...");
        tracker.on_log_line(OutputStream::Stderr, "warning: slow embedding");
        tracker.on_stage(Stage::Rendering);
        tracker.on_fragment_complete("a.md", 0, 1);

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Generating, Stage::Rendering]
        );
        assert_eq!(tracker.lines.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.fragments.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn AssemblyProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_stage(Stage::Merging);
        assert_eq!(Stage::Merging.to_string(), "Merging");
    }
}
