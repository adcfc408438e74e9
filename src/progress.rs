//! Progress reporting
//!
//! Long-running stages report "item processed" events against a known
//! total. A [`ProgressDisplay`] decides where those events go:
//!
//! - [`ProgressDisplay::Hidden`]: nowhere (non-verbose runs)
//! - [`ProgressDisplay::Terminal`]: an `indicatif` bar on stderr
//! - [`ProgressDisplay::Callback`]: a user callback receiving [`ProgressInfo`]
//!
//! Stages that cannot report fine-grained progress (encryption, decryption)
//! use a [`ProgressDisplay::marker`], which only signals start and completion.
//!
//! ```rust
//! use stashbox::progress::ProgressDisplay;
//! use stashbox::types::ProgressInfo;
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let display = ProgressDisplay::callback(move |info: ProgressInfo| {
//!     sink.lock().unwrap().push(info.processed);
//! });
//!
//! let mut reporter = display.tracker("Computing checksums...", 2);
//! reporter.advance("a.txt");
//! reporter.advance("b.txt");
//! reporter.finish();
//! assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 2]);
//! ```

use crate::types::{ProgressCallback, ProgressInfo};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "└──{prefix} [{bar:30}] {percent}% ({pos}/{len}) - (processing '{msg}')";
const MARKER_TEMPLATE: &str = "{spinner} {prefix}{msg}";
const DONE_TEMPLATE: &str = "{prefix}{msg}";

/// Where progress events are rendered
#[derive(Clone, Default)]
pub enum ProgressDisplay {
    /// Discard progress
    #[default]
    Hidden,
    /// Draw progress bars on the terminal
    Terminal,
    /// Deliver progress to a callback
    Callback(ProgressCallback),
}

impl fmt::Debug for ProgressDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressDisplay::Hidden => f.write_str("Hidden"),
            ProgressDisplay::Terminal => f.write_str("Terminal"),
            ProgressDisplay::Callback(_) => f.write_str("Callback(<fn>)"),
        }
    }
}

impl ProgressDisplay {
    /// Terminal display when `verbose`, hidden otherwise
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            ProgressDisplay::Terminal
        } else {
            ProgressDisplay::Hidden
        }
    }

    /// Display delivering events to `f`
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(ProgressInfo) + Send + Sync + 'static,
    {
        ProgressDisplay::Callback(Arc::new(f))
    }

    /// Whether events are rendered anywhere
    ///
    /// Stages skip extra work (counting entries, verbose tool output) when
    /// this is false.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ProgressDisplay::Hidden)
    }

    /// Start tracking `total` items for `operation`
    pub fn tracker(&self, operation: &str, total: u64) -> ProgressReporter {
        let sink = match self {
            ProgressDisplay::Hidden => Sink::Hidden,
            ProgressDisplay::Terminal => {
                let bar = ProgressBar::new(total);
                bar.set_style(style(BAR_TEMPLATE).progress_chars("█░"));
                bar.set_prefix(operation.to_string());
                bar.println(operation);
                Sink::Bar(bar)
            }
            ProgressDisplay::Callback(cb) => Sink::Callback(cb.clone()),
        };
        ProgressReporter::start(operation, Some(total), sink)
    }

    /// Start a step that only reports start and completion
    pub fn marker(&self, operation: &str) -> ProgressReporter {
        let sink = match self {
            ProgressDisplay::Hidden => Sink::Hidden,
            ProgressDisplay::Terminal => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(style(MARKER_TEMPLATE));
                bar.set_prefix(operation.to_string());
                bar.enable_steady_tick(Duration::from_millis(120));
                Sink::Bar(bar)
            }
            ProgressDisplay::Callback(cb) => Sink::Callback(cb.clone()),
        };
        ProgressReporter::start(operation, None, sink)
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

enum Sink {
    Hidden,
    Bar(ProgressBar),
    Callback(ProgressCallback),
}

/// Counts processed items for one operation and renders them
pub struct ProgressReporter {
    operation: String,
    total: Option<u64>,
    processed: u64,
    finished: bool,
    sink: Sink,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("operation", &self.operation)
            .field("total", &self.total)
            .field("processed", &self.processed)
            .field("finished", &self.finished)
            .finish()
    }
}

impl ProgressReporter {
    fn start(operation: &str, total: Option<u64>, sink: Sink) -> Self {
        let reporter = Self {
            operation: operation.to_string(),
            total,
            processed: 0,
            finished: false,
            sink,
        };
        reporter.emit(None);
        reporter
    }

    /// Items processed so far
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Replace the total once it becomes known
    pub fn set_total(&mut self, total: u64) {
        self.total = Some(total);
        if let Sink::Bar(bar) = &self.sink {
            bar.set_length(total);
        }
    }

    /// Record one processed item
    pub fn advance(&mut self, item: &str) {
        self.processed += 1;
        if let Sink::Bar(bar) = &self.sink {
            bar.set_message(item.to_string());
            bar.inc(1);
        }
        self.emit(Some(item));
    }

    /// Mark the operation complete
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Sink::Bar(bar) = &self.sink {
            bar.set_style(style(DONE_TEMPLATE));
            bar.finish_with_message("DONE");
        }
        self.emit(None);
    }

    fn emit(&self, item: Option<&str>) {
        if let Sink::Callback(cb) = &self.sink {
            cb(ProgressInfo {
                operation: self.operation.clone(),
                current_item: item.map(str::to_string),
                processed: self.processed,
                total: self.total,
                finished: self.finished,
            });
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Sink::Bar(bar) = &self.sink {
            bar.abandon();
        }
    }
}
