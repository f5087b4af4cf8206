//! src/progress.rs
//!
//! Progress reporting for long batch runs.
//!
//! The coordinator only knows the `ProgressSink` trait; it calls
//! `report` on a bounded cadence and treats the call as fire-and-forget.
//! `TerminalProgress` is the stock implementation: a fixed-width bar
//! rewritten in place on stderr with a remaining-time estimate.

use std::time::{Duration, Instant};

/// Receives progress reports from a running pool.
///
/// `fraction` is in `[0, 1]`, `message` is a short human-readable
/// summary (completion count, rate), and `started` is the instant the
/// run began, for callers that want their own time estimates.
/// Implementations must not block meaningfully.
pub trait ProgressSink {
    fn report(&mut self, fraction: f64, message: &str, started: Instant);
}

/// A mutable reference to a sink is itself a sink, so callers can keep
/// ownership (and inspect the sink after the run).
impl<T: ProgressSink + ?Sized> ProgressSink for &mut T {
    fn report(&mut self, fraction: f64, message: &str, started: Instant) {
        (**self).report(fraction, message, started)
    }
}

/// Discards every report. For callers with no terminal to draw on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn report(&mut self, _fraction: f64, _message: &str, _started: Instant) {}
}

/// Renders `message: [=====>    ]  42% - 0:01:23` to stderr, rewriting
/// the line in place. The trailing time is the estimated remainder,
/// extrapolated from the elapsed time; at 100% it switches to the total
/// and the line is finished with a newline.
#[derive(Debug, Clone)]
pub struct TerminalProgress {
    width: usize,
}

const DEFAULT_WIDTH: usize = 64;

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            width: DEFAULT_WIDTH,
        }
    }

    /// Total line width in characters, message and decorations included.
    pub fn with_width(width: usize) -> Self {
        Self { width }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn report(&mut self, fraction: f64, message: &str, started: Instant) {
        let line = render_bar(self.width, fraction, message, started.elapsed());
        if fraction >= 1.0 {
            eprintln!("\r{line}");
        } else {
            eprint!("\r{line}");
        }
    }
}

/// Formats a duration as `h:mm:ss`.
fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Pure rendering of one progress line, separated out for tests.
pub(crate) fn render_bar(width: usize, fraction: f64, message: &str, elapsed: Duration) -> String {
    let fraction = fraction.clamp(0.0, 1.0);

    let head = if message.is_empty() {
        "[".to_owned()
    } else {
        format!("{message}: [")
    };
    let time = if fraction == 0.0 {
        "?:??:??".to_owned()
    } else if fraction < 1.0 {
        // Remaining = elapsed * (1/f - 1).
        format_hms(elapsed.mul_f64(1.0 / fraction - 1.0))
    } else {
        format_hms(elapsed)
    };
    let tail = format!("] {:>3}% - {}", (fraction * 100.0) as u32, time);

    let bar_len = width.saturating_sub(head.len() + tail.len()).max(4);
    let bar = if fraction >= 1.0 {
        "=".repeat(bar_len)
    } else {
        let filled = ((fraction * bar_len as f64).ceil() as usize).min(bar_len);
        if filled == 0 {
            " ".repeat(bar_len)
        } else {
            format!("{}{}{}", "=".repeat(filled - 1), ">", " ".repeat(bar_len - filled))
        }
    };

    format!("{head}{bar}{tail}")
}
