//! Progress rendering with indicatif
//!
//! A single bar follows the tracked session. It switches to a spinner while the
//! current phase has no meaningful check count and back to a percentage bar
//! once it does.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::domain::models::{CoordinatorState, DiscoveryView, Progress};

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}";
const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";

const PROGRESS_CHARS: &str = "█▓▒░ ";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(PROGRESS_CHARS)
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS)
}

/// Create a percentage bar (0 to 100)
pub fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(bar_style());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Live rendering of a [`DiscoveryView`] stream
pub struct DiscoveryProgress {
    bar: ProgressBar,
    indeterminate: bool,
}

impl DiscoveryProgress {
    /// Start with a percentage bar
    pub fn new() -> Self {
        Self {
            bar: create_progress_bar(),
            indeterminate: false,
        }
    }

    /// Render a bar that never draws (tests, non-terminals)
    pub fn hidden() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(100);
        Self {
            bar,
            indeterminate: false,
        }
    }

    /// Redraw for a new snapshot
    pub fn update(&mut self, view: &DiscoveryView) {
        match view.progress {
            Progress::Percent(percent) => {
                if self.indeterminate {
                    self.bar.set_style(bar_style());
                    self.bar.set_length(100);
                    self.indeterminate = false;
                }
                self.bar.set_position(percent_position(percent));
            }
            Progress::Indeterminate => {
                if !self.indeterminate {
                    self.bar.set_style(spinner_style());
                    self.indeterminate = true;
                }
            }
        }
        self.bar.set_message(status_line(view));
    }

    /// Leave the final state on screen
    pub fn finish(&self, view: &DiscoveryView) {
        if view.state == CoordinatorState::Complete {
            self.bar.set_position(100);
        }
        self.bar.finish_with_message(status_line(view));
    }

    /// Stop drawing without claiming completion
    pub fn detach(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }

    /// Current bar position
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Whether the spinner is shown
    pub const fn is_indeterminate(&self) -> bool {
        self.indeterminate
    }
}

impl Default for DiscoveryProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent_position(percent: f64) -> u64 {
    percent.clamp(0.0, 100.0).floor() as u64
}

/// One-line summary: state, phase, checks, and the current warning
pub fn status_line(view: &DiscoveryView) -> String {
    let mut parts = vec![view.state.to_string()];

    if let Some(session) = &view.session {
        if let Some(phase) = session.current_phase {
            parts.push(phase.to_string());
        }
        if session.total_checks > 0 {
            parts.push(format!(
                "{}/{} checks",
                session.completed_checks, session.total_checks
            ));
        }
    }

    if let Some(error) = &view.last_error {
        parts.push(format!("error: {error}"));
    } else if let Some(warning) = &view.warning {
        parts.push(format!("warning: {warning}"));
    }

    parts.join(" · ")
}
