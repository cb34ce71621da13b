//! Read-only view model published by the session coordinator.
//!
//! Every coordinator transition produces a fresh `DiscoveryView`; consumers only
//! ever see complete snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use super::discovery::{ConfigTrial, DiscoveryPhase, DiscoverySession};

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// No session tracked
    #[default]
    Idle,
    /// Start accepted, no status received yet
    Starting,
    /// Status updates are being received
    Running,
    /// The service finished the search
    Complete,
    /// The service (or an unrecoverable resume) failed the search
    Failed,
    /// Tracking stopped by the operator or the service
    Canceled,
}

impl CoordinatorState {
    /// Returns true for `Complete`, `Failed` and `Canceled`.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Canceled)
    }

    /// Returns true while a remote session is being tracked.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Returns the lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived progress of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum Progress {
    /// Completed share of all checks, 0 to 100
    Percent(f64),
    /// The current phase has no meaningful check count
    Indeterminate,
}

impl Progress {
    /// Returns the percentage, if determinate.
    pub const fn percent(self) -> Option<f64> {
        match self {
            Self::Percent(value) => Some(value),
            Self::Indeterminate => None,
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::Percent(0.0)
    }
}

/// Per-domain summary row, ordered by `best_speed`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDomain {
    /// Domain name
    pub domain: String,
    /// Fastest complete preset
    pub best_preset: Option<String>,
    /// Its speed in bytes per second
    pub best_speed: Option<f64>,
    /// Percentage change against the baseline
    pub improvement: Option<f64>,
    /// Number of trials reported
    pub trials: usize,
    /// Number of complete trials
    pub succeeded: usize,
}

/// Trials of one domain that belong to one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseGroup {
    /// Phase bucket
    pub phase: DiscoveryPhase,
    /// Trials sorted by preset name
    pub trials: Vec<ConfigTrial>,
}

/// Severity of an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// Normal lifecycle event
    Info,
    /// Recoverable problem
    Warn,
    /// Terminal problem
    Error,
}

/// One line of the coordinator's activity log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    /// When it happened
    pub at: DateTime<Utc>,
    /// Severity
    pub level: ActivityLevel,
    /// What happened
    pub message: String,
}

/// Snapshot handed to the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryView {
    /// Coordinator state
    pub state: CoordinatorState,
    /// Id of the tracked session, known before the first snapshot arrives
    pub session_id: Option<String>,
    /// Last accepted session snapshot
    pub session: Option<DiscoverySession>,
    /// Whether the tracked id has been confirmed by the service
    pub confirmed: bool,
    /// Progress derived from `session`
    pub progress: Progress,
    /// Domains ordered by best speed, failed ones last
    pub ranked_domains: Vec<RankedDomain>,
    /// Trials per domain, bucketed by phase
    pub grouped_results: BTreeMap<String, Vec<PhaseGroup>>,
    /// Start rejection or terminal failure message
    pub last_error: Option<String>,
    /// Latest transient problem, cleared by the next good update
    pub warning: Option<String>,
    /// Recent coordinator events, oldest first
    pub activity: Vec<ActivityEntry>,
}

impl DiscoveryView {
    /// Best preset of `domain`, if one has succeeded.
    pub fn best_preset(&self, domain: &str) -> Option<&str> {
        self.ranked_domains
            .iter()
            .find(|ranked| ranked.domain == domain)
            .and_then(|ranked| ranked.best_preset.as_deref())
    }

    /// Domain names in ranking order.
    pub fn ranked_domain_names(&self) -> Vec<&str> {
        self.ranked_domains
            .iter()
            .map(|ranked| ranked.domain.as_str())
            .collect()
    }
}
