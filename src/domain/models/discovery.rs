//! Domain models for strategy discovery sessions.
//!
//! A discovery session is one server-side search over a space of packet-mangling
//! presets. The Discovery Service reports it back as a full snapshot on every
//! status request; the client never patches a session in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status reported by the Discovery Service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    /// Accepted but not yet scheduled
    Pending,
    /// Checks are being executed
    Running,
    /// All checks finished
    #[serde(alias = "completed")]
    Complete,
    /// The search aborted on the service side
    Failed,
    /// The search was canceled
    #[serde(alias = "cancelled")]
    Canceled,
}

impl DiscoveryStatus {
    /// Returns true once no further status change is expected.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Canceled)
    }

    /// Returns the wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered stage of the search.
///
/// `Fingerprint` belongs to the older search engine vocabulary and is kept as a
/// compatibility input. Anything the client does not know maps to `Unknown`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPhase {
    /// Unmodified traffic measurement
    Baseline,
    /// Per-family strategy probing
    #[default]
    StrategyDetection,
    /// Parameter tuning of working strategies
    Optimization,
    /// Combining working strategies
    Combination,
    /// DNS tampering detection
    DnsDetection,
    /// DPI fingerprinting (legacy engine)
    Fingerprint,
    /// Phase name not known to this client
    #[serde(other)]
    Unknown,
}

impl DiscoveryPhase {
    /// Every phase bucket, in display order.
    pub const ALL: [Self; 7] = [
        Self::Baseline,
        Self::StrategyDetection,
        Self::Optimization,
        Self::Combination,
        Self::DnsDetection,
        Self::Fingerprint,
        Self::Unknown,
    ];

    /// Phases whose check count is not known up front.
    pub const fn is_indeterminate(self) -> bool {
        matches!(self, Self::DnsDetection | Self::Fingerprint)
    }

    /// Returns the wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::StrategyDetection => "strategy_detection",
            Self::Optimization => "optimization",
            Self::Combination => "combination",
            Self::DnsDetection => "dns_detection",
            Self::Fingerprint => "fingerprint",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of a bypass technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    /// Plain, unmodified traffic
    None,
    /// TCP segmentation of the first payload
    TcpFrag,
    /// TLS record splitting
    TlsRec,
    /// Out-of-band byte injection
    Oob,
    /// Fake packets with a low TTL or bad checksum
    Fake,
    /// Fake ClientHello carrying a decoy SNI
    FakeSni,
    /// Segment reordering
    Disorder,
    /// Generic desynchronisation
    Desync,
    /// Several families chained together
    Combo,
    /// Family mix tuned per target
    Hybrid,
    /// Overlapping segments (legacy engine)
    Overlap,
    /// Family name not known to this client
    #[serde(other)]
    Unknown,
}

impl StrategyFamily {
    /// Returns the wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::TcpFrag => "tcp_frag",
            Self::TlsRec => "tls_rec",
            Self::Oob => "oob",
            Self::Fake => "fake",
            Self::FakeSni => "fake_sni",
            Self::Disorder => "disorder",
            Self::Desync => "desync",
            Self::Combo => "combo",
            Self::Hybrid => "hybrid",
            Self::Overlap => "overlap",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StrategyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single preset trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// The fetch through this preset succeeded
    #[serde(alias = "success", alias = "completed")]
    Complete,
    /// The fetch failed or was blocked
    #[serde(alias = "error")]
    Failed,
}

/// One preset tried against one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigTrial {
    /// Preset name, unique within its domain
    #[serde(default)]
    pub preset_name: String,

    /// Strategy family, when the service reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<StrategyFamily>,

    /// Search phase that produced this trial
    #[serde(default)]
    pub phase: DiscoveryPhase,

    /// Trial outcome
    pub status: TrialStatus,

    /// Throughput in bytes per second
    #[serde(default)]
    pub speed: f64,

    /// Wall time in milliseconds
    #[serde(default)]
    pub duration: f64,

    /// Bytes fetched during the trial
    #[serde(default)]
    pub bytes_read: u64,

    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// HTTP status observed on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ConfigTrial {
    /// Returns true when the trial's metrics are meaningful.
    pub fn is_complete(&self) -> bool {
        self.status == TrialStatus::Complete
    }
}

/// All trials run against one target domain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainResult {
    /// Domain name (duplicates the map key)
    #[serde(default)]
    pub domain: String,

    /// Trials keyed by preset name
    #[serde(default)]
    pub results: BTreeMap<String, ConfigTrial>,

    /// Fastest complete trial
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_preset: Option<String>,

    /// Speed of `best_preset`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_speed: Option<f64>,

    /// Whether `best_preset` succeeded
    #[serde(default)]
    pub best_success: bool,

    /// Unmodified-traffic speed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_speed: Option<f64>,

    /// Percentage change of `best_speed` relative to `baseline_speed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement: Option<f64>,
}

/// Full snapshot of a discovery run as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySession {
    /// Server-assigned session identifier
    pub id: String,

    /// Lifecycle status
    pub status: DiscoveryStatus,

    /// Checks planned for the whole run
    #[serde(default)]
    pub total_checks: u64,

    /// Checks finished so far
    #[serde(default)]
    pub completed_checks: u64,

    /// Phase currently executing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<DiscoveryPhase>,

    /// Per-domain results keyed by domain name
    #[serde(default)]
    pub domain_results: BTreeMap<String, DomainResult>,

    /// Service-side failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the service accepted the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl DiscoverySession {
    /// Returns true once the service reports a terminal status.
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Tuning knobs forwarded to the Discovery Service with a start request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Per-check timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u32>,

    /// Maximum checks executed in parallel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<u32>,

    /// Phases the service should not run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_phases: Vec<DiscoveryPhase>,

    /// Restrict the search to these presets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<String>,

    /// Service-specific options passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// What the search should be run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryTarget {
    /// A bare domain name
    Domain(String),
    /// A full URL
    Url(String),
}

impl DiscoveryTarget {
    /// Classifies operator input. Returns `None` for blank input.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(Self::Url(trimmed.to_string()))
        } else {
            Some(Self::Domain(trimmed.to_string()))
        }
    }

    /// Returns the raw target string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Domain(value) | Self::Url(value) => value,
        }
    }
}

/// Body of `POST /discovery`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartRequest {
    /// Target, serialised as either `domain` or `url`
    #[serde(flatten)]
    pub target: DiscoveryTarget,

    /// Options, serialised next to the target
    #[serde(flatten)]
    pub options: StartOptions,
}

/// Successful answer to a start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    /// Session identifier to poll
    pub id: String,

    /// Number of checks the service expects to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_tests: Option<u64>,

    /// Free-form acknowledgement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trial_phase_defaults_to_strategy_detection() {
        let trial: ConfigTrial = serde_json::from_value(json!({
            "status": "complete",
            "speed": 1024.0
        }))
        .unwrap();

        assert_eq!(trial.phase, DiscoveryPhase::StrategyDetection);
        assert!(trial.family.is_none());
        assert_eq!(trial.bytes_read, 0);
    }

    #[test]
    fn test_unknown_vocabulary_maps_to_fallback() {
        let trial: ConfigTrial = serde_json::from_value(json!({
            "status": "failed",
            "phase": "quantum_tunneling",
            "family": "teleport",
            "error": "connection reset",
            "status_code": 403
        }))
        .unwrap();

        assert_eq!(trial.phase, DiscoveryPhase::Unknown);
        assert_eq!(trial.family, Some(StrategyFamily::Unknown));
        assert_eq!(trial.status_code, Some(403));
    }

    #[test]
    fn test_legacy_vocabulary_is_accepted() {
        let trial: ConfigTrial = serde_json::from_value(json!({
            "status": "complete",
            "phase": "fingerprint",
            "family": "overlap"
        }))
        .unwrap();

        assert_eq!(trial.phase, DiscoveryPhase::Fingerprint);
        assert_eq!(trial.family, Some(StrategyFamily::Overlap));
    }

    #[test]
    fn test_status_aliases() {
        let status: DiscoveryStatus = serde_json::from_value(json!("cancelled")).unwrap();
        assert_eq!(status, DiscoveryStatus::Canceled);

        let status: DiscoveryStatus = serde_json::from_value(json!("completed")).unwrap();
        assert_eq!(status, DiscoveryStatus::Complete);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!DiscoveryStatus::Pending.is_terminal());
        assert!(!DiscoveryStatus::Running.is_terminal());
        assert!(DiscoveryStatus::Complete.is_terminal());
        assert!(DiscoveryStatus::Failed.is_terminal());
        assert!(DiscoveryStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_session_parses_minimal_payload() {
        let session: DiscoverySession = serde_json::from_value(json!({
            "id": "abc",
            "status": "running",
            "total_checks": 12,
            "completed_checks": 3,
            "domain_results": {
                "youtube.com": {
                    "results": {
                        "tcp_frag": {"status": "complete", "speed": 1048576}
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(session.id, "abc");
        assert!(session.current_phase.is_none());
        let domain = &session.domain_results["youtube.com"];
        assert!(domain.best_preset.is_none());
        assert_eq!(domain.results["tcp_frag"].speed, 1_048_576.0);
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(DiscoveryTarget::parse("   "), None);
        assert_eq!(
            DiscoveryTarget::parse(" youtube.com "),
            Some(DiscoveryTarget::Domain("youtube.com".to_string()))
        );
        assert_eq!(
            DiscoveryTarget::parse("HTTPS://rutracker.org/forum"),
            Some(DiscoveryTarget::Url("HTTPS://rutracker.org/forum".to_string()))
        );
    }

    #[test]
    fn test_start_request_serialization() {
        let mut options = StartOptions {
            timeout_secs: Some(5),
            skip_phases: vec![DiscoveryPhase::DnsDetection],
            ..Default::default()
        };
        options.extra.insert("verbose".to_string(), json!(true));

        let request = StartRequest {
            target: DiscoveryTarget::Domain("youtube.com".to_string()),
            options,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "domain": "youtube.com",
                "timeout_secs": 5,
                "skip_phases": ["dns_detection"],
                "verbose": true
            })
        );
    }
}
