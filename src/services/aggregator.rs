//! Result aggregation for discovery sessions.
//!
//! Pure functions over a complete session snapshot: best trial selection, phase
//! bucketing, progress derivation, domain ranking and baseline improvement.
//! None of them keep state, so calling any of them twice on the same snapshot
//! yields the same answer.

use std::cmp::Ordering;

use crate::domain::models::{
    ConfigTrial, DiscoveryPhase, DiscoverySession, DomainResult, PhaseGroup, Progress,
    RankedDomain,
};

/// Selects the fastest complete trial of a domain.
///
/// Trials are scanned in preset-name order and only a strictly faster trial
/// replaces the current pick, so equal speeds resolve to the name that sorts
/// first.
pub fn best_trial(domain: &DomainResult) -> Option<(&str, &ConfigTrial)> {
    let mut best: Option<(&str, &ConfigTrial)> = None;

    for (name, trial) in &domain.results {
        if !trial.is_complete() {
            continue;
        }
        match best {
            Some((_, current)) if trial.speed <= current.speed => {}
            _ => best = Some((name.as_str(), trial)),
        }
    }

    best
}

/// Partitions a domain's trials into every phase bucket, in display order.
///
/// Buckets without trials are kept so callers can render a stable layout.
pub fn group_by_phase(domain: &DomainResult) -> Vec<PhaseGroup> {
    DiscoveryPhase::ALL
        .iter()
        .map(|&phase| PhaseGroup {
            phase,
            trials: domain
                .results
                .iter()
                .filter(|(_, trial)| trial.phase == phase)
                .map(|(name, trial)| with_name(name, trial))
                .collect(),
        })
        .collect()
}

/// Derives session progress.
///
/// Returns `Indeterminate` while a phase with an unknown check count runs,
/// otherwise `completed / total` clamped to 0..=100, and 0 for an empty plan.
pub fn progress(session: &DiscoverySession) -> Progress {
    if session
        .current_phase
        .is_some_and(DiscoveryPhase::is_indeterminate)
    {
        return Progress::Indeterminate;
    }

    if session.total_checks == 0 {
        return Progress::Percent(0.0);
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = session.completed_checks as f64 / session.total_checks as f64;
    Progress::Percent(ratio.clamp(0.0, 1.0) * 100.0)
}

/// Speed of the unmodified-traffic measurement.
///
/// Prefers the value reported by the service and falls back to the fastest
/// complete trial of the baseline phase.
pub fn baseline_speed(domain: &DomainResult) -> Option<f64> {
    domain.baseline_speed.or_else(|| {
        domain
            .results
            .values()
            .filter(|trial| trial.is_complete() && trial.phase == DiscoveryPhase::Baseline)
            .map(|trial| trial.speed)
            .fold(None, |acc: Option<f64>, speed| {
                Some(acc.map_or(speed, |current| current.max(speed)))
            })
    })
}

/// Percentage change of the best speed against the baseline.
///
/// Absent until a complete non-baseline trial exists, and whenever the
/// baseline is missing or not positive. The sign is kept, so a regression
/// shows up as a negative value.
pub fn improvement(domain: &DomainResult) -> Option<f64> {
    let has_strategy_success = domain
        .results
        .values()
        .any(|trial| trial.is_complete() && trial.phase != DiscoveryPhase::Baseline);
    if !has_strategy_success {
        return None;
    }

    let (_, best) = best_trial(domain)?;
    let baseline = baseline_speed(domain)?;
    if baseline <= 0.0 {
        return None;
    }

    Some((best.speed - baseline) / baseline * 100.0)
}

/// Orders domains by best speed, fastest first.
///
/// Domains without a complete trial sort after every successful one (including
/// a success at speed 0). Equal speeds fall back to the domain name.
pub fn rank_domains(session: &DiscoverySession) -> Vec<RankedDomain> {
    let mut ranked: Vec<RankedDomain> = session
        .domain_results
        .iter()
        .map(|(name, domain)| {
            let best = best_trial(domain);
            RankedDomain {
                domain: name.clone(),
                best_preset: best.map(|(preset, _)| preset.to_string()),
                best_speed: best.map(|(_, trial)| trial.speed),
                improvement: improvement(domain),
                trials: domain.results.len(),
                succeeded: domain.results.values().filter(|t| t.is_complete()).count(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        compare_speed_desc(a.best_speed, b.best_speed).then_with(|| a.domain.cmp(&b.domain))
    });
    ranked
}

/// Rewrites a freshly received snapshot so its cached fields agree with its trials.
///
/// Fills each domain and preset name from its map key and recomputes the best
/// preset, baseline and improvement, so `best_preset` always names a complete
/// trial that exists in `results`.
pub fn reconcile(mut session: DiscoverySession) -> DiscoverySession {
    for (name, domain) in &mut session.domain_results {
        domain.domain.clone_from(name);
        for (preset, trial) in &mut domain.results {
            trial.preset_name.clone_from(preset);
        }

        let best = best_trial(domain).map(|(preset, trial)| (preset.to_string(), trial.speed));
        domain.best_success = best.is_some();
        domain.best_speed = best.as_ref().map(|(_, speed)| *speed);
        domain.best_preset = best.map(|(preset, _)| preset);
        domain.baseline_speed = baseline_speed(domain);
        domain.improvement = improvement(domain);
    }
    session
}

fn with_name(name: &str, trial: &ConfigTrial) -> ConfigTrial {
    let mut trial = trial.clone();
    if trial.preset_name.is_empty() {
        trial.preset_name = name.to_string();
    }
    trial
}

fn compare_speed_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DiscoveryStatus, TrialStatus};
    use std::collections::BTreeMap;

    fn trial(status: TrialStatus, speed: f64, phase: DiscoveryPhase) -> ConfigTrial {
        ConfigTrial {
            preset_name: String::new(),
            family: None,
            phase,
            status,
            speed,
            duration: 250.0,
            bytes_read: 65_536,
            error: None,
            status_code: None,
        }
    }

    fn complete(speed: f64) -> ConfigTrial {
        trial(TrialStatus::Complete, speed, DiscoveryPhase::StrategyDetection)
    }

    fn failed() -> ConfigTrial {
        let mut t = trial(TrialStatus::Failed, 0.0, DiscoveryPhase::StrategyDetection);
        t.error = Some("connection reset by peer".to_string());
        t
    }

    fn domain(trials: Vec<(&str, ConfigTrial)>) -> DomainResult {
        DomainResult {
            results: trials
                .into_iter()
                .map(|(name, t)| (name.to_string(), t))
                .collect(),
            ..Default::default()
        }
    }

    fn session(total: u64, completed: u64) -> DiscoverySession {
        DiscoverySession {
            id: "abc".to_string(),
            status: DiscoveryStatus::Running,
            total_checks: total,
            completed_checks: completed,
            current_phase: None,
            domain_results: BTreeMap::new(),
            error: None,
            started_at: None,
        }
    }

    #[test]
    fn test_best_trial_picks_fastest_complete() {
        let d = domain(vec![
            ("fake_sni", complete(200.0)),
            ("tcp_frag", complete(900.0)),
            ("disorder", failed()),
        ]);

        let (name, best) = best_trial(&d).unwrap();
        assert_eq!(name, "tcp_frag");
        assert!((best.speed - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_best_trial_ignores_failed_even_if_faster() {
        let mut fast_failure = failed();
        fast_failure.speed = 10_000.0;
        let d = domain(vec![("oob", fast_failure), ("tls_rec", complete(1.0))]);

        assert_eq!(best_trial(&d).map(|(name, _)| name), Some("tls_rec"));
    }

    #[test]
    fn test_best_trial_none_without_success() {
        let d = domain(vec![("a", failed()), ("b", failed())]);
        assert!(best_trial(&d).is_none());
        assert!(best_trial(&DomainResult::default()).is_none());
    }

    #[test]
    fn test_best_trial_tie_breaks_on_sorted_name() {
        let d = domain(vec![("zeta", complete(500.0)), ("alpha", complete(500.0))]);

        for _ in 0..3 {
            assert_eq!(best_trial(&d).map(|(name, _)| name), Some("alpha"));
        }
    }

    #[test]
    fn test_group_by_phase_buckets_and_defaults() {
        let d = domain(vec![
            ("none", trial(TrialStatus::Complete, 100.0, DiscoveryPhase::Baseline)),
            ("tcp_frag", complete(300.0)),
            (
                "combo_1",
                trial(TrialStatus::Complete, 400.0, DiscoveryPhase::Combination),
            ),
            (
                "mystery",
                trial(TrialStatus::Failed, 0.0, DiscoveryPhase::Unknown),
            ),
        ]);

        let groups = group_by_phase(&d);
        assert_eq!(groups.len(), DiscoveryPhase::ALL.len());

        let names = |phase: DiscoveryPhase| -> Vec<String> {
            groups
                .iter()
                .find(|g| g.phase == phase)
                .unwrap()
                .trials
                .iter()
                .map(|t| t.preset_name.clone())
                .collect()
        };

        assert_eq!(names(DiscoveryPhase::Baseline), vec!["none"]);
        assert_eq!(names(DiscoveryPhase::StrategyDetection), vec!["tcp_frag"]);
        assert_eq!(names(DiscoveryPhase::Combination), vec!["combo_1"]);
        assert_eq!(names(DiscoveryPhase::Unknown), vec!["mystery"]);
        assert!(names(DiscoveryPhase::Optimization).is_empty());
    }

    #[test]
    fn test_progress_basic() {
        assert_eq!(progress(&session(12, 3)), Progress::Percent(25.0));
        assert_eq!(progress(&session(4, 4)), Progress::Percent(100.0));
    }

    #[test]
    fn test_progress_zero_total_is_zero() {
        let p = progress(&session(0, 0));
        assert_eq!(p, Progress::Percent(0.0));
        assert!(!p.percent().unwrap().is_nan());
    }

    #[test]
    fn test_progress_clamps_overshoot() {
        assert_eq!(progress(&session(10, 15)), Progress::Percent(100.0));
    }

    #[test]
    fn test_progress_indeterminate_phases() {
        let mut s = session(10, 5);
        s.current_phase = Some(DiscoveryPhase::DnsDetection);
        assert_eq!(progress(&s), Progress::Indeterminate);

        s.current_phase = Some(DiscoveryPhase::Fingerprint);
        assert_eq!(progress(&s), Progress::Indeterminate);

        s.current_phase = Some(DiscoveryPhase::Optimization);
        assert_eq!(progress(&s), Progress::Percent(50.0));
    }

    #[test]
    fn test_rank_domains_failed_sort_last() {
        let mut s = session(10, 10);
        s.domain_results
            .insert("blocked.example".to_string(), domain(vec![("a", failed())]));
        s.domain_results
            .insert("zero.example".to_string(), domain(vec![("a", complete(0.0))]));
        s.domain_results
            .insert("fast.example".to_string(), domain(vec![("a", complete(5000.0))]));
        s.domain_results
            .insert("slow.example".to_string(), domain(vec![("a", complete(10.0))]));

        let order: Vec<String> = rank_domains(&s).into_iter().map(|r| r.domain).collect();
        assert_eq!(
            order,
            vec!["fast.example", "slow.example", "zero.example", "blocked.example"]
        );
    }

    #[test]
    fn test_rank_domains_counts() {
        let mut s = session(3, 3);
        s.domain_results.insert(
            "youtube.com".to_string(),
            domain(vec![("a", complete(1.0)), ("b", failed()), ("c", complete(3.0))]),
        );

        let ranked = rank_domains(&s);
        assert_eq!(ranked[0].trials, 3);
        assert_eq!(ranked[0].succeeded, 2);
        assert_eq!(ranked[0].best_preset.as_deref(), Some("c"));
    }

    #[test]
    fn test_improvement_against_reported_baseline() {
        let mut d = domain(vec![("tcp_frag", complete(300.0))]);
        d.baseline_speed = Some(100.0);
        assert_eq!(improvement(&d), Some(200.0));
    }

    #[test]
    fn test_improvement_from_baseline_trial() {
        let d = domain(vec![
            ("none", trial(TrialStatus::Complete, 200.0, DiscoveryPhase::Baseline)),
            ("tls_rec", complete(100.0)),
        ]);

        // The baseline trial itself is the fastest here; nothing beat it.
        assert_eq!(improvement(&d), Some(0.0));
    }

    #[test]
    fn test_improvement_keeps_negative_sign() {
        let mut d = domain(vec![("tcp_frag", complete(50.0))]);
        d.baseline_speed = Some(100.0);
        assert_eq!(improvement(&d), Some(-50.0));
    }

    #[test]
    fn test_improvement_absent_cases() {
        let mut d = domain(vec![("tcp_frag", complete(50.0))]);
        assert_eq!(improvement(&d), None, "no baseline");

        d.baseline_speed = Some(0.0);
        assert_eq!(improvement(&d), None, "zero baseline");

        let only_baseline = domain(vec![(
            "none",
            trial(TrialStatus::Complete, 200.0, DiscoveryPhase::Baseline),
        )]);
        assert_eq!(improvement(&only_baseline), None, "no strategy success yet");
    }

    #[test]
    fn test_reconcile_overrides_stale_cached_fields() {
        let mut s = session(2, 2);
        let mut d = domain(vec![("tcp_frag", complete(700.0)), ("oob", failed())]);
        d.best_preset = Some("oob".to_string());
        d.best_speed = Some(9_999.0);
        s.domain_results.insert("youtube.com".to_string(), d);

        let s = reconcile(s);
        let d = &s.domain_results["youtube.com"];
        assert_eq!(d.domain, "youtube.com");
        assert_eq!(d.best_preset.as_deref(), Some("tcp_frag"));
        assert_eq!(d.best_speed, Some(700.0));
        assert!(d.best_success);
        assert_eq!(d.results["oob"].preset_name, "oob");
    }

    #[test]
    fn test_reconcile_clears_best_without_success() {
        let mut s = session(1, 1);
        let mut d = domain(vec![("oob", failed())]);
        d.best_preset = Some("oob".to_string());
        s.domain_results.insert("x.example".to_string(), d);

        let s = reconcile(s);
        let d = &s.domain_results["x.example"];
        assert!(d.best_preset.is_none());
        assert!(d.best_speed.is_none());
        assert!(!d.best_success);
    }
}
