//! Wave-ordered contributor orchestration (§4.5).

use std::time::{Duration, Instant};

use crate::contributors::blackboard::RequestBlackboard;
use crate::core::model::DetectionContribution;

/// A predicate over the blackboard's signals, gating when a contributor
/// becomes eligible to run. An empty set of trigger conditions makes a
/// contributor a "first-wave" contributor.
pub type TriggerCondition = fn(&RequestBlackboard) -> bool;

/// A single classifier component observing the blackboard.
pub trait Contributor: Send + Sync {
    fn name(&self) -> &'static str;
    /// Lower runs earlier.
    fn priority(&self) -> i32;
    /// `None` means no deadline (reserved for required contributors run on
    /// trusted, in-process logic only).
    fn execution_timeout(&self) -> Option<Duration> {
        if self.is_optional() {
            Some(Duration::from_secs(1))
        } else {
            None
        }
    }
    fn is_optional(&self) -> bool {
        true
    }
    fn trigger_conditions(&self) -> &[TriggerCondition] {
        &[]
    }
    fn is_eligible(&self, board: &RequestBlackboard) -> bool {
        self.trigger_conditions().iter().all(|predicate| predicate(board))
    }

    /// Run the contributor. Implementations must not panic; any internal
    /// failure should be surfaced as a `neutral` contribution describing the
    /// problem, not an unwrap or an `Err` that escapes this call.
    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution>;
}

/// Outcome of one full wave-ordered pass over a contributor set.
pub struct OrchestrationOutcome {
    pub early_exit: bool,
    pub waves_run: usize,
}

/// Run `contributors` against `board` in ascending-priority waves, breaking
/// early the moment any contribution sets `trigger_early_exit`.
///
/// Contributors are partitioned into waves by distinct priority value. Within
/// a wave, contributors run in ascending priority then lexicographic name
/// order (already satisfied by sorting the whole set once up front, since
/// ties only occur within a priority group). After each wave, contributors
/// whose trigger conditions now match become eligible for the next wave —
/// implemented here by re-checking eligibility for every not-yet-run
/// contributor after each wave completes.
pub fn run_waves(contributors: &[Box<dyn Contributor>], board: &RequestBlackboard) -> OrchestrationOutcome {
    run_waves_weighted(contributors, board, |_| 1.0)
}

/// Like [`run_waves`], but each contribution's risk-score delta is scaled by
/// `weight(category)` before being folded into the blackboard — how the
/// slow-path orchestrator applies a policy's per-category weight overrides
/// (§4.6) without duplicating the wave-partitioning logic.
pub fn run_waves_weighted<F>(
    contributors: &[Box<dyn Contributor>],
    board: &RequestBlackboard,
    weight: F,
) -> OrchestrationOutcome
where
    F: Fn(&str) -> f64,
{
    let mut order: Vec<&Box<dyn Contributor>> = contributors.iter().collect();
    order.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())));

    let mut remaining: Vec<&Box<dyn Contributor>> = order;
    let mut waves_run = 0;

    while !remaining.is_empty() {
        let current_priority = remaining[0].priority();
        let (wave, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|c| c.priority() == current_priority);
        remaining = rest;
        waves_run += 1;

        for contributor in &wave {
            if !contributor.is_eligible(board) {
                continue;
            }
            run_one(*contributor, board, &weight);
            if board.has_early_exit() {
                return OrchestrationOutcome {
                    early_exit: true,
                    waves_run,
                };
            }
        }
    }

    OrchestrationOutcome {
        early_exit: false,
        waves_run,
    }
}

/// Invoke one contributor and fold its contributions into the blackboard.
///
/// This orchestrator runs every contributor in-process, cooperatively,
/// single-threaded per request (§5) — there is no async runtime and no
/// worker pool to preempt a contributor mid-call, so `execution_timeout`
/// cannot abort a call while it's running. What it *can* do, and does, is
/// detect an overrun the moment the call returns and discard its result as
/// if it had been cancelled at the deadline (§4.5/§7 `ContributorTimeout`):
/// the late contributions are never folded into the risk score, exactly the
/// same failure handling as a panic. Every built-in contributor (§4.5's
/// catalog) only ever touches the in-memory blackboard, so none can
/// currently overrun; the path exists for a future contributor that performs
/// real blocking I/O (ProjectHoneypot's external lookup, per its contract).
fn run_one<F>(contributor: &dyn Contributor, board: &RequestBlackboard, weight: &F)
where
    F: Fn(&str) -> f64,
{
    let started = Instant::now();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| contributor.run(board)));
    let timed_out = contributor
        .execution_timeout()
        .is_some_and(|deadline| started.elapsed() > deadline);

    match outcome {
        Ok(contributions) if !timed_out => {
            for contribution in contributions {
                let delta = contribution.confidence_delta * weight(&contribution.category);
                board.record(contribution, delta);
            }
            board.mark_completed(contributor.name());
        }
        Ok(_) => {
            // Ran to completion, but past its deadline: treated identically
            // to a timeout failure — its contributions are discarded, not
            // folded in late.
            tracing::warn!(contributor = contributor.name(), "contributor exceeded execution_timeout");
            record_failure(contributor, board);
        }
        Err(_) => {
            record_failure(contributor, board);
        }
    }
}

fn record_failure(contributor: &dyn Contributor, board: &RequestBlackboard) {
    board.mark_failed(contributor.name());
    if !contributor.is_optional() {
        board.record(
            DetectionContribution::neutral(
                contributor.name(),
                format!("contributor failed: {}", contributor.name()),
            ),
            0.0,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HttpRequestContext, ProtocolVersion};

    struct FirstWave;
    impl Contributor for FirstWave {
        fn name(&self) -> &'static str {
            "first"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
            board.set_signal("first.ran", true);
            vec![DetectionContribution::neutral("first", "ran")]
        }
    }

    struct SecondWaveGated;
    impl Contributor for SecondWaveGated {
        fn name(&self) -> &'static str {
            "second"
        }
        fn priority(&self) -> i32 {
            2
        }
        fn trigger_conditions(&self) -> &[TriggerCondition] {
            &[(|board: &RequestBlackboard| board.has_signal("first.ran")) as TriggerCondition]
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<DetectionContribution> {
            vec![DetectionContribution::neutral("second", "ran after first")]
        }
    }

    #[test]
    fn later_wave_observes_earlier_waves_signal() {
        let board = RequestBlackboard::new(HttpRequestContext::new("r1", "GET", "/", ProtocolVersion::Http1_1));
        let contributors: Vec<Box<dyn Contributor>> = vec![Box::new(FirstWave), Box::new(SecondWaveGated)];
        let outcome = run_waves(&contributors, &board);
        assert_eq!(outcome.waves_run, 2);
        let names: Vec<String> = board
            .contributions_snapshot()
            .into_iter()
            .map(|c| c.category)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    struct Panics;
    impl Contributor for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn is_optional(&self) -> bool {
            false
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<DetectionContribution> {
            panic!("boom");
        }
    }

    #[test]
    fn required_contributor_failure_leaves_audit_contribution() {
        let board = RequestBlackboard::new(HttpRequestContext::new("r1", "GET", "/", ProtocolVersion::Http1_1));
        let contributors: Vec<Box<dyn Contributor>> = vec![Box::new(Panics)];
        run_waves(&contributors, &board);
        assert!(board.failed_detectors().contains("panics"));
        let contributions = board.contributions_snapshot();
        assert_eq!(contributions.len(), 1);
        assert!(contributions[0].reason.contains("contributor failed"));
    }

    struct EarlyExiter;
    impl Contributor for EarlyExiter {
        fn name(&self) -> &'static str {
            "early"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<DetectionContribution> {
            vec![DetectionContribution::early_exit(
                "early",
                "verified bad",
                0.95,
                crate::core::model::EarlyExitVerdict::VerifiedBadBot,
                crate::core::model::BotType::MaliciousBot,
            )]
        }
    }

    struct NeverRuns;
    impl Contributor for NeverRuns {
        fn name(&self) -> &'static str {
            "never"
        }
        fn priority(&self) -> i32 {
            2
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<DetectionContribution> {
            vec![DetectionContribution::neutral("never", "should not run")]
        }
    }

    #[test]
    fn early_exit_halts_subsequent_waves() {
        let board = RequestBlackboard::new(HttpRequestContext::new("r1", "GET", "/", ProtocolVersion::Http1_1));
        let contributors: Vec<Box<dyn Contributor>> = vec![Box::new(EarlyExiter), Box::new(NeverRuns)];
        let outcome = run_waves(&contributors, &board);
        assert!(outcome.early_exit);
        assert_eq!(board.contributions_snapshot().len(), 1);
    }

    struct SlowOptional;
    impl Contributor for SlowOptional {
        fn name(&self) -> &'static str {
            "slow_optional"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn execution_timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(1))
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<DetectionContribution> {
            std::thread::sleep(Duration::from_millis(50));
            vec![DetectionContribution {
                category: self.name().to_string(),
                reason: "ran too slowly".to_string(),
                confidence_delta: 1.0,
                bot_name: None,
                bot_type: None,
                signals: std::collections::HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }]
        }
    }

    struct SlowRequired;
    impl Contributor for SlowRequired {
        fn name(&self) -> &'static str {
            "slow_required"
        }
        fn priority(&self) -> i32 {
            1
        }
        fn is_optional(&self) -> bool {
            false
        }
        fn execution_timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(1))
        }
        fn run(&self, _board: &RequestBlackboard) -> Vec<DetectionContribution> {
            std::thread::sleep(Duration::from_millis(50));
            vec![DetectionContribution {
                category: self.name().to_string(),
                reason: "ran too slowly".to_string(),
                confidence_delta: 1.0,
                bot_name: None,
                bot_type: None,
                signals: std::collections::HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }]
        }
    }

    #[test]
    fn optional_contributor_past_its_deadline_is_discarded_not_folded_in() {
        let board = RequestBlackboard::new(HttpRequestContext::new("r1", "GET", "/", ProtocolVersion::Http1_1));
        let contributors: Vec<Box<dyn Contributor>> = vec![Box::new(SlowOptional)];
        run_waves(&contributors, &board);
        assert!(board.failed_detectors().contains("slow_optional"));
        assert!(board.contributions_snapshot().is_empty());
        assert!((board.current_risk_score()).abs() < f64::EPSILON);
    }

    #[test]
    fn required_contributor_past_its_deadline_leaves_delta_zero_audit_contribution() {
        let board = RequestBlackboard::new(HttpRequestContext::new("r1", "GET", "/", ProtocolVersion::Http1_1));
        let contributors: Vec<Box<dyn Contributor>> = vec![Box::new(SlowRequired)];
        run_waves(&contributors, &board);
        assert!(board.failed_detectors().contains("slow_required"));
        let contributions = board.contributions_snapshot();
        assert_eq!(contributions.len(), 1);
        assert!((contributions[0].confidence_delta).abs() < f64::EPSILON);
        assert!(contributions[0].reason.contains("contributor failed"));
    }
}
