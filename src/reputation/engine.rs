//! Reputation engine: EMA updates, time decay, and the hysteretic state
//! machine (§4.4). Pure math over `PatternReputation` values — no I/O, no
//! caching; that's `reputation::cache`.

use chrono::{DateTime, Utc};

use crate::core::config::ReputationConfig;
use crate::reputation::model::{PatternReputation, PatternState, PatternType};

/// Apply one observation to a (possibly absent) reputation.
///
/// If `current` is `None`, a fresh entry is created directly from the
/// evidence. A manual entry only has its `last_seen` advanced — `bot_score`
/// and `state` are frozen until the override is removed.
pub fn apply_evidence(
    current: Option<PatternReputation>,
    config: &ReputationConfig,
    pattern_id: &str,
    pattern_type: PatternType,
    pattern: &str,
    label: f64,
    evidence_weight: f64,
    now: DateTime<Utc>,
) -> PatternReputation {
    let label = label.clamp(0.0, 1.0);

    let Some(mut rep) = current else {
        let mut created = PatternReputation::new(pattern_id, pattern_type, pattern, now);
        created.bot_score = label;
        created.support = evidence_weight.max(0.0);
        evaluate_state_change(&mut created, config, now);
        return created;
    };

    if rep.is_manual {
        rep.last_seen = now;
        return rep;
    }

    apply_time_decay(&mut rep, config, now);

    let alpha = (config.learning_rate * evidence_weight).min(1.0).max(0.0);
    rep.bot_score = ((1.0 - alpha) * rep.bot_score + alpha * label).clamp(0.0, 1.0);
    rep.support = (rep.support + evidence_weight).clamp(0.0, config.max_support);
    rep.last_seen = now;

    evaluate_state_change(&mut rep, config, now);
    rep
}

/// Confidence-modulated time decay toward the neutral prior (`bot_score`)
/// and toward zero (`support`). A no-op for manual entries or when less
/// than an hour has elapsed.
pub fn apply_time_decay(rep: &mut PatternReputation, config: &ReputationConfig, now: DateTime<Utc>) {
    if rep.is_manual {
        return;
    }
    let hours_since_last_seen = (now - rep.last_seen).num_milliseconds() as f64 / 3_600_000.0;
    if hours_since_last_seen < 1.0 {
        return;
    }

    const PRIOR: f64 = 0.5;
    let confidence = rep.confidence();
    let c = 0.5 + 0.5 * confidence;
    let tau_score_eff = config.score_tau_hours * c;
    let tau_support_eff = config.support_tau_hours * c;

    let decay_score = 1.0 - (-hours_since_last_seen / tau_score_eff).exp();
    rep.bot_score = (rep.bot_score + (PRIOR - rep.bot_score) * decay_score).clamp(0.0, 1.0);
    rep.support = (rep.support * (-hours_since_last_seen / tau_support_eff).exp()).max(0.0);

    evaluate_state_change(rep, config, now);
}

/// Hysteretic state machine transition (§4.4 table). Manual states never
/// transition here — only `remove_manual_override` can move them.
pub fn evaluate_state_change(rep: &mut PatternReputation, config: &ReputationConfig, now: DateTime<Utc>) {
    if rep.state.is_manual() {
        return;
    }

    let score = rep.bot_score;
    let support = rep.support;
    let next = match rep.state {
        PatternState::Neutral => {
            if score >= config.promote_suspect && support >= config.promote_suspect_support {
                Some(PatternState::Suspect)
            } else if score <= config.promote_good && support >= config.promote_good_support {
                Some(PatternState::ConfirmedGood)
            } else {
                None
            }
        }
        PatternState::Suspect => {
            if score >= config.promote_bad && support >= config.promote_bad_support {
                Some(PatternState::ConfirmedBad)
            } else if score <= config.demote_neutral || support < config.promote_suspect_support {
                Some(PatternState::Neutral)
            } else {
                None
            }
        }
        PatternState::ConfirmedBad => {
            if score <= config.demote_bad
                && (support >= config.demote_bad_support || support < config.promote_bad_support)
            {
                Some(PatternState::Suspect)
            } else {
                None
            }
        }
        PatternState::ConfirmedGood => {
            if score >= config.demote_neutral {
                Some(PatternState::Neutral)
            } else {
                None
            }
        }
        PatternState::ManuallyBlocked | PatternState::ManuallyAllowed => None,
    };

    if let Some(next_state) = next {
        rep.state = next_state;
        rep.state_changed_at = now;
    }
}

/// Whether an entry may be garbage-collected: not manual, old enough, and
/// (optionally, per config) confined to `Neutral` with low support.
#[must_use]
pub fn is_eligible_for_gc(rep: &PatternReputation, config: &ReputationConfig, now: DateTime<Utc>) -> bool {
    if rep.is_manual {
        return false;
    }
    if config.gc_only_neutral && rep.state != PatternState::Neutral {
        return false;
    }
    let days_since_last_seen = (now - rep.last_seen).num_milliseconds() as f64 / 86_400_000.0;
    days_since_last_seen >= config.gc_eligible_days && rep.support <= config.gc_support_threshold
}

/// Force a pattern to `ManuallyBlocked`, freezing automatic updates.
pub fn manually_block(rep: &mut PatternReputation, now: DateTime<Utc>, notes: Option<String>) {
    rep.is_manual = true;
    rep.bot_score = 1.0;
    rep.state = PatternState::ManuallyBlocked;
    rep.state_changed_at = now;
    rep.notes = notes;
}

/// Force a pattern to `ManuallyAllowed`, freezing automatic updates.
pub fn manually_allow(rep: &mut PatternReputation, now: DateTime<Utc>, notes: Option<String>) {
    rep.is_manual = true;
    rep.bot_score = 0.0;
    rep.state = PatternState::ManuallyAllowed;
    rep.state_changed_at = now;
    rep.notes = notes;
}

/// Remove a manual override and re-evaluate state from the current
/// score/support as if it had arrived through normal evidence.
pub fn remove_manual_override(rep: &mut PatternReputation, config: &ReputationConfig, now: DateTime<Utc>) {
    rep.is_manual = false;
    rep.state = PatternState::Neutral;
    evaluate_state_change(rep, config, now);
    rep.state_changed_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(offset_hours: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + chrono::Duration::hours(offset_hours)
    }

    #[test]
    fn first_evidence_creates_entry_with_label_as_score() {
        let config = ReputationConfig::default();
        let rep = apply_evidence(None, &config, "ua:1", PatternType::UserAgent, "sqlmap", 0.95, 1.0, t(0));
        assert!((rep.bot_score - 0.95).abs() < f64::EPSILON);
        assert!((rep.support - 1.0).abs() < f64::EPSILON);
        assert_eq!(rep.state, PatternState::Neutral);
    }

    #[test]
    fn manual_entries_are_frozen_except_last_seen() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        manually_block(&mut rep, t(0), None);
        let before_score = rep.bot_score;
        let before_state = rep.state;
        let updated = apply_evidence(
            Some(rep),
            &config,
            "ua:1",
            PatternType::UserAgent,
            "x",
            0.0,
            1.0,
            t(5),
        );
        assert_eq!(updated.bot_score, before_score);
        assert_eq!(updated.state, before_state);
        assert_eq!(updated.last_seen, t(5));
    }

    #[test]
    fn reputation_learning_across_requests_reaches_confirmed_bad() {
        let config = ReputationConfig::default();
        let mut rep: Option<PatternReputation> = None;
        for i in 0..60 {
            rep = Some(apply_evidence(
                rep,
                &config,
                "ua:bot",
                PatternType::UserAgent,
                "bot-ua",
                1.0,
                1.0,
                t(i),
            ));
        }
        let rep = rep.unwrap();
        assert!(rep.support >= 50.0);
        assert!(rep.bot_score >= 0.9);
        assert_eq!(rep.state, PatternState::ConfirmedBad);
    }

    #[test]
    fn decay_is_a_noop_under_one_hour() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.bot_score = 0.9;
        rep.support = 100.0;
        apply_time_decay(&mut rep, &config, t(0));
        assert!((rep.bot_score - 0.9).abs() < f64::EPSILON);
        assert!((rep.support - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_moves_score_toward_prior_and_shrinks_support() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.bot_score = 0.95;
        rep.support = 100.0;
        rep.state = PatternState::ConfirmedBad;
        apply_time_decay(&mut rep, &config, t(30 * 24));
        assert!(rep.bot_score < 0.95);
        assert!(rep.bot_score > 0.4);
        assert!(rep.support < 100.0);
    }

    #[test]
    fn decay_monotonicity_never_increases_score_above_starting_point() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.bot_score = 0.95;
        rep.support = 10.0;
        let before = rep.bot_score;
        apply_time_decay(&mut rep, &config, t(10));
        assert!(rep.bot_score <= before);
    }

    #[test]
    fn decay_monotonicity_never_decreases_score_below_starting_point_when_below_prior() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.bot_score = 0.1;
        rep.support = 10.0;
        let before = rep.bot_score;
        apply_time_decay(&mut rep, &config, t(10));
        assert!(rep.bot_score >= before);
    }

    #[test]
    fn support_never_increases_under_decay() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.support = 50.0;
        apply_time_decay(&mut rep, &config, t(5));
        assert!(rep.support <= 50.0);
    }

    #[test]
    fn boundary_transitions_match_spec_example() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.bot_score = 0.6;
        rep.support = 10.0;
        evaluate_state_change(&mut rep, &config, t(0));
        assert_eq!(rep.state, PatternState::Suspect);

        rep.bot_score = 0.4;
        evaluate_state_change(&mut rep, &config, t(1));
        assert_eq!(rep.state, PatternState::Neutral);
    }

    #[test]
    fn hysteresis_band_holds_steady() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.state = PatternState::Suspect;
        rep.bot_score = 0.5;
        rep.support = 10.0;
        evaluate_state_change(&mut rep, &config, t(1));
        assert_eq!(rep.state, PatternState::Suspect);
    }

    #[test]
    fn manual_override_removal_reevaluates_from_current_values() {
        // Removal resets to Neutral then applies one state-table step from
        // there, same as any other Neutral evaluation — it does not cascade
        // straight through Suspect to ConfirmedBad in one call.
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        manually_block(&mut rep, t(0), None);
        rep.bot_score = 0.9;
        rep.support = 60.0;
        remove_manual_override(&mut rep, &config, t(1));
        assert!(!rep.is_manual);
        assert_eq!(rep.state, PatternState::Suspect);
    }

    #[test]
    fn gc_eligible_requires_age_and_low_support() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        rep.last_seen = t(0);
        rep.support = 0.5;
        assert!(is_eligible_for_gc(&rep, &config, t(0) + chrono::Duration::days(91)));
        assert!(!is_eligible_for_gc(&rep, &config, t(0) + chrono::Duration::days(1)));
    }

    #[test]
    fn gc_excludes_manual_entries() {
        let config = ReputationConfig::default();
        let mut rep = PatternReputation::new("ua:1", PatternType::UserAgent, "x", t(0));
        manually_block(&mut rep, t(0), None);
        rep.support = 0.0;
        assert!(!is_eligible_for_gc(&rep, &config, t(0) + chrono::Duration::days(200)));
    }
}
