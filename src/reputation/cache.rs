//! Hot-key-aware reputation cache: the cache is the source of truth for
//! reads; the durable store is a crash-durable write-behind replica.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::core::config::ReputationConfig;
use crate::listsource::store::{LearnedSignature, PatternStore, SignatureAction};
use crate::reputation::engine;
use crate::reputation::model::{PatternReputation, PatternState, PatternType};

struct Entry {
    reputation: PatternReputation,
    last_access: DateTime<Utc>,
    access_count: u64,
    hot_until: Option<DateTime<Utc>>,
    is_dirty: bool,
}

impl Entry {
    fn is_hot(&self, now: DateTime<Utc>) -> bool {
        self.hot_until.is_some_and(|until| until > now)
    }
}

/// One lifecycle event, published to the learning bus / telemetry sink.
#[derive(Debug, Clone)]
pub enum ReputationEvent {
    PatternCreated { pattern_id: String },
    PatternUpdated { pattern_id: String },
    StateChanged { pattern_id: String, from: PatternState, to: PatternState },
    HotKey { pattern_id: String },
    Evicted { pattern_id: String },
    DecaySweepStarted,
    DecaySweepCompleted { touched: usize },
    GcStarted,
    GcCompleted { removed: usize },
}

/// The in-memory reputation cache described in §4.4: bounded size, hot-key
/// exemption from eviction/GC, write-behind persistence.
pub struct ReputationCache {
    config: ReputationConfig,
    entries: RwLock<HashMap<String, Entry>>,
    store: Option<Arc<dyn PatternStore>>,
    events: RwLock<Vec<ReputationEvent>>,
}

impl ReputationCache {
    #[must_use]
    pub fn new(config: ReputationConfig, store: Option<Arc<dyn PatternStore>>) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            store,
            events: RwLock::new(Vec::new()),
        }
    }

    fn emit(&self, event: ReputationEvent) {
        let mut events = self.events.write();
        events.push(event);
        if events.len() > 10_000 {
            let overflow = events.len() - 10_000;
            events.drain(0..overflow);
        }
    }

    /// Drain buffered events (for the learning bus / telemetry sink to
    /// consume). Consumers must tolerate dropped events past the bound.
    pub fn drain_events(&self) -> Vec<ReputationEvent> {
        std::mem::take(&mut self.events.write())
    }

    fn touch(entry: &mut Entry, config: &ReputationConfig, now: DateTime<Utc>) {
        entry.last_access = now;
        entry.access_count += 1;
        if entry.access_count >= config.hot_key_threshold && !entry.is_hot(now) {
            entry.hot_until = Some(now + chrono::Duration::milliseconds(
                (config.hot_key_extension_hours * 3_600_000.0) as i64,
            ));
        }
    }

    /// Read-only lookup; does not create an entry. Bumps access bookkeeping.
    pub fn get(&self, pattern_id: &str, now: DateTime<Utc>) -> Option<PatternReputation> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(pattern_id)?;
        Self::touch(entry, &self.config, now);
        Some(entry.reputation.clone())
    }

    /// Apply one observation, creating the entry if absent.
    pub fn apply_evidence(
        &self,
        pattern_id: &str,
        pattern_type: PatternType,
        pattern: &str,
        label: f64,
        evidence_weight: f64,
        now: DateTime<Utc>,
    ) -> PatternReputation {
        let mut entries = self.entries.write();
        let previous_state = entries.get(pattern_id).map(|e| e.reputation.state);
        let current = entries.remove(pattern_id).map(|e| e.reputation);
        let was_new = current.is_none();

        let updated = engine::apply_evidence(
            current,
            &self.config,
            pattern_id,
            pattern_type,
            pattern,
            label,
            evidence_weight,
            now,
        );

        let entry = entries
            .entry(pattern_id.to_string())
            .or_insert_with(|| Entry {
                reputation: updated.clone(),
                last_access: now,
                access_count: 0,
                hot_until: None,
                is_dirty: true,
            });
        entry.reputation = updated.clone();
        entry.is_dirty = true;
        Self::touch(entry, &self.config, now);
        drop(entries);

        if was_new {
            self.emit(ReputationEvent::PatternCreated {
                pattern_id: pattern_id.to_string(),
            });
        } else {
            self.emit(ReputationEvent::PatternUpdated {
                pattern_id: pattern_id.to_string(),
            });
        }
        if let Some(prev) = previous_state {
            if prev != updated.state {
                self.emit(ReputationEvent::StateChanged {
                    pattern_id: pattern_id.to_string(),
                    from: prev,
                    to: updated.state,
                });
            }
        }

        updated
    }

    pub fn manually_block(&self, pattern_id: &str, pattern_type: PatternType, pattern: &str, now: DateTime<Utc>, notes: Option<String>) {
        self.upsert_manual(pattern_id, pattern_type, pattern, now, |rep| {
            engine::manually_block(rep, now, notes);
        });
    }

    pub fn manually_allow(&self, pattern_id: &str, pattern_type: PatternType, pattern: &str, now: DateTime<Utc>, notes: Option<String>) {
        self.upsert_manual(pattern_id, pattern_type, pattern, now, |rep| {
            engine::manually_allow(rep, now, notes);
        });
    }

    pub fn remove_manual_override(&self, pattern_id: &str, now: DateTime<Utc>) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(pattern_id) {
            engine::remove_manual_override(&mut entry.reputation, &self.config, now);
            entry.is_dirty = true;
        }
    }

    fn upsert_manual(
        &self,
        pattern_id: &str,
        pattern_type: PatternType,
        pattern: &str,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut PatternReputation),
    ) {
        let mut entries = self.entries.write();
        let entry = entries.entry(pattern_id.to_string()).or_insert_with(|| Entry {
            reputation: PatternReputation::new(pattern_id, pattern_type, pattern, now),
            last_access: now,
            access_count: 0,
            hot_until: None,
            is_dirty: true,
        });
        apply(&mut entry.reputation);
        entry.is_dirty = true;
    }

    /// Sweep all entries applying time decay. Single-threaded, sequential;
    /// takes a snapshot of keys then updates each under its own lock
    /// acquisition (no single long-held write lock over the whole map).
    pub fn run_decay_sweep(&self, now: DateTime<Utc>) -> usize {
        self.emit(ReputationEvent::DecaySweepStarted);
        let keys: Vec<String> = self.entries.read().keys().cloned().collect();
        let mut touched = 0;
        for key in keys {
            let mut entries = self.entries.write();
            if let Some(entry) = entries.get_mut(&key) {
                engine::apply_time_decay(&mut entry.reputation, &self.config, now);
                entry.is_dirty = true;
                touched += 1;
            }
        }
        self.emit(ReputationEvent::DecaySweepCompleted { touched });
        touched
    }

    /// Remove entries eligible for GC — never hot, never manual.
    pub fn run_gc(&self, now: DateTime<Utc>) -> usize {
        self.emit(ReputationEvent::GcStarted);
        let keys: Vec<String> = self.entries.read().keys().cloned().collect();
        let mut removed = 0;
        for key in keys {
            let should_remove = {
                let entries = self.entries.read();
                entries.get(&key).is_some_and(|entry| {
                    !entry.is_hot(now) && engine::is_eligible_for_gc(&entry.reputation, &self.config, now)
                })
            };
            if should_remove {
                self.entries.write().remove(&key);
                self.emit(ReputationEvent::Evicted {
                    pattern_id: key.clone(),
                });
                removed += 1;
            }
        }
        self.emit(ReputationEvent::GcCompleted { removed });
        removed
    }

    /// Evict the coldest non-hot, non-manual, `Neutral` entries until the
    /// cache is back under `hot_cache_capacity`. Never touches Suspect,
    /// ConfirmedBad, or ConfirmedGood entries regardless of coldness.
    pub fn enforce_capacity(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        if entries.len() <= self.config.hot_cache_capacity {
            return 0;
        }
        let overflow = entries.len() - self.config.hot_cache_capacity;
        let mut candidates: Vec<(String, DateTime<Utc>)> = entries
            .iter()
            .filter(|(_, e)| !e.is_hot(now) && !e.reputation.is_manual && e.reputation.state == PatternState::Neutral)
            .map(|(k, e)| (k.clone(), e.last_access))
            .collect();
        candidates.sort_by_key(|(_, last_access)| *last_access);

        let mut evicted = 0;
        let mut evicted_keys = Vec::new();
        for (key, _) in candidates.into_iter().take(overflow) {
            entries.remove(&key);
            evicted_keys.push(key);
            evicted += 1;
        }
        drop(entries);
        for key in evicted_keys {
            self.emit(ReputationEvent::Evicted { pattern_id: key });
        }
        evicted
    }

    /// Flush dirty entries to the durable store. No-op without a configured
    /// store (in-memory-only deployments).
    pub fn flush_dirty(&self) -> Result<usize, crate::core::errors::BotShieldError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let dirty: Vec<(String, PatternReputation)> = {
            let entries = self.entries.read();
            entries
                .iter()
                .filter(|(_, e)| e.is_dirty)
                .map(|(k, e)| (k.clone(), e.reputation.clone()))
                .collect()
        };
        for (key, rep) in &dirty {
            store.upsert(&to_signature(rep))?;
            if let Some(entry) = self.entries.write().get_mut(key) {
                entry.is_dirty = false;
            }
        }
        Ok(dirty.len())
    }

    /// Load an entry from the durable store on a cold-cache miss, mapping
    /// its durable `action` into a `PatternState` per the §4.4 load table.
    pub fn load_from_store(&self, pattern_id: &str, now: DateTime<Utc>) -> Option<PatternReputation> {
        let store = self.store.as_ref()?;
        let signature = store.get(pattern_id).ok().flatten()?;
        let rep = from_signature(&signature, now);
        self.entries.write().insert(
            pattern_id.to_string(),
            Entry {
                reputation: rep.clone(),
                last_access: now,
                access_count: 0,
                hot_until: None,
                is_dirty: false,
            },
        );
        Some(rep)
    }
}

fn to_signature(rep: &PatternReputation) -> LearnedSignature {
    let action = match rep.state {
        PatternState::ConfirmedBad | PatternState::ManuallyBlocked => SignatureAction::Full,
        PatternState::Suspect => SignatureAction::ScoreOnly,
        _ => SignatureAction::LogOnly,
    };
    LearnedSignature {
        pattern_id: rep.pattern_id.clone(),
        signature_type: format!("{:?}", rep.pattern_type),
        pattern: rep.pattern.clone(),
        confidence: rep.confidence(),
        occurrences: rep.support.round().max(0.0) as u64,
        first_seen: rep.first_seen,
        last_seen: rep.last_seen,
        action,
        bot_type: None,
        bot_name: None,
        source: Some("reputation_cache".to_string()),
        fed_back: false,
        metadata: None,
    }
}

fn from_signature(signature: &LearnedSignature, now: DateTime<Utc>) -> PatternReputation {
    let state = match (signature.action, signature.confidence) {
        (SignatureAction::Full, c) if c >= 0.9 => PatternState::ConfirmedBad,
        (SignatureAction::Full, _) => PatternState::Suspect,
        (SignatureAction::ScoreOnly, c) if c >= 0.6 => PatternState::Suspect,
        (SignatureAction::LogOnly, c) if c >= 0.95 => PatternState::ConfirmedBad,
        (SignatureAction::LogOnly, c) if c <= 0.05 => PatternState::ConfirmedGood,
        _ => PatternState::Neutral,
    };
    PatternReputation {
        pattern_id: signature.pattern_id.clone(),
        pattern_type: PatternType::UserAgent,
        pattern: signature.pattern.clone(),
        bot_score: signature.confidence,
        support: signature.occurrences as f64,
        state,
        first_seen: signature.first_seen,
        last_seen: signature.last_seen,
        state_changed_at: now,
        is_manual: false,
        notes: None,
    }
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
    fn apply_evidence_creates_and_then_updates() {
        let cache = ReputationCache::new(ReputationConfig::default(), None);
        let rep1 = cache.apply_evidence("ua:1", PatternType::UserAgent, "x", 0.9, 1.0, t(0));
        assert!((rep1.support - 1.0).abs() < f64::EPSILON);
        let rep2 = cache.apply_evidence("ua:1", PatternType::UserAgent, "x", 0.9, 1.0, t(1));
        assert!(rep2.support > rep1.support);
    }

    #[test]
    fn hot_key_exempts_from_capacity_eviction() {
        let mut config = ReputationConfig::default();
        config.hot_cache_capacity = 1;
        config.hot_key_threshold = 2;
        let cache = ReputationCache::new(config, None);
        cache.apply_evidence("ua:hot", PatternType::UserAgent, "x", 0.1, 1.0, t(0));
        cache.get("ua:hot", t(0));
        cache.get("ua:hot", t(0));
        cache.apply_evidence("ua:cold", PatternType::UserAgent, "y", 0.1, 1.0, t(0));
        let evicted = cache.enforce_capacity(t(0));
        assert_eq!(evicted, 1);
        assert!(cache.get("ua:hot", t(0)).is_some());
    }

    #[test]
    fn gc_removes_only_eligible_entries() {
        let cache = ReputationCache::new(ReputationConfig::default(), None);
        cache.apply_evidence("ua:stale", PatternType::UserAgent, "x", 0.1, 0.5, t(0));
        let removed = cache.run_gc(t(0) + chrono::Duration::days(200));
        assert_eq!(removed, 1);
        assert!(cache.get("ua:stale", t(0)).is_none());
    }

    #[test]
    fn manual_block_freezes_score() {
        let cache = ReputationCache::new(ReputationConfig::default(), None);
        cache.manually_block("ua:bad", PatternType::UserAgent, "x", t(0), Some("banned".to_string()));
        let rep = cache.get("ua:bad", t(0)).unwrap();
        assert_eq!(rep.state, PatternState::ManuallyBlocked);
        assert!((rep.bot_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flush_dirty_is_noop_without_store() {
        let cache = ReputationCache::new(ReputationConfig::default(), None);
        cache.apply_evidence("ua:1", PatternType::UserAgent, "x", 0.9, 1.0, t(0));
        assert_eq!(cache.flush_dirty().unwrap(), 0);
    }
}
