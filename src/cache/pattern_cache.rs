//! Compiled pattern cache: lazy, thread-safe compilation of UA regexes and
//! parsing of CIDR ranges, with membership tests over large corpora.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};

use crate::cache::cidr::ParsedCidrRange;
use crate::core::config::CacheConfig;

/// Per-match wall-clock budget. The `regex` crate is automaton-backed and
/// cannot backtrack catastrophically, so this is defense in depth rather
/// than the load-bearing guarantee — the real guarantee is the safety gate
/// at compile time.
const MATCH_TIMEOUT: Duration = Duration::from_millis(100);

fn safety_gate(pattern: &str, max_len: usize) -> Option<&'static str> {
    if pattern.len() > max_len {
        return Some("pattern exceeds max length");
    }
    // Nested greedy/possessive quantifiers are the classic catastrophic
    // backtracking shape (e.g. `(a+)+`, `(a*)*`). `regex` itself refuses to
    // backtrack, but we still reject these at ingest so a pattern that
    // would blow up a backtracking engine never gets compiled here either —
    // keeps the cache's contents safe to re-export to collaborators that
    // might use a different engine.
    if has_nested_quantifier(pattern) {
        return Some("nested quantifier: possible catastrophic backtracking");
    }
    None
}

fn has_nested_quantifier(pattern: &str) -> bool {
    let chars: Vec<char> = pattern.chars().collect();
    // Per group: whether its contents already contain a quantifier.
    let mut stack: Vec<bool> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '(' => stack.push(false),
            ')' => {
                let contained_quantifier = stack.pop().unwrap_or(false);
                let followed_by_quantifier =
                    matches!(chars.get(i + 1), Some('+' | '*'));
                if contained_quantifier && followed_by_quantifier {
                    return true;
                }
                if let Some(parent) = stack.last_mut() {
                    *parent = *parent || contained_quantifier || followed_by_quantifier;
                }
            }
            '+' | '*' => {
                if let Some(top) = stack.last_mut() {
                    *top = true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

struct CompiledCidr {
    range: ParsedCidrRange,
}

/// Lazily-compiled, shared registry of UA regexes and CIDR ranges.
///
/// Built-in (compile-time) and downloaded (runtime-fetched) patterns are
/// kept in separate vectors; `matches_any_pattern` scans built-ins first so
/// a known-good canonical tool name always resolves even if the downloaded
/// set is temporarily empty or stale.
pub struct PatternCache {
    max_pattern_len: usize,
    max_compiled_size: usize,
    builtin_patterns: Vec<(String, Regex)>,
    downloaded_patterns: RwLock<Vec<(String, Regex)>>,
    downloaded_cidrs: RwLock<Vec<CompiledCidr>>,
    compiled_regex_cache: RwLock<std::collections::HashMap<String, Option<Arc<Regex>>>>,
    compiled_cidr_cache: RwLock<std::collections::HashMap<String, Option<Arc<ParsedCidrRange>>>>,
}

impl PatternCache {
    #[must_use]
    pub fn new(config: &CacheConfig, builtin_patterns: &[(&str, &str)]) -> Self {
        let compiled: Vec<(String, Regex)> = builtin_patterns
            .iter()
            .filter_map(|(name, pattern)| {
                compile(pattern, config.max_pattern_len, config.max_compiled_size_bytes)
                    .map(|re| ((*name).to_string(), re))
            })
            .collect();
        Self {
            max_pattern_len: config.max_pattern_len,
            max_compiled_size: config.max_compiled_size_bytes,
            builtin_patterns: compiled,
            downloaded_patterns: RwLock::new(Vec::new()),
            downloaded_cidrs: RwLock::new(Vec::new()),
            compiled_regex_cache: RwLock::new(std::collections::HashMap::new()),
            compiled_cidr_cache: RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Lazily compile (and memoize) a regex. Invalid or dangerous patterns
    /// return `None` and are logged at debug — never propagated as errors.
    pub fn get_or_compile_regex(&self, pattern: &str) -> Option<Arc<Regex>> {
        if let Some(hit) = self.compiled_regex_cache.read().get(pattern) {
            return hit.clone();
        }
        let compiled = compile(pattern, self.max_pattern_len, self.max_compiled_size).map(Arc::new);
        if compiled.is_none() {
            tracing::debug!(pattern, "rejected pattern at compile time");
        }
        self.compiled_regex_cache
            .write()
            .insert(pattern.to_string(), compiled.clone());
        compiled
    }

    /// Lazily parse (and memoize) a CIDR literal. Invalid forms return
    /// `None`.
    pub fn get_or_parse_cidr(&self, cidr: &str) -> Option<Arc<ParsedCidrRange>> {
        if let Some(hit) = self.compiled_cidr_cache.read().get(cidr) {
            return hit.clone();
        }
        let parsed = ParsedCidrRange::parse(cidr).ok().map(Arc::new);
        if parsed.is_none() {
            tracing::debug!(cidr, "rejected CIDR literal at parse time");
        }
        self.compiled_cidr_cache
            .write()
            .insert(cidr.to_string(), parsed.clone());
        parsed
    }

    /// Scan built-in patterns first, then downloaded ones; first match wins
    /// by scan order. No scoring here — that lives in the contributor
    /// catalog.
    #[must_use]
    pub fn matches_any_pattern(&self, ua: &str) -> (bool, Option<String>) {
        for (name, re) in &self.builtin_patterns {
            if matches_within_budget(re, ua) {
                return (true, Some(name.clone()));
            }
        }
        for (name, re) in self.downloaded_patterns.read().iter() {
            if matches_within_budget(re, ua) {
                return (true, Some(name.clone()));
            }
        }
        (false, None)
    }

    #[must_use]
    pub fn is_in_any_cidr_range(&self, ip: IpAddr) -> (bool, Option<String>) {
        for entry in self.downloaded_cidrs.read().iter() {
            if entry.range.contains(&ip) {
                return (true, Some(entry.range.original().to_string()));
            }
        }
        (false, None)
    }

    /// Atomically replace the downloaded pattern set. Each candidate is
    /// recompiled; failures are dropped, not surfaced, per the fetcher's
    /// fail-safe contract.
    pub fn update_downloaded_patterns<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for (name, pattern) in patterns {
            if let Some(re) = compile(pattern.as_ref(), self.max_pattern_len, self.max_compiled_size) {
                compiled.push((name.as_ref().to_string(), re));
            } else {
                tracing::debug!(pattern = pattern.as_ref(), "dropped invalid downloaded pattern");
            }
        }
        *self.downloaded_patterns.write() = compiled;
    }

    /// Atomically replace the downloaded CIDR set.
    pub fn update_downloaded_cidr_ranges<I, S>(&self, cidrs: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for literal in cidrs {
            match ParsedCidrRange::parse(literal.as_ref()) {
                Ok(range) => parsed.push(CompiledCidr { range }),
                Err(error) => tracing::debug!(cidr = literal.as_ref(), %error, "dropped invalid CIDR"),
            }
        }
        *self.downloaded_cidrs.write() = parsed;
    }
}

fn compile(pattern: &str, max_len: usize, max_compiled_size: usize) -> Option<Regex> {
    if let Some(reason) = safety_gate(pattern, max_len) {
        tracing::debug!(pattern, reason, "pattern safety gate rejected entry");
        return None;
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(max_compiled_size)
        .build()
        .map_err(|error| {
            tracing::debug!(pattern, %error, "pattern failed to compile");
            error
        })
        .ok()
}

fn matches_within_budget(re: &Regex, haystack: &str) -> bool {
    let start = Instant::now();
    let result = re.is_match(haystack);
    if start.elapsed() > MATCH_TIMEOUT {
        tracing::warn!(pattern = re.as_str(), "pattern exceeded match time budget");
    }
    result
}
