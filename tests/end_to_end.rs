//! End-to-end scenarios driving the fully-wired pipeline the way an
//! embedding HTTP server would: build a request, hand it to
//! `Pipeline::handle_request`, check the verdict.

use std::sync::Arc;

use botshield_core::prelude::*;
use botshield_core::cache::pattern_cache::PatternCache;
use botshield_core::contributors::catalog::{
    AccountTakeover, AiScraper, Http2Fingerprint, Http3Fingerprint, ProjectHoneypot,
    ReputationBias, SecurityTool, TransportProtocol, UserAgent,
};
use botshield_core::core::config::{CacheConfig, FastPathConfig, PolicyEngineConfig, ReputationConfig};

fn full_pipeline() -> (Pipeline, Arc<ReputationCache>) {
    let security_cache = Arc::new(PatternCache::new(
        &CacheConfig::default(),
        botshield_core::contributors::catalog::security_tool::BUILTIN_PATTERNS,
    ));
    let ai_cache = Arc::new(PatternCache::new(&CacheConfig::default(), &[]));
    let reputation = Arc::new(ReputationCache::new(ReputationConfig::default(), None));

    let fast_path = FastPathDecider::new(Arc::clone(&security_cache), Arc::clone(&reputation), FastPathConfig::default());

    let contributors: Vec<Box<dyn Contributor>> = vec![
        Box::new(ReputationBias::new(Arc::clone(&reputation))),
        Box::new(SecurityTool::new(Arc::clone(&security_cache))),
        Box::new(AiScraper::new(ai_cache)),
        Box::new(UserAgent),
        Box::new(Http2Fingerprint),
        Box::new(Http3Fingerprint),
        Box::new(TransportProtocol),
        Box::new(ProjectHoneypot),
        Box::new(AccountTakeover),
    ];
    let slow_path = SlowPathPipeline::new(contributors);
    let policy_engine = PolicyEngine::new(PolicyRegistry::with_builtins(&PolicyEngineConfig::default()));

    (Pipeline::new(policy_engine, fast_path, slow_path, None, None), reputation)
}

fn request(ua: &str, method: &str, path: &str, protocol: ProtocolVersion) -> HttpRequestContext {
    let mut ctx = HttpRequestContext::new("req-1", method, path, protocol);
    if !ua.is_empty() {
        ctx.headers.insert("User-Agent", ua);
    }
    ctx
}

/// Scenario 1: a known SQL-injection scanner is blocked by the fast path
/// alone, never touching a single contributor.
#[test]
fn sqlmap_scanner_is_blocked_via_fast_path() {
    let (pipeline, _reputation) = full_pipeline();
    let outcome = pipeline.handle_request(request("sqlmap/1.5#stable (http://sqlmap.org)", "GET", "/api/users", ProtocolVersion::Http1_1));
    assert_eq!(outcome.verdict, Verdict::Block);
    assert_eq!(outcome.mode, FastPathMode::FastPath);
    assert!(outcome.detection.is_none());
}

/// Scenario 2: GPTBot identifies itself by UA alone (no Web Bot Auth
/// signature) — recognized as an AI training crawler but not cryptographically
/// verified, so it runs the full pipeline and is allowed without an early exit.
#[test]
fn gptbot_is_identified_as_ai_training_crawler() {
    let (pipeline, _reputation) = full_pipeline();
    let outcome = pipeline.handle_request(request("Mozilla/5.0 AppleWebKit/537.36 (compatible; GPTBot/1.2; +https://openai.com/gptbot)", "GET", "/articles/1", ProtocolVersion::Http1_1));
    assert_eq!(outcome.mode, FastPathMode::FullPath);
    let detection = outcome.detection.expect("slow path ran");
    assert_eq!(detection.bot_name.as_deref(), Some("GPTBot"));
    assert_eq!(detection.bot_type, Some(BotType::GoodBot));
    assert_eq!(
        detection.signals.get(botshield_core::core::signals::AI_SCRAPER_OPERATOR).and_then(|v| v.as_str().map(str::to_string)),
        Some("OpenAI".to_string())
    );
}

/// Scenario 3: a normal Chrome browser negotiated over HTTP/2 with the
/// expected Sec-Fetch-* headers present resolves to human, low confidence.
#[test]
fn normal_chrome_over_http2_resolves_to_human() {
    let (pipeline, _reputation) = full_pipeline();
    let mut req = request(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        "GET",
        "/dashboard",
        ProtocolVersion::Http2,
    );
    req.headers.insert("Sec-Fetch-Site", "same-origin");
    req.headers.insert("Sec-Fetch-Mode", "navigate");
    req.headers.insert("Sec-Fetch-Dest", "document");

    let outcome = pipeline.handle_request(req);
    assert_eq!(outcome.mode, FastPathMode::FullPath);
    let detection = outcome.detection.expect("slow path ran");
    assert!(!detection.is_bot);
    assert!(detection.confidence_score < 0.3, "expected low confidence, got {}", detection.confidence_score);
    assert_eq!(outcome.verdict, Verdict::Allow);
}

/// Scenario 4: repeated bad-evidence observations of the same user-agent
/// promote its reputation all the way to `ConfirmedBad`, at which point the
/// fast path blocks it outright without running the slow path again.
#[test]
fn reputation_learning_promotes_repeat_offender_to_confirmed_bad() {
    let (pipeline, reputation) = full_pipeline();
    let ua = "Mozilla/5.0 (compatible; custom-scraper/3.1)";
    let pattern_id = compute_pattern_id(PatternType::UserAgent, ua);
    let now = chrono::Utc::now();

    for _ in 0..60 {
        reputation.apply_evidence(&pattern_id, PatternType::UserAgent, ua, 1.0, 1.0, now);
    }
    let rep = reputation.get(&pattern_id, now).unwrap();
    assert_eq!(rep.state, PatternState::ConfirmedBad);

    let outcome = pipeline.handle_request(request(ua, "GET", "/api/users", ProtocolVersion::Http1_1));
    assert_eq!(outcome.verdict, Verdict::Block);
    assert_eq!(outcome.mode, FastPathMode::FastPath);
}

/// Scenario 5: a `ConfirmedBad` entry that goes untouched for 30 days decays
/// back toward the neutral prior far enough to demote to `Suspect`.
#[test]
fn reputation_decays_confirmed_bad_back_to_suspect_after_30_days() {
    let reputation = ReputationCache::new(ReputationConfig::default(), None);
    let ua = "Mozilla/5.0 (compatible; custom-scraper/3.1)";
    let pattern_id = compute_pattern_id(PatternType::UserAgent, ua);
    let t0 = chrono::Utc::now();

    for _ in 0..60 {
        reputation.apply_evidence(&pattern_id, PatternType::UserAgent, ua, 1.0, 1.0, t0);
    }
    assert_eq!(reputation.get(&pattern_id, t0).unwrap().state, PatternState::ConfirmedBad);

    let t30 = t0 + chrono::Duration::days(30);
    reputation.run_decay_sweep(t30);

    let decayed = reputation.get(&pattern_id, t30).unwrap();
    assert_eq!(decayed.state, PatternState::Suspect, "bot_score={} support={}", decayed.bot_score, decayed.support);
}

/// Scenario 6: under the `allowVerifiedBots` policy, a GPTBot request that
/// carries a Web Bot Auth signature earns the `VerifiedGoodBot` early exit,
/// which stamps `IS_VERIFIED_BOT` onto the blackboard and lets the policy's
/// transition resolve to `Allow` before the risk score is even consulted.
#[test]
fn verified_ai_crawler_is_allowed_under_allow_verified_bots_policy() {
    let security_cache = Arc::new(PatternCache::new(
        &CacheConfig::default(),
        botshield_core::contributors::catalog::security_tool::BUILTIN_PATTERNS,
    ));
    let ai_cache = Arc::new(PatternCache::new(&CacheConfig::default(), &[]));
    let reputation = Arc::new(ReputationCache::new(ReputationConfig::default(), None));
    let policy_engine = PolicyEngine::new(PolicyRegistry::with_builtins(&PolicyEngineConfig::default()));
    let policy = policy_engine.registry().get("allowVerifiedBots").expect("builtin policy");

    let slow_path = SlowPathPipeline::new(vec![
        Box::new(SecurityTool::new(Arc::clone(&security_cache))),
        Box::new(AiScraper::new(ai_cache)),
    ]);

    let mut req = request(
        "Mozilla/5.0 AppleWebKit/537.36 (compatible; GPTBot/1.2; +https://openai.com/gptbot)",
        "GET",
        "/articles/1",
        ProtocolVersion::Http1_1,
    );
    req.headers.insert("Signature", "sig1=:abc123:");
    req.headers.insert("Signature-Input", "sig1=(\"@authority\");keyid=\"poqkLk5\"");

    let board = RequestBlackboard::new(req);
    let detection = slow_path.run(&policy, &board, None, None);
    // A verified good bot is still a bot (§4.8) — it's the policy's
    // `allowVerifiedBots` transition, not `is_bot`, that lets it through.
    assert!(detection.is_bot);
    assert_eq!(detection.bot_type, Some(BotType::GoodBot));

    let resolution = policy_engine.resolve(&policy, detection.confidence_score, &board).unwrap();
    assert_eq!(resolution.action, Some(PolicyAction::Allow));
}
