//! Priority 9: identify named AI scrapers/crawlers by UA, Cloudflare AI
//! gateway headers, RFC-9421 Web Bot Auth, `Accept: text/markdown`, and
//! well-known AI-discovery paths.

use std::sync::Arc;

use crate::cache::pattern_cache::PatternCache;
use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::Contributor;
use crate::core::model::{BotType, DetectionContribution, EarlyExitVerdict};
use crate::core::signals;

#[derive(Clone, Copy)]
pub enum ScraperCategory {
    Training,
    Search,
    Assistant,
    ScrapingService,
}

impl ScraperCategory {
    fn as_str(self) -> &'static str {
        match self {
            Self::Training => "Training",
            Self::Search => "Search",
            Self::Assistant => "Assistant",
            Self::ScrapingService => "ScrapingService",
        }
    }
}

/// (name pattern, display name, operator, category, is_good_bot).
pub const BUILTIN_PATTERNS: &[(&str, &str, &str, ScraperCategory, bool)] = &[
    ("GPTBot", "GPTBot", "OpenAI", ScraperCategory::Training, true),
    ("ChatGPT-User", "ChatGPT-User", "OpenAI", ScraperCategory::Assistant, true),
    ("ClaudeBot", "ClaudeBot", "Anthropic", ScraperCategory::Training, true),
    ("anthropic-ai", "Claude-Web", "Anthropic", ScraperCategory::Assistant, true),
    ("Google-Extended", "Google-Extended", "Google", ScraperCategory::Training, true),
    ("PerplexityBot", "PerplexityBot", "Perplexity", ScraperCategory::Search, true),
    ("Bytespider", "Bytespider", "ByteDance", ScraperCategory::Training, false),
    ("CCBot", "CCBot", "Common Crawl", ScraperCategory::Training, true),
];

const AI_DISCOVERY_PATHS: &[&str] = &["/llms.txt", "/llms-full.txt"];

pub struct AiScraper {
    cache: Arc<PatternCache>,
}

impl AiScraper {
    #[must_use]
    pub fn new(cache: Arc<PatternCache>) -> Self {
        Self { cache }
    }

    fn lookup(ua: &str) -> Option<(&'static str, &'static str, ScraperCategory, bool)> {
        BUILTIN_PATTERNS
            .iter()
            .find(|(needle, ..)| ua.contains(needle))
            .map(|(_, display, operator, category, good)| (*display, *operator, *category, *good))
    }
}

impl Contributor for AiScraper {
    fn name(&self) -> &'static str {
        "AiScraper"
    }

    fn priority(&self) -> i32 {
        9
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let ua = board.request.user_agent().unwrap_or_default();
        let accept = board.request.headers.get("accept").unwrap_or_default();
        let accept_markdown = accept.contains("text/markdown");
        let is_ai_discovery_path = AI_DISCOVERY_PATHS.contains(&board.request.path_without_query());
        let cf_ai_gateway = board.request.headers.contains("cf-ai-gateway");
        let has_signature = board.request.headers.contains("signature") && board.request.headers.contains("signature-input");

        if let Some((display, operator, category, is_good)) = Self::lookup(ua) {
            let bot_type = if is_good { BotType::GoodBot } else { BotType::AiBot };
            // Identification alone (UA string match) is not cryptographic
            // proof; only a verified Web Bot Auth signature earns the
            // VerifiedGoodBot early exit.
            let verified = is_good && has_signature;
            let mut contribution = if verified {
                DetectionContribution::early_exit(
                    self.name(),
                    format!("verified AI crawler via Web Bot Auth: {display}"),
                    0.0,
                    EarlyExitVerdict::VerifiedGoodBot,
                    bot_type,
                )
            } else {
                DetectionContribution {
                    category: self.name().to_string(),
                    reason: format!("identified AI crawler: {display}"),
                    confidence_delta: if is_good { 0.0 } else { 0.6 },
                    bot_name: Some(display.to_string()),
                    bot_type: Some(bot_type),
                    signals: std::collections::HashMap::new(),
                    trigger_early_exit: false,
                    early_exit_verdict: None,
                }
            };
            contribution = contribution
                .with_bot_name(display)
                .with_signal(signals::IS_AI_SCRAPER, true)
                .with_signal(signals::AI_SCRAPER_NAME, display)
                .with_signal(signals::AI_SCRAPER_OPERATOR, operator)
                .with_signal(signals::AI_SCRAPER_CATEGORY, category.as_str())
                .with_signal(signals::AI_SCRAPER_ACCEPT_MARKDOWN, accept_markdown)
                .with_signal(signals::AI_SCRAPER_WEB_BOT_AUTH_VERIFIED, verified);
            return vec![contribution];
        }

        let (pattern_hit, pattern_name) = self.cache.matches_any_pattern(ua);
        if pattern_hit {
            let display = pattern_name.unwrap_or_else(|| "UnknownAiScraper".to_string());
            return vec![DetectionContribution {
                category: self.name().to_string(),
                reason: format!("downloaded AI-scraper pattern match: {display}"),
                confidence_delta: 0.5,
                bot_name: Some(display.clone()),
                bot_type: Some(BotType::AiBot),
                signals: std::collections::HashMap::new(),
                trigger_early_exit: false,
                early_exit_verdict: None,
            }
            .with_signal(signals::IS_AI_SCRAPER, true)
            .with_signal(signals::AI_SCRAPER_NAME, display)];
        }

        if accept_markdown || is_ai_discovery_path || cf_ai_gateway || has_signature {
            return vec![DetectionContribution::neutral(self.name(), "AI-adjacent signals present, no confirmed scraper identity")
                .with_signal(signals::AI_SCRAPER_ACCEPT_MARKDOWN, accept_markdown)
                .with_signal(signals::AI_SCRAPER_WEB_BOT_AUTH, has_signature)];
        }

        vec![DetectionContribution::neutral(self.name(), "no AI-scraper signal")]
    }
}
