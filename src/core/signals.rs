//! Well-known blackboard signal keys.
//!
//! The blackboard's key space stays open to contributor-defined extensions
//! (it is a `HashMap<String, SignalValue>`), but the keys every built-in
//! contributor and the orchestrator itself read or write are collected here
//! as `pub const` strings so a typo turns into a dead lookup instead of a
//! silently-ignored signal.

pub const USER_AGENT: &str = "user_agent";
pub const USER_AGENT_IS_BOT: &str = "user_agent_is_bot";
pub const USER_AGENT_BOT_TYPE: &str = "user_agent_bot_type";
pub const CLIENT_IP: &str = "client_ip";
pub const IP_IS_LOCAL: &str = "ip_is_local";
pub const REMOTE_ADDR: &str = "net.remote_addr";
pub const TRANSPORT_PROTOCOL: &str = "transport.protocol";
pub const HTTP2_FINGERPRINT: &str = "net.http2_fingerprint";
pub const HTTP3_FINGERPRINT: &str = "net.http3_fingerprint";

pub const IS_SECURITY_TOOL: &str = "security_tool.detected";
pub const SECURITY_TOOL_NAME: &str = "security_tool.name";
pub const SECURITY_TOOL_CATEGORY: &str = "security_tool.category";

pub const IS_AI_SCRAPER: &str = "aiscraper.detected";
pub const AI_SCRAPER_NAME: &str = "aiscraper.name";
pub const AI_SCRAPER_OPERATOR: &str = "aiscraper.operator";
pub const AI_SCRAPER_CATEGORY: &str = "aiscraper.category";
pub const AI_SCRAPER_ACCEPT_MARKDOWN: &str = "aiscraper.accept_markdown";
pub const AI_SCRAPER_WEB_BOT_AUTH: &str = "aiscraper.web_bot_auth";
pub const AI_SCRAPER_WEB_BOT_AUTH_VERIFIED: &str = "aiscraper.web_bot_auth_verified";

pub const IS_VERIFIED_BOT: &str = "classify.is_verified_bot";
pub const PROJECT_HONEYPOT_HIT: &str = "classify.project_honeypot_hit";

pub const IS_ACCOUNT_TAKEOVER: &str = "ato.detected";
pub const ATO_CREDENTIAL_STUFFING: &str = "ato.credential_stuffing";
pub const ATO_BRUTE_FORCE: &str = "ato.brute_force";
pub const ATO_DIRECT_POST: &str = "ato.direct_post";
pub const ATO_DRIFT_SCORE: &str = "ato.drift_score";

pub const H2_IS_HTTP2: &str = "h2.is_http2";
pub const H2_BEHIND_PROXY: &str = "h2.behind_proxy";
pub const H2_FINGERPRINT_UNKNOWN: &str = "h2.fingerprint_unknown";
pub const H2_USES_PRIORITY: &str = "h2.uses_priority";
pub const H2_PSEUDOHEADER_ORDER: &str = "h2.pseudoheader_order";
pub const H2_PUSH_ENABLED: &str = "h2.push_enabled";
pub const H2_PREFACE_VALID: &str = "h2.preface_valid";

pub const H3_IS_HTTP3: &str = "h3.is_http3";
pub const H3_TRANSPORT_PARAMS: &str = "h3.transport_params";
pub const H3_ZERO_RTT: &str = "h3.zero_rtt";
pub const H3_CONNECTION_MIGRATED: &str = "h3.connection_migrated";
pub const H3_PROTOCOL: &str = "h3.protocol";
pub const H3_CLIENT_TYPE: &str = "h3.client_type";

pub const TRANSPORT_IS_UPGRADE: &str = "transport.is_upgrade";
pub const TRANSPORT_WS_ORIGIN: &str = "transport.ws_origin";
pub const TRANSPORT_WS_VERSION: &str = "transport.ws_version";
pub const TRANSPORT_GRPC_CONTENT_TYPE: &str = "transport.grpc_content_type";
pub const TRANSPORT_GRAPHQL_INTROSPECTION: &str = "transport.graphql_introspection";
pub const TRANSPORT_GRAPHQL_BATCH: &str = "transport.graphql_batch";
pub const TRANSPORT_SSE: &str = "transport.sse";

pub const AI_SCRAPER_CLOUDFLARE_AI_GATEWAY: &str = "aiscraper.cloudflare_ai_gateway";
pub const AI_SCRAPER_CLOUDFLARE_BROWSER_RENDERING: &str = "aiscraper.cloudflare_browser_rendering";
pub const AI_SCRAPER_AI_DISCOVERY_PATH: &str = "aiscraper.ai_discovery_path";

pub const ATO_RAPID_CREDENTIAL_CHANGE: &str = "ato.rapid_credential_change";
pub const ATO_GEO_VELOCITY: &str = "ato.geo_velocity";
pub const ATO_DRIFT_PREFIX: &str = "ato.drift.";
pub const ATO_LOGIN_FAILED_COUNT: &str = "ato.login_failed_count";

pub const REPUTATION_BOT_SCORE: &str = "reputation.bot_score";
pub const REPUTATION_SUPPORT: &str = "reputation.support";
pub const REPUTATION_PATTERN_ID: &str = "reputation.pattern_id";
pub const REPUTATION_STATE: &str = "reputation.state";

pub const AGGREGATE_SCORE: &str = "pipeline.aggregate_score";
pub const APPLIED_POLICY: &str = "pipeline.applied_policy";
