//! `bsctl` — a thin operator CLI around the decision engine, mirroring the
//! ancestor's `main.rs -> cli_app` dispatch shape. Not a production HTTP
//! surface: `simulate` runs one synthetic request through the pipeline and
//! prints the verdict, `reputation inspect` reads back a learned pattern.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;

use crate::cache::pattern_cache::PatternCache;
use crate::contributors::catalog::{
    AccountTakeover, AiScraper, Http2Fingerprint, Http3Fingerprint, ProjectHoneypot,
    ReputationBias, SecurityTool, TransportProtocol, UserAgent,
};
use crate::contributors::framework::Contributor;
use crate::core::config::{CacheConfig, Config};
use crate::core::errors::Result;
use crate::pipeline::{FastPathDecider, Pipeline, SlowPathPipeline, Verdict};
use crate::policy::{PolicyEngine, PolicyRegistry};
use crate::reputation::{compute_pattern_id, PatternType, ReputationCache};
use crate::request::{HttpRequestContext, ProtocolVersion};

#[derive(Debug, Parser)]
#[command(
    name = "bsctl",
    author,
    version,
    about = "Bot-shield decision engine - local operator tool",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Emit machine-readable JSON instead of a human summary.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one synthetic request through the full pipeline and print the verdict.
    Simulate(SimulateArgs),
    /// Inspect learned reputation entries.
    Reputation {
        #[command(subcommand)]
        command: ReputationCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ReputationCommand {
    /// Print the current reputation entry for a pattern id (e.g. `ua:…`).
    Inspect { pattern_id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProtocol {
    Http1_0,
    Http1_1,
    Http2,
    Http3,
}

impl From<CliProtocol> for ProtocolVersion {
    fn from(value: CliProtocol) -> Self {
        match value {
            CliProtocol::Http1_0 => Self::Http1_0,
            CliProtocol::Http1_1 => Self::Http1_1,
            CliProtocol::Http2 => Self::Http2,
            CliProtocol::Http3 => Self::Http3,
        }
    }
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// HTTP method.
    #[arg(long, default_value = "GET")]
    method: String,
    /// Request path, including any query string.
    #[arg(long, default_value = "/")]
    path: String,
    /// `User-Agent` header value.
    #[arg(long, default_value = "")]
    user_agent: String,
    /// Negotiated protocol version.
    #[arg(long, value_enum, default_value = "http1-1")]
    protocol: CliProtocol,
    /// Remote client address.
    #[arg(long)]
    remote_addr: Option<IpAddr>,
    /// Extra header as `Name: value`; repeatable.
    #[arg(long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,
}

/// Parse and dispatch a CLI invocation.
pub fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Simulate(args) => simulate(&config, args, cli.json),
        Command::Reputation { command: ReputationCommand::Inspect { pattern_id } } => {
            inspect_reputation(&config, pattern_id, cli.json)
        }
    }
}

/// Everything `simulate` and `reputation inspect` both need: a reputation
/// cache (optionally backed by the configured SQLite store) and a fully
/// wired pipeline over the built-in contributor catalog.
struct Engine {
    pipeline: Pipeline,
    reputation: Arc<ReputationCache>,
}

fn build_engine(config: &Config) -> Result<Engine> {
    let store = open_store(config)?;
    let reputation = Arc::new(ReputationCache::new(config.reputation.clone(), store));

    let security_cache = Arc::new(PatternCache::new(
        &config.cache,
        crate::contributors::catalog::security_tool::BUILTIN_PATTERNS,
    ));
    let ai_cache = Arc::new(PatternCache::new(&CacheConfig::default(), &[]));

    let fast_path = FastPathDecider::new(Arc::clone(&security_cache), Arc::clone(&reputation), config.fast_path.clone());

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

    let policy_engine = PolicyEngine::new(PolicyRegistry::with_builtins(&config.policy));

    let pipeline = Pipeline::new(policy_engine, fast_path, slow_path, None, None)
        .with_telemetry(Arc::new(crate::telemetry::RingBufferSink::from_config(&config.telemetry)));

    Ok(Engine { pipeline, reputation })
}

#[cfg(feature = "sqlite")]
fn open_store(config: &Config) -> Result<Option<Arc<dyn crate::listsource::PatternStore>>> {
    let store = crate::listsource::SqlitePatternStore::open(&config.paths.sqlite_db)?;
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "sqlite"))]
fn open_store(_config: &Config) -> Result<Option<Arc<dyn crate::listsource::PatternStore>>> {
    Ok(None)
}

fn simulate(config: &Config, args: &SimulateArgs, as_json: bool) -> Result<()> {
    let engine = build_engine(config)?;

    let mut request = HttpRequestContext::new("bsctl-simulate", args.method.clone(), args.path.clone(), args.protocol.into());
    if !args.user_agent.is_empty() {
        request.headers.insert("User-Agent", args.user_agent.clone());
    }
    request.remote_addr = args.remote_addr;
    for raw in &args.headers {
        if let Some((name, value)) = raw.split_once(':') {
            request.headers.insert(name.trim().to_string(), value.trim().to_string());
        } else {
            eprintln!("bsctl: ignoring malformed --header {raw:?} (expected \"Name: value\")");
        }
    }

    let outcome = engine.pipeline.handle_request(request);

    if as_json {
        let payload = json!({
            "verdict": verdict_label(outcome.verdict),
            "mode": format!("{:?}", outcome.mode),
            "applied_policy": outcome.applied_policy,
            "detection": outcome.detection,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("verdict:        {}", verdict_label(outcome.verdict));
    println!("mode:           {:?}", outcome.mode);
    println!("applied_policy: {}", outcome.applied_policy);
    if let Some(detection) = &outcome.detection {
        println!("is_bot:         {}", detection.is_bot);
        println!("confidence:     {:.3}", detection.confidence_score);
        if let Some(bot_type) = detection.bot_type {
            println!("bot_type:       {bot_type:?}");
        }
        if let Some(name) = &detection.bot_name {
            println!("bot_name:       {name}");
        }
        println!("reasons:");
        for reason in &detection.reasons {
            println!("  [{:+.3}] {}: {}", reason.delta, reason.category, reason.detail);
        }
    }
    Ok(())
}

fn inspect_reputation(config: &Config, pattern_id: &str, as_json: bool) -> Result<()> {
    let engine = build_engine(config)?;
    let now = chrono::Utc::now();

    let reputation = engine.reputation.get(pattern_id, now).or_else(|| engine.reputation.load_from_store(pattern_id, now));

    match reputation {
        Some(entry) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                println!("pattern_id:   {}", entry.pattern_id);
                println!("pattern_type: {:?}", entry.pattern_type);
                println!("state:        {:?}", entry.state);
                println!("bot_score:    {:.4}", entry.bot_score);
                println!("support:      {:.2}", entry.support);
                println!("confidence:   {:.4}", entry.confidence());
                println!("first_seen:   {}", entry.first_seen);
                println!("last_seen:    {}", entry.last_seen);
            }
        }
        None => {
            if as_json {
                println!("{}", json!({ "pattern_id": pattern_id, "found": false }));
            } else {
                println!("no reputation entry for {pattern_id}");
            }
        }
    }
    Ok(())
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Allow => "allow",
        Verdict::Block => "block",
        Verdict::Challenge => "challenge",
    }
}

/// Derive the `ua:`/`ip:` pattern id a given raw value would hash to, for
/// callers who want to `reputation inspect` a UA or IP they have in hand
/// rather than the hash.
#[must_use]
pub fn pattern_id_for(pattern_type: PatternType, raw: &str) -> String {
    compute_pattern_id(pattern_type, raw)
}
