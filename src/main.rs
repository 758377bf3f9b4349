use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soulbrowser_cli::db::Db;
use soulbrowser_cli::llm::AnthropicLlmClient;
use soulbrowser_cli::server::{self, RateLimitConfig, RateLimiter, ServeState};
use soulbrowser_cli::{RuntimeConfig, SessionOrchestrator};

/// Drives natural-language browser tasks over a websocket channel (§6).
#[derive(Parser)]
#[command(name = "soulbrowser", version)]
struct CliArgs {
    /// Port the websocket/artifact server listens on. Overrides
    /// `SOULBROWSER_LISTEN_PORT` when set.
    #[arg(long)]
    port: Option<u16>,

    /// Port the Prometheus `/metrics` endpoint listens on. 0 disables it.
    #[arg(long, default_value_t = 9090)]
    metrics_port: u16,

    /// Log level, e.g. "info", "debug", "soulbrowser_cli=debug".
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    debug: bool,
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG.to_string()
    } else {
        level.to_string()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();
    init_logging(&cli.log_level, cli.debug)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build_date = env!("BUILD_DATE"),
        git_hash = env!("GIT_HASH"),
        git_branch = env!("GIT_BRANCH"),
        "starting soulbrowser"
    );
    let _metrics_server = soulbrowser_cli::metrics::spawn_metrics_server(cli.metrics_port);

    let mut config = RuntimeConfig::from_env().context("loading runtime config")?;
    if let Some(port) = cli.port {
        config.listen_port = port;
    }
    let config = Arc::new(config);

    let db = Arc::new(Db::open(&config.db_path).context("opening session database")?);
    let llm = Arc::new(AnthropicLlmClient::new(config.llm_api_key.clone()));
    let orchestrator = Arc::new(SessionOrchestrator::new(db, config.clone(), llm));
    let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::from_env(
        "SOULBROWSER_RATE_LIMIT_TASK_PER_MIN",
        15,
    )));

    let state = ServeState {
        orchestrator,
        config: config.clone(),
        rate_limiter: rate_limiter.clone(),
    };
    let app = server::build_router(state);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            ticker.tick().await;
            let removed = rate_limiter.prune_idle(std::time::Duration::from_secs(600));
            if removed > 0 {
                tracing::debug!(removed, "pruned idle rate-limit buckets");
            }
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("server exited")?;

    Ok(())
}
