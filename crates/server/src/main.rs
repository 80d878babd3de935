//! Market Resolver: resolve prediction markets from provider data
//!
//! Usage:
//!   market-resolver resolve markets/btc-up-or-down-oct-22-12pm-et.toml
//!   market-resolver batch markets/
//!   market-resolver check markets/
//!   market-resolver klines --symbol BTCUSDT --start "2024-10-22 12:00"
//!   market-resolver serve --port 3001

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use engine::time::{parse_local, parse_timezone, to_millis, DEFAULT_TIMEZONE};
use engine::{market_files, BinanceClient, Config, Interval, Resolver};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "market-resolver")]
#[command(about = "Resolve prediction markets into recommendation tokens", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one market file and print its recommendation
    Resolve {
        /// Path to the market TOML file
        file: PathBuf,
        /// Print the full resolution as JSON instead of the token line
        #[arg(long)]
        json: bool,
    },
    /// Resolve every *.toml market file in a directory
    Batch {
        /// Directory containing market files
        dir: PathBuf,
    },
    /// Validate a market file or a directory of them without fetching data
    Check {
        /// Market file or directory
        path: PathBuf,
    },
    /// Fetch candles through the proxy/primary fallback and print them as JSON
    Klines {
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(long, default_value = "1h")]
        interval: String,
        /// Local start time, e.g. "2024-10-22 12:00"
        #[arg(long)]
        start: String,
        /// Local end time (optional)
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = DEFAULT_TIMEZONE)]
        timezone: String,
        #[arg(long, default_value_t = 24)]
        limit: u32,
    },
    /// Serve a Binance-shaped kline mirror usable as BINANCE_PROXY_URL
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
}

#[derive(Clone)]
struct AppState {
    binance: Arc<BinanceClient>,
}

/// Logs go to stderr: stdout carries only recommendations.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,market_resolver=debug")
    } else {
        EnvFilter::new("info,engine=info,market_resolver=info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    match cli.command {
        Commands::Resolve { file, json } => {
            cmd_resolve(&config, &file, json).await?;
        }
        Commands::Batch { dir } => {
            cmd_batch(&config, &dir, &mut std::io::stdout()).await?;
        }
        Commands::Check { path } => {
            cmd_check(&path, &mut std::io::stdout())?;
        }
        Commands::Klines {
            symbol,
            interval,
            start,
            end,
            timezone,
            limit,
        } => {
            cmd_klines(&config, &symbol, &interval, &start, end.as_deref(), &timezone, limit)
                .await?;
        }
        Commands::Serve { host, port } => {
            cmd_serve(config, &host, port).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Resolve / batch / check
// ============================================================================

async fn cmd_resolve(config: &Config, file: &Path, json: bool) -> anyhow::Result<()> {
    let market = engine::load(file)
        .with_context(|| format!("Invalid market file {}", file.display()))?;
    let resolver = Resolver::from_config(config)?;

    let resolution = resolver.resolve(&market).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        println!("{}", resolution.recommendation.line());
    }
    Ok(())
}

async fn cmd_batch(config: &Config, dir: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let files = market_files(dir)?;
    info!(count = files.len(), dir = %dir.display(), "Resolving market files");

    let resolver = Resolver::from_config(config)?;
    let mut invalid = 0usize;

    for file in &files {
        match engine::load(file) {
            Ok(market) => {
                let resolution = resolver.resolve(&market).await;
                writeln!(out, "{}: {}", market.name, resolution.recommendation.line())?;
            }
            Err(e) => {
                error!(file = %file.display(), error = %e, "Skipping invalid market file");
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} market files are invalid", invalid, files.len());
    }
    Ok(())
}

fn cmd_check(path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let files = if path.is_dir() {
        market_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    let mut invalid = 0usize;
    for file in &files {
        match engine::load(file) {
            Ok(market) => writeln!(out, "ok      {} ({})", market.name, file.display())?,
            Err(e) => {
                writeln!(out, "invalid {}: {}", file.display(), e)?;
                invalid += 1;
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} market files are invalid", invalid, files.len());
    }
    writeln!(out, "{} market file(s) valid", files.len())?;
    Ok(())
}

// ============================================================================
// Klines command (manual inspection)
// ============================================================================

async fn cmd_klines(
    config: &Config,
    symbol: &str,
    interval: &str,
    start: &str,
    end: Option<&str>,
    timezone: &str,
    limit: u32,
) -> anyhow::Result<()> {
    let tz = parse_timezone(timezone)?;
    let interval: Interval = interval.parse()?;
    let start_ms = to_millis(parse_local(start, tz)?);
    let end_ms = end
        .map(|e| parse_local(e, tz).map(to_millis))
        .transpose()?;

    let binance = BinanceClient::from_config(config)?;
    let klines = binance
        .get_klines(symbol, interval, Some(start_ms), end_ms, Some(limit))
        .await
        .with_context(|| format!("Failed to fetch {} {} klines", symbol, interval))?;

    println!("{}", serde_json::to_string_pretty(&klines)?);
    Ok(())
}

// ============================================================================
// Serve command: kline mirror
// ============================================================================

async fn cmd_serve(mut config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Market Resolver v{} kline mirror starting...", APP_VERSION);

    // The mirror is itself a proxy target; it must not route through one
    if config.binance.proxy.take().is_some() {
        warn!("Ignoring BINANCE_PROXY_URL while serving the mirror");
    }

    let state = AppState {
        binance: Arc::new(BinanceClient::from_config(&config)?),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(api_health))
        .route("/api/v3/klines", get(api_klines))
        .with_state(state)
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Market Resolver v{} ===", APP_VERSION);
    println!("Kline mirror listening on http://{}", addr);
    println!("  GET  /health          - Health check");
    println!("  GET  /api/v3/klines   - Binance-shaped klines");
    println!("  Upstream: {}", config.binance.primary);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "market-resolver",
        "version": APP_VERSION,
    }))
}

/// Binance's own query parameter names
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KlinesParams {
    symbol: String,
    interval: String,
    start_time: Option<i64>,
    end_time: Option<i64>,
    limit: Option<u32>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, msg: String) -> ApiError {
    (status, Json(serde_json::json!({ "code": -1, "msg": msg })))
}

/// GET /api/v3/klines, same request and response shape as Binance
async fn api_klines(
    State(state): State<AppState>,
    Query(params): Query<KlinesParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interval: Interval = params
        .interval
        .parse()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("{}", e)))?;

    let rows = state
        .binance
        .get_kline_rows(
            &params.symbol,
            interval,
            params.start_time,
            params.end_time,
            params.limit,
        )
        .await
        .map_err(|e| {
            error!("Upstream klines error: {}", e);
            api_error(StatusCode::BAD_GATEWAY, format!("Upstream error: {}", e))
        })?;

    Ok(Json(serde_json::Value::Array(rows)))
}
