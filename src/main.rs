use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};

use llm_analyst::agent::{AnalysisAgent, AnalysisScheduler};
use llm_analyst::analysis;
use llm_analyst::config::AppConfig;
use llm_analyst::data::{load_csv, RandomWalk, RollingWindow};
use llm_analyst::execution::PaperExecutor;
use llm_analyst::llm;
use llm_analyst::Bar;

#[derive(Parser, Debug)]
#[command(name = "llm-analyst")]
#[command(about = "LLM market analysis for index futures: features, summary, prompt, signal")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "LLM_ANALYST_CONFIG")]
    config: Option<PathBuf>,

    /// LLM backend (rule_based or http), overrides llm.backend
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Completion endpoint, overrides llm.endpoint
    #[arg(long, global = true, env = "LLM_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer token for the http backend
    #[arg(long, global = true, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream bars through scheduler, agent and paper executor
    Replay {
        /// CSV file with timestamp,open,high,low,close,volume (synthetic bars when omitted)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Synthetic bars to generate
        #[arg(long, default_value = "390")]
        bars: usize,

        /// Random-walk seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Random-walk start price
        #[arg(long, default_value = "21000.0")]
        start_price: f64,
    },

    /// Run one cycle over the latest window of a CSV file
    Analyze {
        /// CSV file with timestamp,open,high,low,close,volume
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Parse a model reply (file or stdin) into a validated signal
    Parse {
        /// Reply file; reads stdin when omitted
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let directive = if args.verbose { "llm_analyst=debug" } else { "llm_analyst=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(backend) = args.backend {
        config.llm.backend = backend;
    }
    if let Some(endpoint) = args.endpoint {
        config.llm.endpoint = endpoint;
    }
    if args.api_key.is_some() {
        config.llm.api_key = args.api_key;
    }
    config.validate()?;

    match args.command {
        Commands::Replay { data, bars, seed, start_price } => {
            run_replay(&config, data, bars, seed, start_price).await?;
        }
        Commands::Analyze { data } => {
            run_analyze(&config, data).await?;
        }
        Commands::Parse { file } => {
            run_parse(file)?;
        }
    }

    Ok(())
}

async fn run_replay(config: &AppConfig, data: Option<PathBuf>, count: usize, seed: u64, start_price: f64) -> Result<()> {
    let bars: Vec<Bar> = match data {
        Some(path) => load_csv(&path)?,
        None => {
            let start = Utc
                .with_ymd_and_hms(2025, 3, 10, 14, 30, 0)
                .single()
                .context("Invalid synthetic start time")?;
            RandomWalk::new(seed, start_price, start).take(count).collect()
        }
    };

    let backend = llm::from_config(&config.llm)?;
    info!(
        "Replaying {} bars of {} with {} backend",
        bars.len(),
        config.instrument.symbol,
        backend.name()
    );

    let mut agent = AnalysisAgent::new(config, backend);
    let mut scheduler = AnalysisScheduler::new(config.scheduler.clone());
    let mut executor = PaperExecutor::new(config.risk.clone(), config.instrument.point_value());
    let mut window = RollingWindow::new(config.data.window_size);

    let mut actions: BTreeMap<String, usize> = BTreeMap::new();
    let mut rejected = 0usize;

    for bar in &bars {
        executor.on_bar(bar);
        window.push(bar.clone());

        let snapshot = window.as_slice();
        let Some(reason) = scheduler.check(snapshot) else {
            continue;
        };
        debug!("Analysis triggered at {}: {}", bar.timestamp, reason);

        let result = agent.analyze(snapshot).await?;
        scheduler.mark_analyzed(bar);
        *actions.entry(result.signal.action.to_string()).or_default() += 1;

        if let Err(e) = executor.execute_signal(&result.signal, bar) {
            rejected += 1;
            info!("Signal not executed: {}", e);
        }
    }

    if let Some(last) = bars.last() {
        executor.flatten(last);
    }

    let pm = executor.position_manager();
    println!("=== Replay Summary ===");
    println!("Bars: {}", bars.len());
    println!("Analyses: {}", actions.values().sum::<usize>());
    for (action, count) in &actions {
        println!("  {}: {}", action, count);
    }
    println!("Rejected by risk checks: {}", rejected);
    println!("{}", pm.stats_summary());
    for trade in pm.trade_history() {
        println!(
            "  {} {} {:.2} -> {:.2} ({}) {:+.2} pts",
            trade.side, trade.quantity, trade.entry_price, trade.exit_price, trade.exit_reason, trade.pnl_points
        );
    }

    Ok(())
}

async fn run_analyze(config: &AppConfig, data: PathBuf) -> Result<()> {
    let bars = load_csv(&data)?;
    let start = bars.len().saturating_sub(config.data.window_size);
    let window = &bars[start..];

    let backend = llm::from_config(&config.llm)?;
    let mut agent = AnalysisAgent::new(config, backend);
    let result = agent.analyze(window).await?;

    println!("=== Features ===");
    println!("{}", serde_json::to_string_pretty(&result.features)?);
    println!("\n=== Summary ({} chars) ===", result.summary.len());
    println!("{}", result.summary);
    println!("\n=== Prompt ===");
    println!("{}", result.prompt);
    println!("\n=== Response ({}) ===", agent.backend_name());
    println!("{}", result.response);
    println!("\n=== Signal ===");
    println!("{}", serde_json::to_string_pretty(&result.signal)?);

    Ok(())
}

fn run_parse(file: Option<PathBuf>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let signal = analysis::parse(&text);
    println!("{}", serde_json::to_string_pretty(&signal)?);
    Ok(())
}
