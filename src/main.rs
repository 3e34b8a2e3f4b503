//! crossarb - Main Entry Point
//!
//! Runs the paper-trading engine or sends admin commands to a run directory.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crossarb::config::loader::load_config;
use crossarb::config::types::AppConfig;
use crossarb::control::admin::{ControlCommand, ControlStore};
use crossarb::detector::source::{MockOpportunitySource, OpportunitySource};
use crossarb::engine::ledger::InMemoryLedger;
use crossarb::engine::orchestrator::Engine;
use crossarb::market::fx::{validate_fx_provider, FixedFxProvider};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the paper-trading engine
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override the configured tick budget (0 = run until stopped)
        #[arg(long)]
        ticks: Option<u64>,

        /// Override the simulation seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Pause the tick loop (RUNNING -> PAUSED)
    Pause(AdminArgs),
    /// Resume a paused loop (PAUSED -> RUNNING)
    Resume(AdminArgs),
    /// Stop the run gracefully
    Stop(AdminArgs),
    /// Irreversible halt
    Panic(AdminArgs),
    /// Irreversible halt with position close semantics
    EmergencyClose(AdminArgs),
    /// Add a symbol to the blacklist
    BlacklistAdd(SymbolArgs),
    /// Remove a symbol from the blacklist
    BlacklistRemove(SymbolArgs),
    /// Show current control state
    Status {
        /// Run directory holding the control state
        #[arg(long, default_value = "runs/latest")]
        run_dir: String,
    },
}

#[derive(clap::Args, Debug)]
struct AdminArgs {
    /// Run directory holding the control state
    #[arg(long, default_value = "runs/latest")]
    run_dir: String,

    /// Why this command is being issued (audited)
    #[arg(long)]
    reason: String,

    /// Who is issuing the command (audited)
    #[arg(long, default_value = "cli")]
    actor: String,
}

#[derive(clap::Args, Debug)]
struct SymbolArgs {
    /// Symbol to add/remove
    symbol: String,

    #[command(flatten)]
    admin: AdminArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Run { config, ticks, seed } => run_engine(&config, ticks, seed).await,
        Command::Pause(a) => admin(a, ControlCommand::Pause),
        Command::Resume(a) => admin(a, ControlCommand::Resume),
        Command::Stop(a) => admin(a, ControlCommand::Stop),
        Command::Panic(a) => admin(a, ControlCommand::Panic),
        Command::EmergencyClose(a) => admin(a, ControlCommand::EmergencyClose),
        Command::BlacklistAdd(s) => {
            let cmd = ControlCommand::BlacklistAdd(s.symbol.clone());
            admin(s.admin, cmd)
        }
        Command::BlacklistRemove(s) => {
            let cmd = ControlCommand::BlacklistRemove(s.symbol.clone());
            admin(s.admin, cmd)
        }
        Command::Status { run_dir } => status(&run_dir),
    }
}

async fn run_engine(config_path: &str, ticks: Option<u64>, seed: Option<u64>) -> Result<()> {
    let mut cfg: AppConfig = match load_config(Some(config_path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            info!("no usable config file ({e}); using paper defaults");
            AppConfig::paper_defaults()
        }
    };
    if let Some(ticks) = ticks {
        cfg.engine.max_ticks = ticks;
    }
    if let Some(seed) = seed {
        cfg.engine.seed = seed;
    }

    // A fixed FX rate is acceptable for paper runs only
    let fx = FixedFxProvider::new(cfg.fx.fixed_rate);
    validate_fx_provider(cfg.engine.run_mode, &fx)?;

    let source = OpportunitySource::Mock(MockOpportunitySource::new(&cfg)?);
    let ledger = std::sync::Arc::new(InMemoryLedger::new());
    let engine = Engine::new(cfg, source, ledger)?;

    let cause = engine.run().await?;
    info!(?cause, "run finished");
    std::process::exit(cause.exit_code() as i32);
}

fn admin(args: AdminArgs, command: ControlCommand) -> Result<()> {
    let store = ControlStore::new(&args.run_dir)?;
    match store.apply(command, &args.actor, &args.reason) {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            println!(
                "{}",
                serde_json::json!({ "status": "error", "message": e.to_string() })
            );
            std::process::exit(1);
        }
    }
}

fn status(run_dir: &str) -> Result<()> {
    let store = ControlStore::new(run_dir)?;
    let state = store.load()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "status": "ok",
            "mode": state.mode,
            "blacklist": state.blacklist,
            "updated_at": state.updated_at,
        }))?
    );
    Ok(())
}
