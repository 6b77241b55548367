//! # Herald — Onboarding Email Scheduler
//!
//! Polls a tracker spreadsheet for rows whose next email is due, sends the
//! matching templated mail, and writes the advanced state back.
//!
//! Usage:
//!   herald                         # Start the gateway (default)
//!   herald serve
//!   herald run [--dry-run]         # One poll cycle, JSON summary on stdout
//!   herald check                   # Probe the spreadsheet store + SMTP relay
//!   herald templates sync|clear    # Template cache maintenance

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use herald_core::HeraldConfig;
use herald_engine::PollEngine;
use herald_mail::{HttpTemplateStore, SmtpMailer};
use herald_sheets::SheetsClient;

#[derive(Parser)]
#[command(name = "herald", version, about = "📬 Herald — onboarding email scheduler")]
struct Cli {
    /// Config file path (default: ~/.herald/config.toml, env HERALD_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the gateway server (and the built-in poller when configured)
    Serve,
    /// Run a single poll cycle and print the JSON summary
    Run {
        /// Force a dry run regardless of configuration
        #[arg(long)]
        dry_run: bool,
    },
    /// Probe the spreadsheet store and the SMTP relay
    Check,
    /// Template cache maintenance
    Templates {
        #[command(subcommand)]
        action: TemplatesAction,
    },
}

#[derive(Subcommand)]
enum TemplatesAction {
    /// Download all core templates into the local cache
    Sync,
    /// Remove all cached templates
    Clear,
}

fn build_engine(config: &HeraldConfig) -> Result<Arc<PollEngine>> {
    let sheets = Arc::new(SheetsClient::from_config(&config.tracker)?);
    let mailer = Arc::new(SmtpMailer::new(&config.smtp, &config.sending));
    let templates = Arc::new(HttpTemplateStore::from_config(&config.templates));
    Ok(Arc::new(PollEngine::new(config, sheets, mailer, templates)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = HeraldConfig::load_from(std::path::Path::new(path))?;
            config.apply_env_overrides();
            config
        }
        None => HeraldConfig::load()?,
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(
                "🚀 Starting Herald (sheet={}, sending={})",
                if config.tracker.sheet_id.is_empty() {
                    "unset"
                } else {
                    &config.tracker.sheet_id
                },
                config.sending.enabled
            );
            let engine = build_engine(&config)?;
            herald_gateway::start(config, engine).await
        }
        Command::Run { dry_run } => {
            if dry_run {
                config.sending.enabled = false;
            }
            let sending_enabled = config.sending.enabled;
            let engine = build_engine(&config)?;
            let summary = engine.run_cycle(chrono::Utc::now(), sending_enabled).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Check => {
            match SheetsClient::from_config(&config.tracker) {
                Ok(sheets) => match sheets.probe().await {
                    Ok(title) => println!("✅ Spreadsheet reachable: {title}"),
                    Err(e) => println!("❌ Spreadsheet probe failed: {e}"),
                },
                Err(e) => println!("❌ Spreadsheet client unavailable: {e}"),
            }
            let mailer = SmtpMailer::new(&config.smtp, &config.sending);
            match mailer.probe().await {
                Ok(true) => println!("✅ SMTP relay reachable"),
                Ok(false) => println!("⚠️ SMTP relay refused the connection test"),
                Err(e) => println!("❌ SMTP probe failed: {e}"),
            }
            Ok(())
        }
        Command::Templates { action } => {
            let store = HttpTemplateStore::from_config(&config.templates);
            match action {
                TemplatesAction::Sync => {
                    let synced = store.sync_all().await?;
                    println!("✅ Synced {} template(s)", synced.len());
                }
                TemplatesAction::Clear => {
                    store.clear_cache()?;
                    println!("✅ Template cache cleared");
                }
            }
            Ok(())
        }
    }
}
