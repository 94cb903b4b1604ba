mod repl;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sac_analytics::export::{export_text, write_export};
use sac_analytics::{FilterSelection, ReportGenerator, SentimentAggregator};
use sac_core::cache::DatasetCache;
use sac_core::config::AppConfig;
use sac_core::error::SacError;
use sac_core::loader::{LoadOutcome, LoaderChain};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sac-dashboard",
    about = "Sentiment-by-attendant dashboard for call-center transcripts",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/sac-dashboard/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the remote CSV URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Override the local CSV or spreadsheet file
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Override the duration threshold for filtered views, in seconds
    #[arg(long, global = true)]
    threshold_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session (default)
    Interactive,

    /// Print sentiment counts per attendant
    Overview,

    /// Count selected sentiments for one attendant
    Filter {
        /// Attendant to filter on
        #[arg(short, long)]
        attendant: String,
        /// Sentiment labels to include (repeatable)
        #[arg(short, long = "sentiment")]
        sentiments: Vec<String>,
        /// Also write the filtered rows to the export directory
        #[arg(long)]
        export: bool,
    },

    /// Export the filtered rows as plain text
    Export {
        #[arg(short, long)]
        attendant: String,
        #[arg(short, long = "sentiment")]
        sentiments: Vec<String>,
        /// Write to this file instead of the export directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a markdown report of the whole dataset
    Report,

    /// Start the HTTP server
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sac_dashboard=info,warn".into()),
        )
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config.
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Apply CLI overrides.
    if let Some(url) = &cli.url {
        config.source.url = Some(url.clone());
    }
    if let Some(file) = &cli.file {
        config.source.local_path = Some(file.clone());
    }
    if let Some(secs) = cli.threshold_secs {
        config.filter.duration_threshold_secs = secs;
    }

    tracing::debug!(
        "Sources: url={:?} file={:?}, threshold {}s",
        config.source.url,
        config.source.local_path,
        config.filter.duration_threshold_secs,
    );

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            sac_server::serve(config).await?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &config)?;
        }
        Some(Commands::Overview) => {
            let outcome = load(&config).await;
            let aggregator = SentimentAggregator::new(config.filter.threshold());
            print!(
                "{}",
                ReportGenerator::overview_table(&aggregator.overview(outcome.dataset.records()))
            );
        }
        Some(Commands::Filter {
            attendant,
            sentiments,
            export,
        }) => {
            let outcome = load(&config).await;
            let selection = selection_for(&outcome, attendant, sentiments)?;
            let aggregator = SentimentAggregator::new(config.filter.threshold());
            let records = outcome.dataset.records();

            let counts = aggregator.filtered_counts(records, &selection);
            print!(
                "{}",
                ReportGenerator::filtered_summary(&selection, &counts, &aggregator)
            );

            if export {
                let rows = aggregator.filtered_records(records, &selection);
                let path = write_export(&config.export_dir(), &selection, &rows)?;
                println!("  Exported {} rows to {}", rows.len(), path.display());
            }
        }
        Some(Commands::Export {
            attendant,
            sentiments,
            output,
        }) => {
            let outcome = load(&config).await;
            let selection = selection_for(&outcome, attendant, sentiments)?;
            let aggregator = SentimentAggregator::new(config.filter.threshold());
            let rows = aggregator.filtered_records(outcome.dataset.records(), &selection);

            let path = match output {
                Some(path) => {
                    std::fs::write(&path, export_text(rows.iter().copied())?)?;
                    path
                }
                None => write_export(&config.export_dir(), &selection, &rows)?,
            };
            println!("Exported {} rows to {}", rows.len(), path.display());
        }
        Some(Commands::Report) => {
            let outcome = load(&config).await;
            let aggregator = SentimentAggregator::new(config.filter.threshold());
            print!("{}", ReportGenerator::markdown_report(&outcome, &aggregator));
        }
        Some(Commands::Interactive) | None => {
            let cache = DatasetCache::new(LoaderChain::from_config(&config.source));
            repl::run(config, cache).await?;
        }
    }

    Ok(())
}

/// Run the loader chain once and surface its notices.
async fn load(config: &AppConfig) -> LoadOutcome {
    let outcome = LoaderChain::from_config(&config.source).load().await;
    for notice in &outcome.notices {
        eprintln!("note: {}", notice);
    }
    outcome
}

/// Selection for a one-shot command. The attendant must exist in the data;
/// no sentiments means every sentiment.
fn selection_for(
    outcome: &LoadOutcome,
    attendant: String,
    sentiments: Vec<String>,
) -> Result<FilterSelection> {
    if !outcome.dataset.contains_attendant(&attendant) {
        let known = outcome.dataset.attendants().join(", ");
        bail!("{} (known: {})", SacError::UnknownAttendant(attendant), known);
    }
    let sentiments = if sentiments.is_empty() {
        outcome.dataset.sentiments()
    } else {
        sentiments
    };
    Ok(FilterSelection::new(attendant, sentiments))
}

fn handle_config_command(action: Option<ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                config.save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}
