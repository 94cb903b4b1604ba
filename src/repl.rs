use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::{Config as RlConfig, DefaultEditor};
use sac_analytics::export::write_export;
use sac_analytics::{FilterSelection, ReportGenerator, SentimentAggregator};
use sac_core::cache::DatasetCache;
use sac_core::config::AppConfig;

const BANNER: &str = r#"
  ╔═══════════════════════════════════════════╗
  ║          sac-dashboard v0.1.0             ║
  ║   Sentiment by attendant                  ║
  ╚═══════════════════════════════════════════╝
"#;

const HELP: &str = "  /attendants        — List attendants
  /attendant <name>  — Select an attendant
  /sentiments        — List sentiments ([x] = selected)
  /select <a,b,...>  — Replace the sentiment selection
  /toggle <label>    — Add or remove one sentiment
  /all | /none       — Select every sentiment / clear the selection
  /generate          — Show counts for the current selection
  /overview          — Show counts for every attendant
  /export            — Write the filtered rows to a text file
  /reload            — Reload the dataset
  /status            — Show data source and selection
  /config            — Show current config
  /help              — Show this help
  /exit              — Quit";

/// Interactive state: the cached dataset plus the current selection.
struct Dashboard {
    config: AppConfig,
    cache: DatasetCache,
    aggregator: SentimentAggregator,
    selection: FilterSelection,
}

impl Dashboard {
    async fn new(config: AppConfig, cache: DatasetCache) -> Self {
        let aggregator = SentimentAggregator::new(config.filter.threshold());
        let mut dashboard = Self {
            config,
            cache,
            aggregator,
            selection: FilterSelection::default(),
        };
        dashboard.reset_selection().await;
        dashboard
    }

    /// First attendant, configured default sentiments (or all of them).
    async fn reset_selection(&mut self) {
        let outcome = self.cache.get().await;
        for notice in &outcome.notices {
            println!("\x1b[1;33m  ⚠  {}\x1b[0m", notice);
        }

        let attendant = outcome.dataset.attendants().into_iter().next().unwrap_or_default();
        let sentiments = if self.config.filter.default_sentiments.is_empty() {
            outcome.dataset.sentiments()
        } else {
            self.config.filter.default_sentiments.clone()
        };
        self.selection = FilterSelection::new(attendant, sentiments);
    }

    fn prompt(&self) -> String {
        let attendant = if self.selection.attendant.is_empty() {
            "no data"
        } else {
            self.selection.attendant.as_str()
        };
        format!("\x1b[1;36m{}\x1b[0m \x1b[1;32m❯\x1b[0m ", attendant)
    }

    /// Handle a slash command. Returns `true` to continue the loop, `false` to exit.
    async fn handle_command(&mut self, input: &str) -> Result<bool> {
        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let cmd = parts[0];
        let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

        match cmd {
            "/exit" | "/quit" | "/q" => {
                println!("Goodbye!");
                return Ok(false);
            }
            "/attendants" | "/ls" => {
                let outcome = self.cache.get().await;
                let attendants = outcome.dataset.attendants();
                if attendants.is_empty() {
                    println!("  No attendants.");
                }
                for name in attendants {
                    let marker = if name == self.selection.attendant { " ◀" } else { "" };
                    println!("  {}{marker}", name);
                }
            }
            "/attendant" | "/a" => {
                if arg.is_empty() {
                    println!("Usage: /attendant <name>");
                } else {
                    let outcome = self.cache.get().await;
                    match resolve_attendant(&outcome.dataset.attendants(), arg) {
                        Ok(name) => {
                            println!("Selected attendant: {}", name);
                            self.selection.attendant = name;
                        }
                        Err(msg) => println!("{}", msg),
                    }
                }
            }
            "/sentiments" => {
                let outcome = self.cache.get().await;
                for label in outcome.dataset.sentiments() {
                    let mark = if self.selection.is_selected(&label) { "x" } else { " " };
                    println!("  [{}] {}", mark, label);
                }
            }
            "/select" => {
                let labels: Vec<&str> = arg
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                self.selection.set_sentiments(labels);
                println!("Selected: {}", self.selection.sentiments().join(", "));
            }
            "/toggle" => {
                if arg.is_empty() {
                    println!("Usage: /toggle <sentiment>");
                } else if self.selection.toggle(arg) {
                    println!("Added {}", arg);
                } else {
                    println!("Removed {}", arg);
                }
            }
            "/all" => {
                let outcome = self.cache.get().await;
                self.selection.set_sentiments(outcome.dataset.sentiments());
                println!("Selected: {}", self.selection.sentiments().join(", "));
            }
            "/none" => {
                self.selection.set_sentiments(Vec::<String>::new());
                println!("Sentiment selection cleared.");
            }
            "/generate" | "/g" => {
                let outcome = self.cache.get().await;
                let counts = self
                    .aggregator
                    .filtered_counts(outcome.dataset.records(), &self.selection);
                print!(
                    "{}",
                    ReportGenerator::filtered_summary(&self.selection, &counts, &self.aggregator)
                );
            }
            "/overview" => {
                let outcome = self.cache.get().await;
                let rows = self.aggregator.overview(outcome.dataset.records());
                print!("{}", ReportGenerator::overview_table(&rows));
            }
            "/export" => {
                let outcome = self.cache.get().await;
                let rows = self
                    .aggregator
                    .filtered_records(outcome.dataset.records(), &self.selection);
                match write_export(&self.config.export_dir(), &self.selection, &rows) {
                    Ok(path) => println!("Exported {} rows to {}", rows.len(), path.display()),
                    Err(e) => eprintln!("\x1b[0;31mExport failed: {}\x1b[0m", e),
                }
            }
            "/reload" => {
                self.cache.invalidate();
                self.reset_selection().await;
                let outcome = self.cache.get().await;
                println!(
                    "Reloaded {} calls from {}",
                    outcome.dataset.len(),
                    outcome.origin
                );
            }
            "/status" => {
                let outcome = self.cache.get().await;
                println!("  Source: {} ({} calls)", outcome.origin, outcome.dataset.len());
                println!("  Attendant: {}", self.selection.attendant);
                println!("  Sentiments: {}", self.selection.sentiments().join(", "));
                println!(
                    "  Threshold: {}s",
                    self.aggregator.threshold().as_secs()
                );
            }
            "/config" => {
                let toml_str = toml::to_string_pretty(&self.config)?;
                println!("{}", toml_str);
            }
            "/help" | "/?" => {
                println!("{}", HELP);
            }
            _ => {
                println!(
                    "Unknown command: {}. Type /help for available commands.",
                    cmd
                );
            }
        }

        Ok(true)
    }
}

/// Exact match first, then a unique case-insensitive prefix.
fn resolve_attendant(attendants: &[String], query: &str) -> Result<String, String> {
    if let Some(name) = attendants.iter().find(|a| a.as_str() == query) {
        return Ok(name.clone());
    }

    let lower = query.to_lowercase();
    let matches: Vec<&String> = attendants
        .iter()
        .filter(|a| a.to_lowercase().starts_with(&lower))
        .collect();
    match matches.as_slice() {
        [] => Err(format!("No attendant matching '{}'", query)),
        [name] => Ok((*name).clone()),
        _ => Err(format!(
            "Ambiguous attendant '{}', {} matches",
            query,
            matches.len()
        )),
    }
}

/// Run the interactive REPL.
pub async fn run(config: AppConfig, cache: DatasetCache) -> Result<()> {
    println!("{}", BANNER);
    println!("{}", HELP);
    println!();

    let mut dashboard = Dashboard::new(config, cache).await;

    // Set up rustyline.
    let rl_config = RlConfig::builder().auto_add_history(true).build();
    let history_path = AppConfig::data_dir().join("repl_history.txt");
    let mut rl = DefaultEditor::with_config(rl_config)?;
    let _ = rl.load_history(&history_path);

    loop {
        match rl.readline(&dashboard.prompt()) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }

                if !input.starts_with('/') {
                    println!("Commands start with '/'. Type /help for available commands.");
                    continue;
                }

                if !dashboard.handle_command(input).await? {
                    break; // /exit
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    // Save history.
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}
