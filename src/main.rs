//! # Contract Desk CLI (`cdesk`)
//!
//! The `cdesk` binary is the primary interface for Contract Desk. It provides
//! commands for database initialization, contract import, filtering and
//! representative sampling, document analysis, and starting the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! cdesk --config ./config/cdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cdesk init` | Create the SQLite database and run schema migrations |
//! | `cdesk import <file>` | Upsert contracts from a JSON array |
//! | `cdesk list [filters]` | List contracts matching filters |
//! | `cdesk sample --size N` | Select a representative sample |
//! | `cdesk stats` | Category breakdown of the portfolio |
//! | `cdesk extract <file>` | Print the text extracted from a document |
//! | `cdesk analyze <files..>` | LLM analysis of contract documents |
//! | `cdesk read <file>` | Extract registration fields with the LLM |
//! | `cdesk filter ...` | Infer, add, list and remove custom filters |
//! | `cdesk serve` | Start the HTTP API |
//! | `cdesk completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr and is controlled by `CDESK_LOG`
//! (e.g. `CDESK_LOG=contract_desk=debug`); the default level is `warn`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use contract_desk::analyze;
use contract_desk::config::{self, Config};
use contract_desk::contracts::{self, ContractQuery};
use contract_desk::extract::{self, content_type_for_path};
use contract_desk::filters_cmd;
use contract_desk::llm::{self, LlmClient, LlmError};
use contract_desk::migrate;
use contract_desk::progress::ProgressMode;
use contract_desk::reader;
use contract_desk::server::{self, AppState};
use contract_desk::sqlite_store::SqliteStore;
use contract_desk::stats;
use contract_desk_core::chunk::process_text;
use contract_desk_core::custom_filter::FilterValue;
use contract_desk_core::store::ContractStore;

/// Contract Desk CLI — contract portfolio sampling, filtering and LLM
/// document analysis.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cdesk",
    about = "Contract Desk — contract portfolio sampling, filtering and LLM document analysis",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent.
    Init,

    /// Import contracts from a JSON array file (insert or replace by id).
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// List contracts matching the given filters.
    List {
        #[command(flatten)]
        query: ContractQuery,

        /// Custom filter value as `FILTER_ID=VALUE` (VALUE may be JSON).
        #[arg(long = "custom", value_parser = parse_custom)]
        custom: Vec<(String, FilterValue)>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Select a representative sample of contracts.
    ///
    /// Covers regions first, then flow types, statuses and responsible
    /// areas, and fills the rest with the most complete records.
    Sample {
        /// Sample size. Defaults to `[sampling].default_size`.
        #[arg(long, allow_negative_numbers = true)]
        size: Option<i64>,

        /// Print JSON (sample plus coverage report).
        #[arg(long)]
        json: bool,
    },

    /// Show category counts across all analytics dimensions.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Extract text from a document (PDF, DOCX or plain text).
    Extract {
        file: PathBuf,

        /// Print the cleaned text used for analysis.
        #[arg(long)]
        clean: bool,

        /// Print cleaned text, chunks and metadata as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Analyze contract documents with the LLM.
    ///
    /// Documents are processed one at a time; a failing document is
    /// reported and the batch continues.
    Analyze {
        /// Documents to analyze.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Contract the documents belong to.
        #[arg(long)]
        contract_id: Option<String>,

        /// Store the analyses in the database.
        #[arg(long)]
        save: bool,

        /// Progress output on stderr. Defaults to human on a TTY, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,

        /// Print the batch report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract registration fields from a contract document with the LLM.
    Read {
        file: PathBuf,

        /// Contract id for the record. Defaults to the file stem.
        #[arg(long)]
        contract_id: Option<String>,

        /// Upsert the resulting contract into the database.
        #[arg(long)]
        save: bool,
    },

    /// Manage custom filters.
    Filter {
        #[command(subcommand)]
        action: FilterAction,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Custom filter subcommands.
#[derive(Subcommand)]
enum FilterAction {
    /// Ask the LLM which filter kind suits a contract column.
    Infer {
        /// Column name, e.g. `risk_level`.
        column: String,
    },
    /// Save a custom filter.
    Add {
        name: String,
        /// Filter kind, e.g. `dropdown`, `multi_select`, `range`, `date_range`.
        #[arg(long)]
        kind: String,
        /// Contract column the filter applies to.
        #[arg(long)]
        column: String,
        /// Allowed option (repeatable).
        #[arg(long = "option")]
        options: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List saved custom filters.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove a custom filter by id.
    Remove { id: String },
}

/// Parse a `FILTER_ID=VALUE` pair for `--custom` arguments.
fn parse_custom(s: &str) -> Result<(String, FilterValue), String> {
    contracts::parse_custom_arg(s).map_err(|e| e.to_string())
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("CDESK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// An LLM client, refusing early when no provider is configured.
fn require_llm(cfg: &Config) -> anyhow::Result<Arc<dyn LlmClient>> {
    if !cfg.llm.is_enabled() {
        return Err(LlmError::Disabled.into());
    }
    Ok(llm::create_client(&cfg.llm)?)
}

async fn read_document(path: &Path) -> anyhow::Result<String> {
    let content_type = content_type_for_path(path)
        .with_context(|| format!("unsupported file type: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(extract::extract_text(&bytes, content_type)
        .with_context(|| format!("failed to extract text from {}", path.display()))?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "cdesk", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Extract { file, clean, json } => {
            let text = read_document(file).await?;
            if *json {
                let id = file.display().to_string();
                print_json(&process_text(&id, &text, config::ChunkingConfig::default().max_tokens))?;
            } else if *clean {
                println!("{}", contract_desk_core::chunk::clean_extracted_text(&text));
            } else {
                println!("{}", text);
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            let store = SqliteStore::open(&cfg).await?;
            let count = contracts::import_contracts(&store, &file).await?;
            println!("Imported {} contract(s).", count);
            store.pool().close().await;
        }
        Commands::List {
            query,
            custom,
            json,
        } => {
            let store = SqliteStore::open(&cfg).await?;
            let mut filter = query.to_filter()?;
            if !custom.is_empty() {
                let defined = store.custom_filters().await?;
                filter.custom = contracts::resolve_custom(&defined, custom)?;
            }
            let found = store.query_contracts(&filter, contracts::today()).await?;
            if json {
                print_json(&found)?;
            } else {
                contracts::print_table(&found);
            }
            store.pool().close().await;
        }
        Commands::Sample { size, json } => {
            let size = match size {
                None => cfg.sampling.default_size,
                Some(n) if n < 0 => bail!("--size must not be negative"),
                Some(n) => usize::try_from(n).context("--size is too large")?,
            };
            let store = SqliteStore::open(&cfg).await?;
            let result = contracts::sample_contracts(&store, size, contracts::today()).await?;
            if json {
                print_json(&result)?;
            } else {
                contracts::print_table(&result.contracts);
                println!();
                println!("Coverage:");
                for d in &result.diversity.dimensions {
                    println!(
                        "  {:<18} {:>3} / {:<3} categories",
                        d.dimension.label(),
                        d.covered_categories,
                        d.population_categories
                    );
                }
            }
            store.pool().close().await;
        }
        Commands::Stats { json } => {
            let store = SqliteStore::open(&cfg).await?;
            let report = stats::collect_stats(&store, &cfg, contracts::today()).await?;
            if json {
                print_json(&report)?;
            } else {
                stats::print_stats(&cfg, &report);
            }
            store.pool().close().await;
        }
        Commands::Analyze {
            files,
            contract_id,
            save,
            progress,
            json,
        } => {
            let client = require_llm(&cfg)?;
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            let paths: Vec<&Path> = files.iter().map(PathBuf::as_path).collect();
            let report = analyze::analyze_files(
                client.as_ref(),
                &cfg.chunking,
                &paths,
                contract_id.as_deref(),
                reporter.as_ref(),
            )
            .await;

            if save {
                let store = SqliteStore::open(&cfg).await?;
                analyze::save_report(&store, &report).await?;
                store.pool().close().await;
            }

            if json {
                print_json(&report)?;
            } else {
                for stored in &report.results {
                    match &stored.error {
                        None => println!(
                            "{}  score {:>3}  risk {:<6}  {}",
                            stored.file_name,
                            stored.analysis.score,
                            stored.risk_bucket.label(),
                            stored.analysis.summary
                        ),
                        Some(err) => println!("{}  FAILED  {}", stored.file_name, err),
                    }
                }
                println!();
                print!(
                    "{} document(s): {} analyzed, {} failed",
                    report.summary.total, report.summary.succeeded, report.summary.failed
                );
                match report.average_score {
                    Some(avg) => println!(", average score {:.1}", avg),
                    None => println!(),
                }
            }
        }
        Commands::Read {
            file,
            contract_id,
            save,
        } => {
            let client = require_llm(&cfg)?;
            let id = match contract_id {
                Some(id) => id,
                None => file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .context("cannot derive a contract id from the file name; pass --contract-id")?,
            };
            let text = read_document(&file).await?;
            let record = reader::read_contract(client.as_ref(), &id, &text).await?;
            if save {
                let store = SqliteStore::open(&cfg).await?;
                store.upsert_contract(&record).await?;
                store.pool().close().await;
            }
            print_json(&record)?;
        }
        Commands::Filter { action } => {
            let store = SqliteStore::open(&cfg).await?;
            match action {
                FilterAction::Infer { column } => {
                    let client = require_llm(&cfg)?;
                    let suggestion =
                        filters_cmd::infer_filter(client.as_ref(), &store, &column).await?;
                    print_json(&suggestion)?;
                }
                FilterAction::Add {
                    name,
                    kind,
                    column,
                    options,
                    description,
                } => {
                    let filter =
                        filters_cmd::add_filter(&store, &name, &kind, &column, options, description)
                            .await?;
                    println!("Saved filter {} ({}).", filter.name, filter.id);
                }
                FilterAction::List { json } => {
                    let filters = store.custom_filters().await?;
                    if json {
                        print_json(&filters)?;
                    } else {
                        filters_cmd::print_filters(&filters);
                    }
                }
                FilterAction::Remove { id } => {
                    filters_cmd::remove_filter(&store, &id).await?;
                    println!("Removed filter {}.", id);
                }
            }
            store.pool().close().await;
        }
        Commands::Serve => {
            let store = SqliteStore::open(&cfg).await?;
            let client = llm::create_client(&cfg.llm)?;
            let state = AppState {
                config: Arc::new(cfg),
                store: Arc::new(store),
                llm: client,
            };
            server::run_server(state).await?;
        }
        Commands::Completions { .. } | Commands::Extract { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
