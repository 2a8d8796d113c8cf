//! CLI entry point for the code embedding index.
//!
//! Commands inspect and maintain the index of the current repository and run
//! similarity searches against it with the configured fastembed model.

use anyhow::{Context, Result, anyhow, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use coderag::display::{self, Status, THEME, Theme};
use coderag::semantic::SearchResponse;
use coderag::storage::EmbeddingFilters;
use coderag::types::{EmbeddingType, ProviderDescriptor};
use coderag::vector::{OfflineProvider, model_dimensions};
use coderag::{
    DiverseSearchOptions, EmbeddingProvider, EmbeddingStore, FastEmbedProvider, SearchError,
    Settings, SimilaritySearchEngine, StoreError,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Code embedding index and semantic search
#[derive(Parser)]
#[command(
    name = "coderag",
    version = env!("CARGO_PKG_VERSION"),
    about = "Code embedding index and semantic search",
    long_about = "Inspect, maintain and search the embedding index of a repository.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = display::create_help_text()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository identifier (overrides storage.repository_id)
    #[arg(short, long, global = true)]
    repository: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .coderag directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(flatten)]
    Index(IndexCommand),
}

/// Commands that run against the configured repository index
#[derive(Subcommand)]
enum IndexCommand {
    #[command(about = "Display active settings")]
    Config,

    #[command(about = "Show index statistics")]
    Stats {
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Show embedding counts by type and language")]
    Coverage {
        #[arg(long)]
        json: bool,
    },

    #[command(
        about = "Natural language search over the index",
        after_help = "Examples:\n  coderag search \"parse configuration\"\n  coderag search \"open database\" -k 5 --min-similarity 0.4\n  coderag search \"http retry\" --language rust --type function\n  coderag search \"error handling\" --file-pattern '^src/api/'\n  coderag search \"auth\" --diverse --max-per-file 1 --json"
    )]
    Search {
        /// Text to search for
        query: String,

        /// Number of results (defaults to search.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Drop results below this cosine similarity
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Only records of this language
        #[arg(long)]
        language: Option<String>,

        /// Only records of this type (function, class, file, documentation)
        #[arg(long = "type", value_name = "TYPE")]
        embedding_type: Option<EmbeddingType>,

        /// Regular expression matched against the source path
        #[arg(long)]
        file_pattern: Option<String>,

        /// Spread results across files
        #[arg(long)]
        diverse: bool,

        /// Results per file with --diverse (defaults to search.max_per_file)
        #[arg(long)]
        max_per_file: Option<usize>,

        /// Combine similarity with recency, tags and complexity
        #[arg(long)]
        rank: bool,

        /// Tag that raises relevance when ranking (repeatable)
        #[arg(long = "boost-tag", value_name = "TAG")]
        boost_tags: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "Find records similar to a stored record")]
    Similar {
        /// Id of the stored record
        id: String,

        #[arg(short, default_value_t = coderag::semantic::DEFAULT_K)]
        k: usize,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "List records of a source file")]
    File {
        /// Source path exactly as stored
        path: String,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "List records carrying the given tags")]
    Tags {
        #[arg(required = true)]
        tags: Vec<String>,

        /// Require every tag instead of any
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "List records within a complexity range")]
    Complexity {
        #[arg(long, default_value_t = 0.0)]
        min: f64,

        #[arg(long, default_value_t = f64::MAX)]
        max: f64,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "Drop embeddings of changed source files")]
    Invalidate {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    #[command(about = "Delete records by id")]
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    #[command(about = "Compact the index file")]
    Optimize,

    #[command(about = "Remove the whole index of the repository")]
    Clear,

    #[command(about = "Check the index against the configured embedding model")]
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}", THEME.status(Status::Fail, &format!("{e:#}")));
        for suggestion in suggestions_for(&e) {
            eprintln!("  {}", THEME.paint(&THEME.muted, suggestion));
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = match cli.command {
        // Init must work even when the existing settings file is broken
        Commands::Init { force } => return init(force),
        Commands::Index(command) => command,
    };

    let settings = load_settings(cli.config.as_deref(), cli.repository)
        .context("Configuration error")?;
    init_logging(&settings, cli.debug);

    execute(command, settings).await
}

fn init(force: bool) -> Result<()> {
    let dir = std::env::current_dir().context("resolving the current directory")?;
    let path = Settings::init_config_file(dir, force).map_err(|e| anyhow!("{e}"))?;

    println!(
        "{}",
        THEME.status(Status::Ok, &format!("Created configuration at: {}", path.display()))
    );
    println!("Edit this file to customize your settings.");
    Ok(())
}

fn load_settings(config: Option<&Path>, repository: Option<String>) -> Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Settings::load()?,
    };

    if repository.is_some() {
        settings.storage.repository_id = repository;
    }
    Ok(settings)
}

/// RUST_LOG wins; otherwise the configured level, or debug when requested
fn init_logging(settings: &Settings, debug: bool) {
    let default_filter = if debug || settings.debug {
        "debug".to_string()
    } else {
        settings.logging.level.clone()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn suggestions_for(error: &anyhow::Error) -> Vec<&'static str> {
    if let Some(e) = error.downcast_ref::<StoreError>() {
        return e.recovery_suggestions();
    }
    match error.downcast_ref::<SearchError>() {
        Some(SearchError::Store(e)) => e.recovery_suggestions(),
        Some(SearchError::DimensionMismatch { .. }) => {
            vec!["Run 'coderag check' to compare the index with the configured provider"]
        }
        _ => Vec::new(),
    }
}

async fn execute(command: IndexCommand, settings: Settings) -> Result<()> {
    let repository = settings.repository_id();

    match command {
        IndexCommand::Config => {
            println!("{}", THEME.paint(&THEME.heading, "Current Configuration:"));
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
        }

        IndexCommand::Stats { json } => {
            let store = open_store(&settings, &repository, configured_descriptor(&settings)?);
            match (store.load_index()?, store.get_stats()?) {
                (Some(metadata), Some(stats)) => {
                    if json {
                        #[derive(Serialize)]
                        struct StatsOutput<'a> {
                            repository: &'a str,
                            metadata: &'a coderag::IndexMetadata,
                            stats: &'a coderag::IndexStats,
                        }
                        print_json(&StatsOutput {
                            repository: &repository,
                            metadata: &metadata,
                            stats: &stats,
                        })?;
                    } else {
                        println!("{}", display::create_stats_table(&repository, &metadata, &stats));
                    }
                }
                _ => print_empty_index(&repository, json)?,
            }
        }

        IndexCommand::Coverage { json } => {
            let (store, provider) = open_offline(&settings, &repository)?;
            let engine = SimilaritySearchEngine::new(&store, &provider);
            let coverage = engine.get_coverage_stats()?;
            if json {
                print_json(&coverage)?;
            } else if coverage.total_embeddings == 0 {
                print_empty_index(&repository, false)?;
            } else {
                println!("{}", display::create_coverage_table(&coverage));
            }
        }

        IndexCommand::Search {
            query,
            k,
            min_similarity,
            language,
            embedding_type,
            file_pattern,
            diverse,
            max_per_file,
            rank,
            boost_tags,
            json,
        } => {
            let provider = load_provider(&settings)?;
            let store = open_store(&settings, &repository, provider.descriptor());

            if let Some(metadata) = store.load_index()? {
                let check = store.check_compatibility(&provider, &metadata);
                if check.requires_rebuild {
                    bail!(
                        "{}",
                        check
                            .reason
                            .unwrap_or_else(|| "index requires a rebuild".to_string())
                    );
                }
                if !check.compatible {
                    eprintln!("{}", THEME.index_state(&check));
                }
            }

            let mut options = settings.search_options();
            if let Some(k) = k {
                options.k = k;
            }
            if min_similarity.is_some() {
                options.min_similarity = min_similarity;
            }
            options = options.with_filters(EmbeddingFilters {
                language,
                embedding_type,
                file_pattern,
                min_complexity: None,
                max_complexity: None,
            });
            if rank || options.enable_ranking {
                options = options.with_ranking(boost_tags);
            }

            let engine =
                SimilaritySearchEngine::new(&store, &provider).with_ranking_config(settings.ranking);
            let response = if diverse {
                let diverse_options = DiverseSearchOptions {
                    search: options,
                    max_per_file: max_per_file.unwrap_or(settings.search.max_per_file),
                };
                let response = engine.search_diverse(&query, &diverse_options).await?;
                if !json {
                    warn_if_capped(&response, &diverse_options);
                }
                response
            } else {
                engine.search(&query, &options).await?
            };

            print_response(&query, &response, json)?;
        }

        IndexCommand::Similar { id, k, json } => {
            let (store, provider) = open_offline(&settings, &repository)?;
            let target = store
                .load_embeddings()?
                .into_iter()
                .find(|record| record.id == id)
                .with_context(|| format!("no embedding with id '{id}'"))?;

            let engine = SimilaritySearchEngine::new(&store, &provider);
            let results = engine.find_similar_to_embedding(&target, k)?;
            if json {
                print_json(&results)?;
            } else {
                println!("Similar to {}", THEME.record(&target));
                println!("{}", display::create_results_table(&results));
            }
        }

        IndexCommand::File { path, json } => {
            let (store, provider) = open_offline(&settings, &repository)?;
            let records = SimilaritySearchEngine::new(&store, &provider).find_by_file(&path)?;
            print_records(&records, json)?;
        }

        IndexCommand::Tags { tags, all, json } => {
            let (store, provider) = open_offline(&settings, &repository)?;
            let records = SimilaritySearchEngine::new(&store, &provider).find_by_tags(&tags, all)?;
            print_records(&records, json)?;
        }

        IndexCommand::Complexity { min, max, json } => {
            if min > max {
                bail!("--min ({min}) must not exceed --max ({max})");
            }
            let (store, provider) = open_offline(&settings, &repository)?;
            let records =
                SimilaritySearchEngine::new(&store, &provider).find_by_complexity(min, max)?;
            print_records(&records, json)?;
        }

        IndexCommand::Invalidate { paths } => {
            let mut store = open_store(&settings, &repository, configured_descriptor(&settings)?);
            store.initialize()?;
            let removed = store.invalidate_changed_files(&paths)?;
            println!(
                "{}",
                THEME.status(Status::Ok, &format!(
                    "Removed {removed} embeddings from {} files",
                    paths.len()
                ))
            );
        }

        IndexCommand::Delete { ids } => {
            let mut store = open_store(&settings, &repository, configured_descriptor(&settings)?);
            store.initialize()?;
            let removed = store.delete_embeddings(&ids)?;
            println!(
                "{}",
                THEME.status(Status::Ok, &format!("Deleted {removed} of {} embeddings", ids.len()))
            );
        }

        IndexCommand::Optimize => {
            let mut store = open_store(&settings, &repository, configured_descriptor(&settings)?);
            store.initialize()?;
            let report = store.optimize()?;
            println!("{}", display::create_optimize_table(&report));
        }

        IndexCommand::Clear => {
            let mut store = open_store(&settings, &repository, configured_descriptor(&settings)?);
            let count = store.count()?;
            store.clear()?;
            println!(
                "{}",
                THEME.status(Status::Ok, &format!("Cleared {count} embeddings for {repository}"))
            );
        }

        IndexCommand::Check => {
            let provider = load_provider(&settings)?;
            if !provider.test_connection().await {
                eprintln!(
                    "{}",
                    THEME.status(Status::Warn, &format!("Provider '{}' did not answer", provider.name()))
                );
            }

            let store = open_store(&settings, &repository, provider.descriptor());
            let Some(metadata) = store.load_index()? else {
                return print_empty_index(&repository, false);
            };

            let check = store.check_compatibility(&provider, &metadata);
            println!(
                "{}",
                display::create_compatibility_table(&check, &metadata, &provider.descriptor())
            );
            println!("{}", THEME.index_state(&check));
            if check.requires_rebuild {
                bail!("the index must be rebuilt before it can be searched");
            }
        }
    }

    Ok(())
}

fn open_store(settings: &Settings, repository: &str, descriptor: ProviderDescriptor) -> EmbeddingStore {
    EmbeddingStore::new(settings.storage_root(), repository, descriptor)
}

/// Store plus a provider that carries the index identity but loads no model
fn open_offline(settings: &Settings, repository: &str) -> Result<(EmbeddingStore, OfflineProvider)> {
    let configured = configured_descriptor(settings)?;
    let store = open_store(settings, repository, configured.clone());
    let descriptor = store
        .load_index()?
        .map(|metadata| metadata.descriptor())
        .unwrap_or(configured);
    Ok((store, OfflineProvider::new(descriptor)))
}

fn configured_descriptor(settings: &Settings) -> Result<ProviderDescriptor> {
    let model = &settings.provider.model;
    let dimensions = model_dimensions(model)
        .with_context(|| format!("unsupported embedding model '{model}'"))?;
    Ok(ProviderDescriptor::new(FastEmbedProvider::NAME, model.as_str(), dimensions))
}

fn load_provider(settings: &Settings) -> Result<FastEmbedProvider> {
    use is_terminal::IsTerminal;

    let models_dir = &settings.provider.models_dir;
    std::fs::create_dir_all(models_dir)
        .with_context(|| format!("creating models directory {}", models_dir.display()))?;

    tracing::info!(model = %settings.provider.model, "loading embedding model");
    let provider = FastEmbedProvider::new(
        &settings.provider.model,
        models_dir.clone(),
        std::io::stderr().is_terminal(),
    )?;
    Ok(provider)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_empty_index(repository: &str, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "repository": repository, "embeddings": 0 }));
    }
    println!(
        "{}",
        THEME.status(Status::Warn, &format!("No embeddings indexed for {repository}"))
    );
    Ok(())
}

fn print_response(query: &str, response: &SearchResponse, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }

    if response.results.is_empty() {
        println!("No results for \"{query}\"");
    } else {
        println!("{}", display::create_results_table(&response.results));
    }

    let stats = &response.stats;
    println!(
        "{} candidates, average similarity {}, {} ms",
        THEME.paint(&THEME.metric, stats.total_embeddings),
        THEME.similarity(stats.average_similarity),
        THEME.paint(&THEME.metric, format!("{:.1}", stats.search_time_ms)),
    );
    Ok(())
}

/// Tell the user when the per-file cap, not the candidate pool, cut results short
fn warn_if_capped(response: &SearchResponse, options: &DiverseSearchOptions) {
    let requested = options.search.k;
    let returned = response.results.len();
    if returned >= requested || returned >= response.stats.total_embeddings {
        return;
    }
    if options.search.min_similarity.is_some() {
        // The threshold may be what dropped the rest
        return;
    }
    eprintln!(
        "{}",
        THEME.status(
            Status::Warn,
            &format!(
                "{returned} of {requested} results: at most {} per file",
                options.max_per_file
            )
        )
    );
}

fn print_records(records: &[coderag::CodeEmbedding], json: bool) -> Result<()> {
    if json {
        return print_json(records);
    }
    if records.is_empty() {
        println!("No matching embeddings");
        return Ok(());
    }
    println!("{}", display::create_records_table(records));
    if Theme::colors_enabled() {
        println!("{} records", THEME.paint(&THEME.metric, records.len()));
    }
    Ok(())
}
