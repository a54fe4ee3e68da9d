use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hoot::index::build::{BuildOptions, index_directory};
use hoot::index::{Document, Engine, EngineConfig, stats};
use hoot::output;
use hoot::query::WildcardPattern;
use hoot::utils::get_config_path;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hoot")]
#[command(about = "Embeddable full-text bitmap index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the index files
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Index name (file stem of the index files)
    #[arg(short, long, global = true)]
    name: Option<String>,

    /// Config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every text file under a directory
    Index {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Re-index files that are already indexed
        #[arg(short, long)]
        force: bool,

        /// Only index files matching these globs
        #[arg(short, long)]
        include: Vec<String>,

        /// No progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Search the index
    Search {
        /// Query, e.g. `red car`, `+red +blue`, `red -bus`, `ca?t*`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,

        /// Maximum results to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Compact the postings files
    Optimize,
    /// Show index statistics
    Stats,
    /// Remove a document from the index by file name
    Remove { file: String },
    /// List indexed words
    Words {
        /// Optional wildcard filter
        pattern: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => get_config_path()?,
    };
    let mut config = EngineConfig::load(&path)?;

    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    match &cli.index_dir {
        Some(dir) => config.index_dir = dir.clone(),
        None if cli.config.is_none() => {
            config.index_dir = EngineConfig::in_app_data(&config.name)?.index_dir;
        }
        None => {}
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let color = !cli.no_color;

    let engine = Engine::open(config).context("Failed to open index")?;

    match cli.command {
        Commands::Index {
            path,
            force,
            include,
            quiet,
        } => {
            let options = BuildOptions {
                force,
                silent: quiet,
                include,
            };
            let report = index_directory(&engine, &path, &options)?;
            output::print_build_report(&report, color)?;
        }
        Commands::Search { query, limit } => {
            let filter = query.join(" ");
            if engine.config().doc_mode {
                let rows = engine.find_rows(&filter)?;
                let docs = rows
                    .iter()
                    .take(limit)
                    .map(|&id| engine.fetch::<Document>(id))
                    .collect::<hoot::Result<Vec<_>>>()?;
                output::print_documents(&docs, rows.len(), color)?;
            } else {
                let rows = engine.find_rows(&filter)?;
                output::print_rows(&rows[..rows.len().min(limit)], color)?;
            }
        }
        Commands::Optimize => {
            engine.optimize()?;
            println!("Index optimized");
        }
        Commands::Stats => {
            stats::show_stats(&engine);
        }
        Commands::Remove { file } => {
            if engine.remove_document_by_name(&file)? {
                engine.save()?;
                println!("Removed: {}", file);
            } else {
                println!("Not indexed: {}", file);
            }
        }
        Commands::Words { pattern } => {
            let mut words = engine.words();
            if let Some(pattern) = pattern {
                let pattern = WildcardPattern::new(&pattern)?;
                words.retain(|w| pattern.is_match(w));
            }
            output::print_words(&words, color)?;
        }
    }

    engine.shutdown()?;
    Ok(())
}
