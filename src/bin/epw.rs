//! EPW command-line tool
//!
//! Decode article codes and maintain the exception table from a terminal.
//!
//! Usage:
//!   cargo run --features cli --bin epw -- decode RSC23CL01 CHSM23CL01 --debug
//!   cargo run --features cli --bin epw -- exceptions add PSL23BA01 "slim model" --modelo SL
//!   cargo run --features cli --bin epw -- exceptions export > exceptions.json
//!   cargo run --features cli --bin epw -- articles --page 2 --size 25
//!
//! Configuration comes from the environment (or `.env`): EPW_API_URL,
//! EPW_STORE_DIR, EPW_CACHE_TTL_SECS, EPW_HTTP_TIMEOUT_SECS.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use epw_decoder::error::Result as EpwResult;
use epw_decoder::{
    ArticleCatalog, AttributeClass, AttributeResolver, BackupSource, DecodeResult, DecoderConfig,
    EpwDecoder, ExceptionStore, FileStore, HttpArticleSource, HttpAttributeSource, ManualMapping,
};

#[derive(Parser, Debug)]
#[command(name = "epw")]
#[command(about = "Decode EPW article codes and maintain decode exceptions")]
struct Cli {
    /// Directory of the persisted exception table and attribute cache
    #[arg(long, env = "EPW_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Base URL of the attributes / articles service
    #[arg(long, env = "EPW_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode one or more codes
    Decode {
        codes: Vec<String>,

        /// Show the front-part scoring
        #[arg(long)]
        debug: bool,

        /// Do not contact the attributes service
        #[arg(long)]
        offline: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Maintain the exception table
    #[command(subcommand)]
    Exceptions(ExceptionCommand),

    /// List a page of articles with their decodes
    Articles {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 50)]
        size: u32,
    },
}

#[derive(Subcommand, Debug)]
enum ExceptionCommand {
    /// List all exceptions
    List,
    /// Add or replace an exception
    Add {
        code: String,
        reason: String,
        #[command(flatten)]
        mapping: MappingArgs,
    },
    /// Remove an exception
    Remove { code: String },
    /// Print the table as an export file
    Export,
    /// Merge an export file into the table
    Import { file: PathBuf },
    /// Write a manual backup
    Backup,
    /// Restore the table from the last backup
    Restore,
    /// Check the persisted table for structural problems
    Validate,
}

#[derive(Args, Debug, Default)]
struct MappingArgs {
    #[arg(long)]
    tipo: Option<String>,
    #[arg(long)]
    certif: Option<String>,
    #[arg(long)]
    modelo: Option<String>,
    #[arg(long)]
    comprim: Option<String>,
    #[arg(long)]
    cor: Option<String>,
    #[arg(long)]
    acabamento: Option<String>,
}

impl MappingArgs {
    fn into_mapping(self) -> Option<ManualMapping> {
        let mapping = ManualMapping {
            tipo: self.tipo,
            certif: self.certif,
            modelo: self.modelo,
            comprim: self.comprim,
            cor: self.cor,
            acabamento: self.acabamento,
        };
        (!mapping.is_empty()).then_some(mapping)
    }
}

fn open_store(config: &DecoderConfig) -> EpwResult<Arc<FileStore>> {
    Ok(Arc::new(FileStore::open(&config.store_dir)?))
}

fn build_decoder(
    config: &DecoderConfig,
    store: Arc<FileStore>,
    offline: bool,
) -> anyhow::Result<EpwDecoder> {
    let mut resolver = AttributeResolver::from_config(config).with_store(store.clone());
    if !offline {
        resolver = resolver.with_source(Arc::new(HttpAttributeSource::new(config)?));
    }
    let exceptions = Arc::new(ExceptionStore::open(store));
    Ok(EpwDecoder::new(Arc::new(resolver)).with_exceptions(exceptions))
}

fn print_result(code: &str, result: &DecodeResult) {
    match result.product() {
        Some(product) => {
            println!("{} {}", "✓".green(), code.bold());
            for (class, entry) in product.entries() {
                println!("    {:<14} {:<4} {}", class.label(), entry.code, entry.description);
            }
            println!("    {}", result.message().dimmed());
        }
        _ => println!("{} {}  {}", "✗".red(), code.bold(), result.message().red()),
    }

    if let Some(trace) = result.trace() {
        println!("    front '{}':", trace.front);
        for candidate in &trace.candidates {
            let marker = if candidate.strategy == trace.chosen { "*" } else { " " };
            println!(
                "    {} {:?}: tipo={:?} certif={:?} modelo={:?} score={}",
                marker,
                candidate.strategy,
                candidate.tipo,
                candidate.certif,
                candidate.modelo,
                candidate.score
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = DecoderConfig::from_env();
    if let Some(dir) = cli.store_dir {
        config = config.with_store_dir(dir);
    }
    if let Some(url) = cli.api_url {
        config = config.with_api_base_url(url);
    }
    let store = open_store(&config)?;

    match cli.command {
        Command::Decode {
            codes,
            debug,
            offline,
            json,
        } => {
            let decoder = build_decoder(&config, store, offline)?;
            if !offline {
                decoder.resolver().preload(&AttributeClass::ALL).await;
            }

            let results = decoder.decode_all(codes.iter().map(String::as_str), debug);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for (code, result) in codes.iter().zip(&results) {
                    print_result(code, result);
                }
            }
            if results.iter().any(|r| !r.success()) {
                std::process::exit(2);
            }
        }

        Command::Exceptions(command) => {
            let exceptions = ExceptionStore::open(store);
            run_exception_command(&exceptions, command)?;
        }

        Command::Articles { page, size } => {
            let decoder = Arc::new(build_decoder(&config, store, false)?);
            let catalog = ArticleCatalog::new(Arc::new(HttpArticleSource::new(&config)?), decoder);

            let (listing, views) = catalog.describe_page(page, size).await?;
            for view in &views {
                let name = view.display_name();
                if view.decoded.is_some() {
                    println!("{:<12} {}", view.code.bold(), name);
                } else {
                    println!("{:<12} {}", view.code.bold(), name.yellow());
                }
            }
            println!(
                "{}",
                format!(
                    "page {}/{} ({} articles)",
                    listing.page,
                    listing
                        .total_pages
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    listing
                        .total
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| views.len().to_string())
                )
                .dimmed()
            );
        }
    }

    Ok(())
}

fn run_exception_command(
    exceptions: &ExceptionStore,
    command: ExceptionCommand,
) -> anyhow::Result<()> {
    match command {
        ExceptionCommand::List => {
            for record in exceptions.list() {
                println!("{:<12} {}", record.code.bold(), record.reason);
                if let Some(mapping) = &record.manual_mapping {
                    for class in AttributeClass::ALL {
                        if let Some(code) = mapping.get(class) {
                            println!("    {:<14} {}", class.label(), code);
                        }
                    }
                }
            }
            let stats = exceptions.stats();
            println!(
                "{}",
                format!(
                    "{} exceptions ({} with manual mapping), version {}",
                    stats.total, stats.with_mapping, stats.version
                )
                .dimmed()
            );
        }
        ExceptionCommand::Add {
            code,
            reason,
            mapping,
        } => {
            let record = exceptions.upsert(&code, &reason, mapping.into_mapping())?;
            println!("{} exception {}", "Saved".green(), record.code.bold());
        }
        ExceptionCommand::Remove { code } => {
            if exceptions.remove(&code) {
                println!("{} exception {}", "Removed".green(), code.bold());
            } else {
                println!("{} no exception for {}", "Skipped".yellow(), code.bold());
            }
        }
        ExceptionCommand::Export => {
            println!("{}", exceptions.export()?);
        }
        ExceptionCommand::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            if !exceptions.import(&content) {
                anyhow::bail!("{} is not a valid exception export", file.display());
            }
            println!("{} {}", "Imported".green(), file.display());
        }
        ExceptionCommand::Backup => {
            if !exceptions.create_backup(BackupSource::Manual) {
                anyhow::bail!("backup failed");
            }
            println!("{}", "Backup written".green());
        }
        ExceptionCommand::Restore => {
            if !exceptions.restore_from_backup() {
                anyhow::bail!("no usable backup to restore");
            }
            println!("{}", "Restored from backup".green());
        }
        ExceptionCommand::Validate => {
            let report = exceptions.validate_integrity();
            if report.is_valid {
                println!("{}", "Exception table is valid".green());
            } else {
                for error in &report.errors {
                    println!("{} {}", "✗".red(), error);
                }
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
