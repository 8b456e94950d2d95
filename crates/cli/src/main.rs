//! Command-line client for Quire document storage.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use quire_chunks::{ContentService, DEFAULT_LIST_LIMIT, Inspection, UploadRequest};
use quire_core::config::AppConfig;
use quire_core::{DocumentId, DocumentRecord, OwnerId, encoded_len, estimate_fragment_count};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quirectl")]
#[command(about = "Store and retrieve documents in Quire")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, env = "QUIRE_CONFIG", default_value = "quire.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file as a new document
    Put {
        /// File to upload
        file: PathBuf,
        /// Owning principal
        #[arg(long)]
        owner: String,
        /// Declared content type (guessed from the extension if omitted)
        #[arg(long)]
        content_type: Option<String>,
        /// Store the bytes exactly as given
        #[arg(long, default_value_t = false)]
        no_preprocess: bool,
    },
    /// Download a document
    Get {
        /// Document ID
        id: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a document and its fragments
    Rm {
        /// Document ID
        id: String,
    },
    /// List an owner's documents
    Ls {
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u32,
    },
    /// Show a document's record and stored fragments
    Inspect {
        /// Document ID
        id: String,
    },
    /// Estimate the fragment count for a payload size
    Estimate {
        /// Raw payload size in bytes
        bytes: u64,
        /// Override the configured fragment size
        #[arg(long)]
        max_fragment_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    run(&config, cli.command).await
}

async fn open(config: &AppConfig) -> Result<ContentService> {
    ContentService::from_config(config)
        .await
        .context("failed to open storage")
}

async fn run(config: &AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Put {
            file,
            owner,
            content_type,
            no_preprocess,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let owner = OwnerId::new(owner)?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unnamed".to_string());

            let mut request = UploadRequest::new(owner, file_name, data);
            if let Some(content_type) = content_type.or_else(|| guess_content_type(&file)) {
                request = request.with_content_type(content_type);
            }
            if no_preprocess {
                request = request.without_preprocessing();
            }

            let record = open(config).await?.upload(request).await?;
            println!("{}", record.id);
            eprintln!(
                "Stored {} bytes ({} encoded) in {}",
                record.raw_size,
                record.encoded_size,
                describe_layout(&record)
            );
        }
        Commands::Get { id, output } => {
            let data = open(config).await?.download(parse_id(&id)?).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &data)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        Commands::Rm { id } => {
            let removed = open(config).await?.delete(parse_id(&id)?).await?;
            println!("Deleted {id} ({removed} fragments)");
        }
        Commands::Ls { owner, limit } => {
            let owner = OwnerId::new(owner)?;
            let records = open(config).await?.list(&owner, limit).await?;
            if records.is_empty() {
                println!("No documents found.");
            } else {
                println!("{:<38} {:<8} {:>12} {:>7}  Name", "ID", "State", "Size", "Chunks");
                println!("{}", "-".repeat(80));
                for record in records {
                    println!(
                        "{:<38} {:<8} {:>12} {:>7}  {}",
                        record.id.to_string(),
                        record.state.as_str(),
                        record.raw_size,
                        record
                            .chunk_count
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        record.file_name
                    );
                }
            }
        }
        Commands::Inspect { id } => {
            let inspection = open(config).await?.inspect(parse_id(&id)?).await?;
            print_inspection(&inspection);
        }
        Commands::Estimate {
            bytes,
            max_fragment_size,
        } => {
            let max = max_fragment_size.unwrap_or(config.chunking.max_fragment_size);
            anyhow::ensure!(max > 0, "fragment size must be greater than zero");
            println!("Raw size:          {bytes} bytes");
            println!("Encoded size:      {} bytes", encoded_len(bytes));
            println!("Fragment size:     {max} bytes");
            println!("Estimated chunks:  {}", estimate_fragment_count(bytes, max));
            println!("Exact chunks:      {}", encoded_len(bytes).div_ceil(max as u64));
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("QUIRE_").ignore(&["config"]).split("__"));

    let config: AppConfig = figment
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

fn parse_id(id: &str) -> Result<DocumentId> {
    DocumentId::parse(id).with_context(|| format!("invalid document id: {id}"))
}

fn guess_content_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => return None,
    };
    Some(content_type.to_string())
}

fn describe_layout(record: &DocumentRecord) -> String {
    match record.chunk_count {
        Some(0) => "the registry record (inline)".to_string(),
        Some(1) => "1 fragment".to_string(),
        Some(n) => format!("{n} fragments"),
        None => "no fragments".to_string(),
    }
}

fn print_inspection(inspection: &Inspection) {
    let record = &inspection.record;
    println!("Document:      {}", record.id);
    println!("Owner:         {}", record.owner);
    println!("Name:          {}", record.file_name);
    println!(
        "Content type:  {}",
        record.content_type.as_deref().unwrap_or("-")
    );
    println!("State:         {}", record.state);
    println!("Raw size:      {} bytes", record.raw_size);
    println!("Encoded size:  {} bytes", record.encoded_size);
    println!("Layout:        {}", describe_layout(record));
    if let Some(hash) = &record.payload_hash {
        println!("Digest:        {hash}");
    }
    println!(
        "Created:       {}",
        record
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| record.created_at.to_string())
    );

    if inspection.fragments.is_empty() {
        println!("\nNo stored fragments.");
        return;
    }
    println!("\n{:>8} {:>8} {:>10}", "Index", "Total", "Size");
    println!("{}", "-".repeat(28));
    for fragment in &inspection.fragments {
        println!(
            "{:>8} {:>8} {:>10}",
            fragment.chunk_index, fragment.total_chunks, fragment.size
        );
    }
}
