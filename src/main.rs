use std::path::PathBuf;
use clap::{Parser, Subcommand};
use folio::cli;
use folio::config::{AppConfig, FlatConfig};

#[derive(Parser, Debug)]
#[command(name = "folio", about = "Content management for a portfolio website", version)]
struct Args {
    #[command(flatten)]
    config: FlatConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the API server
    Serve,
    /// Insert starter content sections (one-shot, skips existing ones)
    Seed,
    /// Upload a file through the API, resolving duplicates interactively
    Upload {
        path: PathBuf,
        #[arg(long, help = "Display name stored instead of the filename")]
        name: Option<String>,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a set of media ids in one batch
    Delete {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },
    /// Reconcile the upload directory with the catalog
    Sync,
    /// List stored media, newest first
    List {
        #[arg(long, default_value_t = 10)]
        page_size: usize,
        #[arg(long, default_value_t = 0)]
        page_index: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = AppConfig::try_from(args.config)?;

    match args.command {
        Command::Serve => cli::serve(config).await,
        Command::Seed => cli::seed(config).await,
        Command::Upload { path, name, alt, description } => {
            cli::upload(config, path, name, alt, description).await
        }
        Command::Delete { ids } => cli::delete(config, ids).await,
        Command::Sync => cli::sync(config).await,
        Command::List { page_size, page_index } => cli::list(config, page_size, page_index).await,
    }
}
