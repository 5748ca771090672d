use clap::{Parser, Subcommand};
use medrag::Result;
use medrag::commands::{ask, build_corpus, chat, serve_http, show_status};
use medrag::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medrag")]
#[command(about = "Retrieval-augmented question answering over patient depression-drug reviews")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embedding and completion service settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector index and metadata artifacts from a review corpus
    Build {
        /// Path to the cleaned review corpus (JSON lines)
        input: PathBuf,
    },
    /// Ask a single question against the indexed corpus
    Ask {
        /// The question to answer
        query: String,
        /// Number of reviews to retrieve as context
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Print the retrieved context before the answer
        #[arg(long)]
        show_context: bool,
    },
    /// Start an interactive question-answering session
    Chat,
    /// Start the HTTP recommendation server
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Show detailed status of the retrieval pipeline
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Build { input } => {
            build_corpus(input).await?;
        }
        Commands::Ask {
            query,
            top_k,
            show_context,
        } => {
            ask(query, top_k, show_context).await?;
        }
        Commands::Chat => {
            chat().await?;
        }
        Commands::Serve { port } => {
            serve_http(port).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
