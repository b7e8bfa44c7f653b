use anyhow::Result;
use clap::{Parser, Subcommand};
use dbagent_cli::config;
use dbagent_cli::prompt::{PromptLoader, DEFAULT_PROMPTS_DIR};
use dbagent_cli::session::SessionServices;
use dbagent_cli::transport;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dbagent")]
#[command(author, version, about = "dbagent - chat with your databases through MCP tool servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8765")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory holding system_prompt.txt and the backend prompts
        #[arg(long, default_value = DEFAULT_PROMPTS_DIR)]
        prompts_dir: PathBuf,
    },

    /// Interactive chat session in the terminal
    Chat {
        /// Directory holding system_prompt.txt and the backend prompts
        #[arg(long, default_value = DEFAULT_PROMPTS_DIR)]
        prompts_dir: PathBuf,
    },

    /// List the tools every active MCP server exposes
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "dbagent_cli=debug"
    } else {
        "dbagent_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    config::load_dotenv();

    match cli.command {
        Commands::Serve {
            port,
            host,
            prompts_dir,
        } => {
            tracing::info!("Starting HTTP server on {}:{}", host, port);
            let services = SessionServices::new(PromptLoader::new(prompts_dir));
            transport::http::run_http_server(&host, port, services).await?;
        }
        Commands::Chat { prompts_dir } => {
            let services = SessionServices::new(PromptLoader::new(prompts_dir));
            transport::cli::run_chat(services).await?;
        }
        Commands::Tools => {
            let services = SessionServices::new(PromptLoader::default());
            transport::cli::run_tools(services).await?;
        }
    }

    Ok(())
}
