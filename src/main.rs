mod config;
mod entities;
mod generate;
mod images;
mod mode;
mod orchestrator;
mod retrieval;
mod retry;
mod server;

pub const USER_AGENT: &str = concat!("triage/", env!("CARGO_PKG_VERSION"));

use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use tracing::info;

use config::Config;
use orchestrator::{ChatQuery, Orchestrator};

/// TCP connection establishment timeout, shared by every remote client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "triage", version, about = "Multimodal medical Q&A service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
    },
    /// Answer a single query from the terminal and print the response as JSON.
    Ask {
        /// The question to ask.
        text: String,
        /// Processing mode; `auto` resolves one from the input.
        #[arg(long, default_value = "auto")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("triage=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
    let config = Config::from_env();
    let orchestrator = Orchestrator::from_config(http, &config);

    match cli.command {
        Command::Serve { addr } => {
            info!("starting triage server");
            server::run(&addr, orchestrator).await?;
        }
        Command::Ask { text, mode } => {
            let query = ChatQuery {
                text: Some(text),
                mode: Some(mode),
                image: None,
            };
            let response = orchestrator.handle(query).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
