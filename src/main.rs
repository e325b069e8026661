#![allow(clippy::multiple_crate_versions)]

mod provider;

use agentctl_runtime::api::build_router;
use agentctl_runtime::Config;
use clap::{Parser, Subcommand};

use provider::DefaultApiProvider;

#[derive(Parser)]
#[command(name = "agentctl", version, about = "Control plane for an agent-orchestration platform")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,
    /// Validate configuration and exit.
    Doctor,
}

fn init_tracing(config: &Config) {
    if !config.logging.enable_tracing {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.validate()?;
    init_tracing(&config);

    match cli.command {
        Commands::Serve => {
            let provider = DefaultApiProvider::bootstrap(&config);
            let router = build_router(provider);
            let addr = format!("{}:{}", config.api.host, config.api.port);
            tracing::info!(%addr, "starting agentctl API server");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, router).await?;
        }
        Commands::Doctor => {
            println!("agentctl configuration is valid");
            println!("api: {}:{}", config.api.host, config.api.port);
            println!("sse ring buffer: {}", config.sse.ring_buffer_size);
        }
    }

    Ok(())
}
