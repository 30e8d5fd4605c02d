mod config;
mod llm;
mod markdown;
mod pipeline;
mod provider;
mod search;
mod tavily;
mod tools;

pub const USER_AGENT: &str = concat!("sieve/", env!("CARGO_PKG_VERSION"), " (MCP Server)");

use rmcp::{ServiceExt, transport::stdio};
use tools::Sieve;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sieve=info".parse()?),
        )
        .init();

    info!("starting sieve MCP server");

    let service = Sieve::new()?
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("failed to start server: {e}"))?;

    service.waiting().await?;
    info!("server stopped");
    Ok(())
}
