//! yaml-assist Language Server Protocol binary

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr) // LSP uses stdout for protocol, so log to stderr
        .init();

    tracing::info!("Starting yaml-assist language server");

    yaml_assist::lsp::run_server().await?;

    Ok(())
}
