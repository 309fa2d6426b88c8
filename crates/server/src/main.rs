//! Alt-text pipeline event handler.
//!
//! Webhook server that turns blob-created events into multilingual alt-text
//! sidecars.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    server::start_server(config).await?;
    Ok(())
}
