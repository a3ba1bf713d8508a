use std::sync::Arc;

use anyhow::Result;
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use tollway_core::server;
use tollway_core::storage::Storage;

#[actix_web::main]
async fn main() -> Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let data_dir = std::env::var("TOLLWAY_DATA_DIR").unwrap_or_else(|_| ".".to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3000);

    let storage = Arc::new(Storage::init(&data_dir)?);
    info!("toll registry opened in {}", data_dir);
    server::run(storage, "0.0.0.0", port).await?;
    Ok(())
}
