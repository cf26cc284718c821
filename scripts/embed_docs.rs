//! Embeds the document at `PDF_PATH` into the configured Pinecone index.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use docsmind::Config;
use docsmind::config::ConfigError;
use docsmind::ingest::Ingestor;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(stored) => {
            tracing::info!("Stored {stored} chunks");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Init client script failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<usize, Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let path = PathBuf::from(config.pdf_path.as_deref().ok_or(ConfigError::Missing("PDF_PATH"))?);

    let ingestor = Ingestor::from_config(reqwest::Client::new(), &config)?;
    let stored = ingestor
        .run(&path, |event| {
            tracing::info!(
                "{}: {}/{} chunks ({}%)",
                event.display_filename(),
                event.chunks_upserted,
                event.total_chunks,
                event.percent()
            );
        })
        .await?;
    Ok(stored)
}
