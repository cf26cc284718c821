//! Uploads PDF/TXT files through the BFF and follows ingestion progress.
//!
//! Usage: `docsmind-upload [--url http://127.0.0.1:8080] [--namespace NS] FILE...`

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use docsmind::upload::{UploadClient, UploadOutcome};

struct Args {
    url: String,
    namespace: Option<String>,
    files: Vec<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        url: std::env::var("BFF_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
        namespace: None,
        files: Vec::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--url" => parsed.url = args.next().ok_or("--url needs a value")?,
            "--namespace" => parsed.namespace = Some(args.next().ok_or("--namespace needs a value")?),
            _ => parsed.files.push(PathBuf::from(arg)),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut client = UploadClient::new(reqwest::Client::new(), args.url);
    if let Some(namespace) = args.namespace {
        client = client.with_namespace(namespace);
    }

    let result = client
        .upload(&args.files, |event, percent| {
            tracing::info!("{} [{}/{}] {percent}%", event.display_filename(), event.chunks_upserted, event.total_chunks);
        })
        .await;

    match result {
        Ok(UploadOutcome::Complete) => {
            tracing::info!("Files uploaded successfully");
            ExitCode::SUCCESS
        }
        Ok(UploadOutcome::Failed(error)) => {
            tracing::error!("Upload failed: {error}");
            ExitCode::FAILURE
        }
        Ok(UploadOutcome::Incomplete) => {
            tracing::error!("Upload stream ended before ingestion completed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("Error uploading files: {e}");
            ExitCode::FAILURE
        }
    }
}
