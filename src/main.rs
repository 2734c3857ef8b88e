//! pdfmerge-bot - Queue PDF documents per user and merge them on request.
//!
//! Reads inbound messages as JSON lines on stdin and writes outbound events as
//! JSON lines on stdout.

use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use pdfmerge::cli::Cli;
use pdfmerge::{
    DispatchStats, Dispatcher, DocumentStore, JsonLinesTransport, MergeBotError, SessionManager,
    Transport, logging,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(stats) => {
            tracing::info!(
                received = stats.received,
                handled = stats.handled,
                rejected = stats.rejected,
                failed = stats.failed,
                panicked = stats.panicked,
                "shutting down"
            );
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<MergeBotError>()
                .map_or(1, MergeBotError::exit_code);
            process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<DispatchStats> {
    let config = cli.to_config()?;
    logging::init(&config);

    tracing::info!(
        version = pdfmerge::VERSION,
        work_dir = %config.work_dir.display(),
        workers = config.workers,
        "{} started",
        pdfmerge::NAME
    );

    let store = DocumentStore::prepare(&config.work_dir)
        .await
        .with_context(|| format!("preparing work directory {}", config.work_dir.display()))?;
    tokio::fs::create_dir_all(&config.outbox_dir)
        .await
        .map_err(MergeBotError::from)
        .with_context(|| format!("creating outbox {}", config.outbox_dir.display()))?;

    let transport: Arc<dyn Transport> = Arc::new(JsonLinesTransport::stdio(&config.outbox_dir));
    let manager = Arc::new(SessionManager::new(&config, store, Arc::clone(&transport)));

    let stats = Dispatcher::new(manager, transport)
        .run()
        .await
        .context("reading inbound messages")?;

    Ok(stats)
}
