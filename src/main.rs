use billing_engine::application::context::RequestContext;
use billing_engine::application::engine::BillingEngine;
use billing_engine::config::Config;
use billing_engine::domain::ports::LoanRepositoryBox;
use billing_engine::infrastructure::clock::SystemClock;
use billing_engine::infrastructure::in_memory::InMemoryLoanRepository;
use billing_engine::interfaces::csv::request_reader::RequestReader;
use billing_engine::interfaces::csv::response_writer::ResponseWriter;
use billing_engine::interfaces::http::LoanHandler;
use billing_engine::{seed, telemetry};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    telemetry::init(&config.log_level);

    let repository = open_repository(&config)?;
    let engine = Arc::new(BillingEngine::new(repository, Box::new(SystemClock)));

    if config.seed_borrowers > 0 {
        let ctx = RequestContext::with_timeout(config.request_timeout());
        let ids = seed::seed_borrowers(&engine, &ctx, config.seed_borrowers)
            .await
            .into_diagnostic()?;
        info!(count = ids.len(), "Seeded borrowers");
    }

    let handler = LoanHandler::new(engine, config.request_timeout());

    let file = File::open(&config.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    let stdout = io::stdout();
    let mut writer = ResponseWriter::new(stdout.lock());
    writer.write_header().into_diagnostic()?;

    for request_result in reader.requests() {
        match request_result {
            Ok(request) => {
                let response = handler.handle(&request).await;
                writer.write_response(&request, &response).into_diagnostic()?;
            }
            Err(e) => {
                error!("Error reading request: {e}");
            }
        }
    }

    writer.flush().into_diagnostic()?;
    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_repository(config: &Config) -> Result<LoanRepositoryBox> {
    use billing_engine::infrastructure::rocksdb::RocksDBLoanRepository;

    match &config.db_path {
        Some(db_path) => {
            info!(path = %db_path.display(), "Using RocksDB storage");
            let repository = RocksDBLoanRepository::open(db_path).into_diagnostic()?;
            Ok(Box::new(repository))
        }
        None => Ok(Box::new(InMemoryLoanRepository::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_repository(config: &Config) -> Result<LoanRepositoryBox> {
    if config.db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Box::new(InMemoryLoanRepository::new()))
}
