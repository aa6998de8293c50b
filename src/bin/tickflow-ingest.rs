use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;

use tickflow::config::Config;
use tickflow::instrument::InstrumentCode;
use tickflow::source::{DelimitedFileSource, IngestWorker};
use tickflow::tick_store::TickStore;

#[derive(Debug, Default)]
struct IngestArgs {
    instrument: Option<String>,
    source: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<IngestArgs> {
    let mut out = IngestArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--instrument" => {
                out.instrument = Some(args.next().context("--instrument requires a value")?);
            }
            "--source" => {
                out.source = Some(args.next().context("--source requires a value")?.into());
            }
            other => bail!("unexpected argument '{}'", other),
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load config")?;
    let args = parse_args(std::env::args().skip(1))?;
    let instrument = match args.instrument.as_deref() {
        Some(raw) => InstrumentCode::parse(raw)?,
        None => config.instrument()?,
    };

    let log_file = std::fs::File::create("tickflow-ingest.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(&config.logging.level)
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    let source_path = args.source.unwrap_or_else(|| config.source.path.clone());
    tracing::info!(
        instrument = %instrument,
        source = %source_path.display(),
        store = %config.store.path.display(),
        "Starting ingestion"
    );

    let store = TickStore::open(&config.store.path, config.store.busy_timeout())?;
    let latest = store.latest_sequence_id(&instrument.to_string())?;
    tracing::info!(instrument = %instrument, latest_sequence_id = ?latest, "Tick store ready");
    let worker = IngestWorker::new(DelimitedFileSource::new(source_path), store, instrument);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received");
            let _ = shutdown_tx.send(true);
        }
    });

    let interval = Duration::from_millis(config.source.poll_interval_ms.max(100));
    worker.run(interval, shutdown_rx).await?;
    Ok(())
}
