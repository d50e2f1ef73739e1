use clap::Parser;
use loctext::pipeline::{read_ids, run_batch};
use loctext::{Config, Pipeline};
use std::io::Write;
use std::path::PathBuf;
use anyhow::{Context, Result};

#[derive(Parser, Debug)]
#[command(name = "batch")]
#[command(about = "Annotate and merge every document id listed in a file")]
struct Args {
    /// Newline-delimited document ids (defaults to batch.ids_file)
    #[arg(short, long)]
    ids: Option<PathBuf>,

    /// Write the ids that failed here, one per line, for a rerun
    #[arg(short, long)]
    failed_out: Option<PathBuf>,

    /// Documents processed at once (defaults to batch.concurrency)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Config file (defaults to $LOCTEXT_CONFIG or ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => {
            let _ = dotenv::dotenv();
            Config::load_from(path)?
        }
        None => Config::load()?,
    };

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.loctext.log_level)
    ).init();

    if let Some(concurrency) = args.concurrency {
        anyhow::ensure!(concurrency > 0, "--concurrency must be greater than 0");
        config.batch.concurrency = concurrency;
    }

    let ids_path = args.ids.unwrap_or_else(|| config.batch.ids_file.clone());
    let ids = read_ids(&ids_path)?;
    log::info!("Loaded {} ids from {}", ids.len(), ids_path.display());

    // A model that does not load stops the run before any id is touched
    let pipeline = match Pipeline::from_config(&config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            if e.is_fatal() {
                log::error!("Aborting batch ({}): {}", e.kind(), e);
            }
            return Err(e.into());
        }
    };
    log::info!(
        "Write mode: {:?}, concurrency: {}",
        pipeline.write_mode(),
        config.batch.concurrency
    );

    let report = run_batch(&pipeline, &ids, config.batch.concurrency).await;

    if let Some(path) = args.failed_out {
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for failure in &report.failed {
            writeln!(file, "{}", failure.id)?;
        }
        log::info!("Wrote {} failed ids to {}", report.failed.len(), path.display());
    }

    println!(
        "Processed {} ids: {} succeeded, {} failed",
        report.total(),
        report.succeeded.len(),
        report.failed.len()
    );

    Ok(())
}
