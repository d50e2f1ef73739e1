use clap::Parser;
use loctext::store::{self, Document};
use loctext::Config;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Instant;
use anyhow::{Context, Result};

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Load JSONL documents ({\"id\", \"source\"} per line) into the configured store")]
struct Args {
    /// JSONL file to import
    input: PathBuf,

    /// Config file (defaults to $LOCTEXT_CONFIG or ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ImportLine {
    id: String,
    source: Document,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
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

    let store = store::open(&config.store).await?;
    log::info!(
        "Importing {} into {:?} store ({}/{})",
        args.input.display(),
        config.store.backend,
        config.store.collection,
        config.store.document_type
    );

    let file = std::fs::File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let start = Instant::now();
    let mut imported = 0usize;
    let mut errors = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let entry: ImportLine = match serde_json::from_str(&line) {
            Ok(entry) => entry,
            Err(e) => {
                log::error!("Line {}: invalid document: {}", line_no + 1, e);
                errors += 1;
                continue;
            }
        };

        if let Err(e) = store.index(&entry.id, &entry.source, None).await {
            log::error!("Line {}: failed to store {} ({}): {}", line_no + 1, entry.id, e.kind(), e);
            errors += 1;
            continue;
        }
        imported += 1;
    }

    println!(
        "Imported {} documents in {:.2}s ({} errors)",
        imported,
        start.elapsed().as_secs_f64(),
        errors
    );

    Ok(())
}
