use clap::Parser;
use loctext::{Config, Pipeline};
use std::path::PathBuf;
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "loctext")]
#[command(about = "Annotate protein subcellular locations in a text or a stored document")]
struct Args {
    /// Annotate this text and print the records as JSON
    #[arg(short, long, conflicts_with = "id", required_unless_present = "id")]
    text: Option<String>,

    /// Annotate the stored document with this id and merge the records into it
    #[arg(short, long)]
    id: Option<String>,

    /// Config file (defaults to $LOCTEXT_CONFIG or ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let _ = dotenv::dotenv();
            Config::load_from(path)
        }
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    // Initialize logger from RUST_LOG, falling back to the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.loctext.log_level)
    ).init();

    log::info!("Starting LocText v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Pipeline::from_config(&config).await?;

    if let Some(text) = args.text {
        let annotation = pipeline.annotate(&text).await?;
        println!("{}", serde_json::to_string_pretty(&annotation.records.to_fields()?)?);
    } else if let Some(id) = args.id {
        let records = pipeline.process_document(&id).await?;
        println!(
            "Merged {} proteins, {} locations, {} relations into {}",
            records.protein_info.len(),
            records.location_info.len(),
            records.relation_info.len(),
            id
        );
    }

    Ok(())
}
