use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use event_harvester::catalog::Catalog;
use event_harvester::config::Config;
use event_harvester::domain::{SourceContext, SourceType};
use event_harvester::logging;
use event_harvester::pipeline::Pipeline;
use event_harvester::pipeline::processing::segment;
use event_harvester::ports::CatalogSink;
use event_harvester::storage::{self, JsonFileSink};

#[derive(Parser)]
#[command(name = "event_harvester")]
#[command(about = "Event announcement extraction and normalization pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a directory of source files into the event catalog
    Run {
        /// Directory of JSON source files to process
        #[arg(long, default_value = "input")]
        input: PathBuf,
        /// Catalog file to read and update
        #[arg(long, default_value = "output/catalog.json")]
        catalog: PathBuf,
        /// Optional TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Segment a newsletter body and print the fragments found
    Segment {
        /// File containing the newsletter body
        file: PathBuf,
        /// Name used as the fragments' source context
        #[arg(long, default_value = "newsletter")]
        source: String,
        /// Treat the file as plain text instead of HTML
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}

async fn run_pipeline(
    input: PathBuf,
    catalog_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path.as_ref())?;
    let pipeline = Pipeline::new(config)?;

    let fragments = storage::load_fragments_from_dir(&input)?;
    if fragments.is_empty() {
        println!("⚠️  No fragments found in {}", input.display());
        return Ok(());
    }

    let output = pipeline.run(fragments)?;

    let mut catalog = Catalog::from_events(storage::load_catalog(&catalog_path)?);
    let delta = catalog.absorb(output.canonical_events);

    let sink = JsonFileSink::new(catalog_path.clone());
    sink.write_catalog(&catalog.sorted_events(), &output.stats)
        .await?;

    println!("\n📊 Harvest results:");
    println!("   Fragments seen: {}", output.stats.fragments_seen);
    println!("   Candidates assembled: {}", output.stats.candidates_assembled);
    println!("   Skipped: {}", output.stats.candidates_skipped);
    println!("   Extraction anomalies: {}", output.stats.extraction_anomalies);
    println!("   Canonical events this run: {}", output.stats.canonical_events);
    println!(
        "   Catalog: {} added, {} superseded, {} retained ({} total)",
        delta.added,
        delta.superseded,
        delta.retained,
        catalog.len()
    );
    println!("   Output file: {}", catalog_path.display());
    Ok(())
}

fn segment_file(
    file: PathBuf,
    source: String,
    plain: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = std::fs::read_to_string(&file)?;
    let context = SourceContext {
        source_id: source.clone(),
        source_name: source,
        source_url: file.display().to_string(),
        source_type: SourceType::Newsletter,
        fetched_at: chrono::Utc::now(),
    };

    let fragments = if plain {
        segment::segment_plain_text(&body, &context)
    } else {
        segment::segment_html(&body, &context)
    };

    println!("📰 {} fragment(s) found in {}", fragments.len(), file.display());
    for (i, fragment) in fragments.iter().enumerate() {
        println!("\n--- fragment {} ---", i + 1);
        println!("{}", fragment.html);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            catalog,
            config,
        } => {
            println!("🔄 Running harvest pipeline...");
            info!(input = %input.display(), catalog = %catalog.display(), "starting run");
            run_pipeline(input, catalog, config).await
        }
        Commands::Segment {
            file,
            source,
            plain,
        } => segment_file(file, source, plain),
    };

    if let Err(e) = &result {
        error!("run failed: {}", e);
        println!("❌ {}", e);
    }
    result
}
