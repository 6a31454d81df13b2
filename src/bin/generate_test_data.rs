use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use etl_redact::config::LogFormat;
use etl_redact::logging::init_logging;
use etl_redact::testdata::{PurchaseGenerator, FILES, RECORDS_PER_FILE};

/// Writes dataset_<n>.csv files of random purchase records
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Number of files to write
    #[arg(long, default_value_t = FILES)]
    files: usize,

    /// Data rows per file
    #[arg(long, default_value_t = RECORDS_PER_FILE)]
    records: usize,

    /// Directory the files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LogFormat::Text)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut generator = PurchaseGenerator::new(rand::rng(), Utc::now().timestamp_millis());
    let paths = generator.write_files(&args.out_dir, args.files, args.records)?;

    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}
