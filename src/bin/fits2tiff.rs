use anyhow::{Context, Result};
use starfuse::io::config::BandEntry;
use starfuse::{CompositePipeline, PipelineConfig};
use std::env;
use std::path::PathBuf;
use std::process;

fn print_usage(program: &str) {
    eprintln!("Align FITS bands on a common WCS grid and write a 16-bit TIFF");
    eprintln!();
    eprintln!("Usage: {} <pipeline.xml>", program);
    eprintln!("       {} <output.tiff> <band.fits> [<band.fits> ...]", program);
    eprintln!();
    eprintln!("The XML form sets per-band black/white fractions, the reference band,");
    eprintln!("compression and single-band output. The short form stretches every");
    eprintln!("band over its full range onto the grid of the first band.");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("fits2tiff");

    let config = match args.len() {
        2 if args[1].to_lowercase().ends_with(".xml") => PipelineConfig::from_file(&args[1])
            .with_context(|| format!("Failed to load configuration {}", args[1]))?,
        n if n >= 3 => PipelineConfig {
            reference_index: 0,
            output: Some(PathBuf::from(&args[1])),
            output_dir: None,
            separate: false,
            overwrite: false,
            compression: None,
            black: None,
            white: None,
            bands: args[2..]
                .iter()
                .map(|path| BandEntry {
                    path: PathBuf::from(path),
                    name: None,
                    black: None,
                    white: None,
                })
                .collect(),
            base_dir: None,
        },
        _ => {
            print_usage(program);
            return Err(anyhow::anyhow!("Missing required arguments"));
        }
    };

    let output = CompositePipeline::run_config(&config).context("Pipeline failed")?;

    for path in output.written() {
        println!("{}", path.display());
    }

    Ok(())
}
