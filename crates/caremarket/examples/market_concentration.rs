//! Example: market shares and HHI from a county enrollment file.
//!
//! Usage:
//!   cargo run --example market_concentration -- <enrollment.csv> [config.json]
//!
//! Set `RUST_LOG=debug` to see row counts for every stage.

use std::env;
use std::path::Path;

use caremarket::{AnalysisConfig, Analyzer};

fn main() -> caremarket::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run --example market_concentration -- <enrollment.csv> [config.json]");
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    if !path.exists() {
        eprintln!("Error: File not found: {}", path.display());
        std::process::exit(1);
    }

    let config = match args.get(2) {
        Some(config_path) => AnalysisConfig::from_json_file(config_path)?,
        None => AnalysisConfig::default(),
    };
    let analyzer = Analyzer::with_config(config);

    let (enrollment, source) = analyzer.load(path)?;
    println!("{} ({} rows, {})", source.file, source.row_count, source.hash);

    let report = analyzer.market(&enrollment)?;

    let separator = "=".repeat(72);
    println!("{}", separator);
    println!(
        "{:<10} {:>10}  {:<24} {:<40}",
        "Market", "HHI", "Concentration", "Leader"
    );
    println!("{}", separator);
    for leader in &report.leaders {
        println!(
            "{:<10} {:>10.1}  {:<24} {} ({:.1}%)",
            leader.market.to_string(),
            leader.hhi,
            leader.band.to_string(),
            leader.firm,
            leader.share * 100.0
        );
    }
    println!();
    println!("Provenance: {}", report.hhi.provenance().describe());

    Ok(())
}
