use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use visa_stats::{write_report, Dimension, Schema, TabulationEngine};

/// Tabulates the top occupations and worksite states of certified visa
/// applications
#[derive(Debug, Parser)]
#[clap(version)]
struct Args {
    /// The path to the semicolon-delimited application data
    input: PathBuf,
    /// Where to write the occupation report
    occupation_output: PathBuf,
    /// Where to write the state report
    state_output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env).init();

    let args = Args::parse();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read the header row of {}", args.input.display()))?;
    let schema = Schema::resolve(headers)?;

    let mut engine = TabulationEngine::new();
    let rows = engine
        .ingest(&mut reader, &schema)
        .with_context(|| format!("failed to ingest {}", args.input.display()))?;
    info!(
        rows,
        occupations = engine.distinct(Dimension::Occupation),
        states = engine.distinct(Dimension::State),
        total_certified = engine.total_certified(),
        "ingest complete"
    );

    // both reports are rendered before either file is created, so a failed
    // run never leaves a half-written report behind
    let reports = [
        (&args.occupation_output, render(&engine, Dimension::Occupation)?),
        (&args.state_output, render(&engine, Dimension::State)?),
    ];
    for (path, report) in reports {
        fs::write(path, report).with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {}", path.display());
    }

    Ok(())
}

fn render(engine: &TabulationEngine, dimension: Dimension) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_report(
        &mut buffer,
        dimension,
        &engine.ranked(dimension),
        engine.total_certified(),
    )
    .with_context(|| format!("failed to render the {} report", dimension.label()))?;
    Ok(buffer)
}
