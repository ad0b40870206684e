// src/main.rs - Command line front end of the reconciliation engine
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use reconcile_lib::models::stats_models::ReconciliationStats;
use reconcile_lib::utils::env::load_env;
use reconcile_lib::utils::progress_bars::village_progress::{ProgressOptions, VillageProgress};
use reconcile_lib::{
    score, InMemoryMatchStore, MatchAlgorithm, MatchResult, Parcel, ReconcileConfig, ReconciliationManager,
    TextRecord,
};

#[derive(Parser)]
#[command(name = "land-reconcile", author, version, about = "Match GIS parcels against registry land records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile parcels against text records, village by village
    Run {
        /// JSON array of parcels
        #[arg(long)]
        parcels: PathBuf,

        /// JSON array of text records
        #[arg(long)]
        records: PathBuf,

        /// Village to reconcile; repeat for several. Defaults to every village in the parcel file
        #[arg(long)]
        village: Vec<String>,

        /// Overrides RECONCILE_ALGORITHM
        #[arg(long)]
        algorithm: Option<MatchAlgorithm>,

        /// Overrides RECONCILE_THRESHOLD (0-100)
        #[arg(long)]
        threshold: Option<f64>,

        /// Where to write the suggestions as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// No progress bar, regardless of RECONCILE_PROGRESS
        #[arg(long)]
        quiet: bool,
    },
    /// Score a single parcel/record pair and print the per-field breakdown
    Score {
        /// JSON object of one parcel
        #[arg(long)]
        parcel: PathBuf,

        /// JSON object of one text record
        #[arg(long)]
        record: PathBuf,

        #[arg(long, default_value = "combined")]
        algorithm: MatchAlgorithm,
    },
    /// List the supported matching algorithms
    Algorithms,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    load_env();

    match Cli::parse().command {
        Command::Run {
            parcels,
            records,
            village,
            algorithm,
            threshold,
            output,
            quiet,
        } => {
            let progress = if quiet {
                ProgressOptions::quiet()
            } else {
                ProgressOptions::from_env()
            };
            run(&parcels, &records, village, algorithm, threshold, output.as_deref(), progress)
        }
        Command::Score {
            parcel,
            record,
            algorithm,
        } => score_pair(&parcel, &record, algorithm),
        Command::Algorithms => {
            for algorithm in MatchAlgorithm::SUPPORTED {
                println!("{:<14} {}", algorithm.as_str(), algorithm.description());
            }
            Ok(())
        }
    }
}

fn run(
    parcels_path: &Path,
    records_path: &Path,
    villages: Vec<String>,
    algorithm: Option<MatchAlgorithm>,
    threshold: Option<f64>,
    output: Option<&Path>,
    progress_options: ProgressOptions,
) -> Result<()> {
    let start_time = Instant::now();
    info!("Starting land record reconciliation");

    let mut config = ReconcileConfig::from_env();
    if let Some(algorithm) = algorithm {
        config = config.with_algorithm(algorithm);
    }
    if let Some(threshold) = threshold {
        config = config.with_threshold(threshold);
    }
    config.log_config();

    let parcels: Vec<Parcel> = read_json(parcels_path).context("Failed to load parcels")?;
    let records: Vec<TextRecord> = read_json(records_path).context("Failed to load text records")?;
    info!("Loaded {} parcels and {} text records", parcels.len(), records.len());

    let villages: Vec<String> = if villages.is_empty() {
        parcels
            .iter()
            .map(|p| p.village_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        villages
    };

    let mut progress = VillageProgress::start(progress_options, villages.len());

    let store = Arc::new(InMemoryMatchStore::new());
    let manager = ReconciliationManager::new(store, config).context("Failed to set up reconciliation")?;

    let mut all_results: Vec<MatchResult> = Vec::new();
    for village_id in &villages {
        progress.begin_village(village_id);
        match manager.run_village(village_id, &parcels, &records, None, None, None) {
            Ok(outcome) => {
                println!(
                    "{}: {} suggestions ({} primary) from {} candidate pairs",
                    village_id,
                    outcome.results.len(),
                    outcome.stats.primary_suggestions,
                    outcome.stats.candidate_pairs
                );
                progress.village_done(outcome.results.len());
                all_results.extend(outcome.results);
            }
            Err(e) => {
                // Villages are independent; keep going.
                warn!("{:#}", e);
                progress.village_failed();
            }
        }
    }
    progress.finish();
    let failed = progress.failed();

    let summary = ReconciliationStats::from_results(&all_results);
    println!(
        "Total: {} suggestions, {} high / {} medium / {} low confidence, average {:.2}",
        summary.total_matches,
        summary.by_confidence.get("high").copied().unwrap_or(0),
        summary.by_confidence.get("medium").copied().unwrap_or(0),
        summary.by_confidence.get("low").copied().unwrap_or(0),
        summary.average_score
    );

    if let Some(path) = output {
        write_json(path, &all_results)?;
        info!("Wrote {} suggestions to {}", all_results.len(), path.display());
    }

    info!(
        "Reconciled {} villages ({} failed) in {:.2?}",
        villages.len(),
        failed,
        start_time.elapsed()
    );
    if failed > 0 {
        anyhow::bail!("{} of {} villages failed", failed, villages.len());
    }
    Ok(())
}

fn score_pair(parcel_path: &Path, record_path: &Path, algorithm: MatchAlgorithm) -> Result<()> {
    let config = ReconcileConfig::from_env();
    config.validate().context("Invalid reconciliation configuration")?;

    let parcel: Parcel = read_json(parcel_path).context("Failed to load parcel")?;
    let record: TextRecord = read_json(record_path).context("Failed to load text record")?;

    let pair_score = score(&parcel, &record, algorithm, &config);
    println!(
        "{} <-> {} using {}: confidence {:.1} ({:?})",
        parcel.id,
        record.id,
        algorithm,
        pair_score.confidence,
        pair_score.confidence_level()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&pair_score.scores).context("Failed to render scores")?
    );
    Ok(())
}
