//! Benchmark CLI entry point.
//!
//! Wires the configuration boundary to the pipeline: parses arguments, loads
//! the config file, injects the API key and directory overrides, and runs
//! either the full benchmark loop or the standalone capture mode. All
//! browser work happens in `tp_benchmark_worker` processes spawned per
//! request; this binary never touches Chromium itself.

use clap::Parser;
use rand::Rng;
use std::error::Error;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use tp_benchmark::benchmark::Benchmark;
use tp_benchmark::cli::{CaptureArgs, Cli, Command, RunArgs};
use tp_benchmark::config::Config;
use tp_benchmark::llm::GeminiClient;
use tp_benchmark::models::EvidenceQuery;
use tp_benchmark::outputs::{json, report};
use tp_benchmark::utils::{ensure_writable_dir, evidence_path};
use tp_benchmark::worker::WorkerClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_benchmark(args).await,
        Command::Capture(args) => run_capture(args).await,
    }
}

#[instrument(level = "info", skip_all)]
async fn run_benchmark(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!("benchmark starting up");

    // --- Configuration boundary ---
    let mut config = Config::load(args.config.as_deref())?;
    config.llm.api_key = args.api_key;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(evidence_dir) = args.evidence_dir {
        config.scrape_blob_dir = evidence_dir.join("json");
        config.evidence_dir = evidence_dir;
    }

    for dir in [&config.output_dir, &config.evidence_dir, &config.scrape_blob_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // --- Input sheet ---
    let rows = report::read_companies(&args.input)?;
    if rows.is_empty() {
        warn!(path = %args.input.display(), "Input sheet has no candidate rows");
    }

    // --- Pipeline ---
    let worker = WorkerClient::new(&config)?;
    let classifier = GeminiClient::new(config.llm.clone())?;
    let benchmark = Benchmark::new(
        config.clone(),
        worker,
        classifier,
        args.client_description.clone(),
    );

    let outcomes = benchmark.run(&rows).await;

    // --- Outputs ---
    let report_path = report::write_report(&outcomes, &config.output_dir)?;
    info!(path = %report_path.display(), "Annotated report written");

    let summary = json::RunSummary::new(args.client_description, outcomes);
    if let Err(e) = json::write_summary(&summary, &config.output_dir).await {
        error!(error = %e, "Failed to write run summary");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        total = summary.total,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_capture(args: CaptureArgs) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(evidence_dir) = args.evidence_dir {
        config.evidence_dir = evidence_dir;
    }
    ensure_writable_dir(&config.evidence_dir).await?;

    let worker = WorkerClient::new(&config)?;
    let highlight = args.highlight.unwrap_or_default();
    let total = args.url.len();
    let mut captured = 0usize;

    for (i, url) in args.url.iter().enumerate() {
        let path = evidence_path(&config.evidence_dir, url);
        let query = EvidenceQuery {
            url: url.clone(),
            text: highlight.clone(),
            path: path.to_string_lossy().into_owned(),
        };

        let result = worker.capture(&query).await;
        if result.success {
            captured += 1;
            info!(
                %url,
                path = %path.display(),
                highlighted = result.highlighted,
                "Capture saved"
            );
        } else {
            warn!(%url, "Capture failed");
        }

        // Small human-ish pause between pages; the last one exits directly.
        if i + 1 < total {
            let pause = rand::rng().random_range(1.5..4.0);
            tokio::time::sleep(Duration::from_secs_f64(pause)).await;
        }
    }

    info!(captured, total, "Capture run complete");
    Ok(())
}
