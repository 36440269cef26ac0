// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use the_fan_in::backends::local::JsonPartitionTransform;
use the_fan_in::backends::memory::InMemoryBroker;
use the_fan_in::config::{load_and_validate_config, Config, RuntimeBuilder};
use the_fan_in::engine::AggregationReport;
use the_fan_in::observability::{component_span, init_logging, LogFormat};
use the_fan_in::traits::Transform;
use tracing::Instrument;

/// Broker-mediated fan-in pipeline.
#[derive(Debug, Parser)]
#[command(name = "the-fan-in")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration (YAML, or TOML by extension).
    #[arg(long, global = true, default_value = "pipeline.yaml")]
    config: PathBuf,

    /// Log output format: pretty or json.
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transform one partition, publish its batch and signal completion.
    Worker {
        /// Worker identity as listed under `workers`.
        #[arg(long)]
        id: String,
    },
    /// Wait for every worker, drain all categories and render the result.
    Aggregate,
    /// Run every worker and the aggregator in this process on an in-memory broker.
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = load_and_validate_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Worker { id } => run_worker(&config, &id).await,
        Command::Aggregate => {
            let report = run_aggregator(RuntimeBuilder::new(&config), shutdown_token()).await?;
            print_report(&report);
            Ok(())
        }
        Command::Demo => run_demo(&config).await,
    }
}

/// Cancelled on Ctrl-C.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping");
            cancel.cancel();
        }
    });
    token
}

async fn run_worker(config: &Config, id: &str) -> Result<()> {
    let runtime = RuntimeBuilder::new(config);
    let (worker, assignment) = runtime.worker(id, Arc::new(JsonPartitionTransform::new()))?;

    let report = worker
        .run(&assignment)
        .instrument(component_span("worker", id))
        .await?;
    println!(
        "{}: published {} records to '{}' in {:?}",
        report.worker_id, report.records, report.queue, report.duration
    );
    Ok(())
}

async fn run_aggregator(
    runtime: RuntimeBuilder<'_>,
    cancel: CancellationToken,
) -> Result<AggregationReport> {
    let runtime = runtime.with_cancellation(cancel);
    let renderer = runtime.histogram_renderer();
    let report = runtime
        .aggregator()
        .run(&renderer)
        .instrument(component_span("aggregator", "aggregator"))
        .await?;
    Ok(report)
}

async fn run_demo(config: &Config) -> Result<()> {
    let broker = InMemoryBroker::new();
    let cancel = shutdown_token();
    let transform: Arc<dyn Transform> = Arc::new(JsonPartitionTransform::new());

    let mut workers = JoinSet::new();
    for worker_config in &config.workers {
        let runtime = RuntimeBuilder::new(config).with_broker(Arc::new(broker.clone()));
        let (worker, assignment) = runtime.worker(&worker_config.id, Arc::clone(&transform))?;
        let span = component_span("worker", &worker_config.id);
        workers.spawn(async move { worker.run(&assignment).instrument(span).await });
    }

    let aggregator_runtime = RuntimeBuilder::new(config).with_broker(Arc::new(broker.clone()));
    let aggregation = run_aggregator(aggregator_runtime, cancel.clone());
    tokio::pin!(aggregation);

    let mut failed = 0;
    let mut remaining = config.workers.len();
    while remaining > 0 {
        tokio::select! {
            report = &mut aggregation => return finish_demo(report),
            joined = workers.join_next() => {
                remaining -= 1;
                match joined {
                    Some(Ok(Ok(report))) => println!(
                        "{}: published {} records to '{}'",
                        report.worker_id, report.records, report.queue
                    ),
                    Some(Ok(Err(err))) => {
                        eprintln!("worker failed: {}", err);
                        failed += 1;
                    }
                    Some(Err(err)) => {
                        eprintln!("worker task aborted: {}", err);
                        failed += 1;
                    }
                    None => remaining = 0,
                }
            }
        }
    }

    if failed > 0 {
        // The barrier can never release with missing workers.
        cancel.cancel();
    }
    let report = aggregation.await;
    if failed > 0 {
        bail!("{} of {} workers failed", failed, config.workers.len());
    }
    finish_demo(report)
}

fn finish_demo(report: Result<AggregationReport>) -> Result<()> {
    let report = report?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &AggregationReport) {
    println!(
        "Barrier released after {:?} ({} workers)",
        report.release.waited,
        report.release.senders.len()
    );
    for (category, batch) in report.result.iter() {
        println!(
            "  {:<24} {:>8} records  total weight {:.3}",
            category,
            batch.len(),
            batch.total_weight()
        );
    }
    println!("Rendered to {}", report.artifact.display());
}
