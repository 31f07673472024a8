//! CLI command implementations

use crate::output::{format_event, format_output};
use anyhow::Context;
use prefill_core::{
    Binder, ChannelSink, EventStatus, ForcerConfig, MediaStateReader, SimulatedSource,
    StepPlanner, StopReason,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{info, warn};

/// Arguments of `prefill simulate`
pub struct SimulateArgs {
    pub duration: f64,
    pub rate: f64,
    pub lookahead: f64,
    pub quality: Option<String>,
    pub quality_switch_at: Option<f64>,
    pub switch_to: String,
    pub config: Option<PathBuf>,
    pub timeout: u64,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ForcerConfig> {
    match path {
        Some(path) => ForcerConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ForcerConfig::default()),
    }
}

/// Bind a simulated source and print events until the session ends
pub async fn simulate(args: SimulateArgs, format: &str) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref())?;

    let mut source = SimulatedSource::new(args.duration)
        .with_fetch_rate(args.rate)
        .with_lookahead(args.lookahead);
    if let Some(quality) = args.quality {
        source = source.with_quality(quality);
    }
    let source = Arc::new(source);

    let (sink, mut rx) = ChannelSink::new(1024);
    let mut binder = Binder::new(config, Arc::new(sink))?;
    let session_id = binder.on_source_available(source.clone()).await?;
    info!(session_id = %session_id, duration = args.duration, "Simulation started");

    if let Some(at) = args.quality_switch_at {
        let switcher = source.clone();
        let label = args.switch_to.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs_f64(at.max(0.0))).await;
            switcher.switch_quality(label);
        });
    }

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    let mut final_reason = None;

    loop {
        match timeout_at(deadline, rx.recv()).await {
            Ok(Some(record)) => {
                println!("{}", format_event(&record, format));
                let event = &record.event;
                if event.status == EventStatus::Complete
                    && event.reason != Some(StopReason::QualityRestart)
                {
                    final_reason = event.reason;
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => {
                warn!(timeout = args.timeout, "Simulation timed out");
                break;
            }
        }
    }

    binder.on_source_removed().await;

    if format != "json" {
        println!("\nBuffered to: {:.1}s of {:.1}s", source.buffered_end(), args.duration);
        println!("Seeks issued: {}", source.seeks().len());
        match final_reason {
            Some(reason) => println!("Result: {}", reason),
            None => println!("Result: timed out"),
        }
    }

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanReport {
    duration: f64,
    short_form: bool,
    base_step: f64,
    throughput_factor: f64,
    multiplier: f64,
    step: f64,
}

/// Show the step the planner would take
pub async fn plan(
    duration: f64,
    throughput: f64,
    multiplier: f64,
    short: bool,
    format: &str,
) -> anyhow::Result<()> {
    let config = ForcerConfig::default();
    let planner = StepPlanner::new(&config);
    let reader = MediaStateReader::new(config.completion_epsilon_seconds);
    let mut source = SimulatedSource::new(duration);
    if short {
        source = source.with_short_form(true);
    }
    let short_form = reader
        .is_short_form(&source, duration, config.short_form_threshold_seconds)
        .await;

    let report = PlanReport {
        duration,
        short_form,
        base_step: StepPlanner::base_step(duration),
        throughput_factor: StepPlanner::throughput_factor(throughput),
        multiplier,
        step: planner.step(duration, short_form, throughput, multiplier),
    };

    if format == "json" {
        println!("{}", format_output(&report, format));
        return Ok(());
    }

    println!("Step Plan:");
    println!("  Duration: {:.1}s", report.duration);
    println!("  Short-form: {}", report.short_form);
    println!("  Base step: {:.1}s", report.base_step);
    println!("  Throughput factor: {:.1}", report.throughput_factor);
    println!("  Multiplier: {:.1}", report.multiplier);
    println!("  Step: {:.1}s", report.step);
    Ok(())
}

/// Print the default configuration
pub fn show_config(format: &str) -> anyhow::Result<()> {
    let config = ForcerConfig::default();
    if format == "json" {
        println!("{}", format_output(&config, format));
    } else {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}
