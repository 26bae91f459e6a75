//! Demo driver for the modalmux scheduler.
//!
//! Registers one stub worker per class (plus an optional general-purpose
//! worker), submits a mixed batch at mixed priorities, waits for every
//! completion handler to fire, prints a stats snapshot and shuts down.

mod workers;

use clap::Parser;
use modalmux_core::{ImageRequest, LmRequest, TaskClass, TaskPayload, TaskPriority, TtsRequest};
use modalmux_scheduler::{Scheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use workers::{StubImageWorker, StubLmWorker, StubTtsWorker};

/// Modalmux demo: run stub inference traffic through the scheduler.
#[derive(Parser, Debug)]
#[command(name = "modalmux", about = "Demo driver for the modalmux scheduler")]
struct Args {
    /// Number of LM tasks to submit
    #[arg(long, default_value = "4")]
    lm_tasks: usize,

    /// Number of TTS tasks to submit
    #[arg(long, default_value = "3")]
    tts_tasks: usize,

    /// Number of image tasks to submit
    #[arg(long, default_value = "2")]
    image_tasks: usize,

    /// Diffusion steps per image task
    #[arg(long, default_value = "8")]
    image_steps: u32,

    /// Disable the LM-exclusive worker reservation
    #[arg(long)]
    no_lm_reservation: bool,

    /// Shutdown grace period in milliseconds
    #[arg(long, default_value = "2000")]
    grace_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("modalmux=info".parse()?),
        )
        .init();

    let config = SchedulerConfig {
        dedicate_lm_worker: !args.no_lm_reservation,
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(config);

    scheduler
        .register_worker(Arc::new(StubLmWorker::new("gpu-llm-0")))
        .await?;
    scheduler
        .register_worker(Arc::new(StubTtsWorker::new("cpu-tts-0")))
        .await?;
    scheduler
        .register_worker(Arc::new(StubImageWorker::new("gpu-image-0")))
        .await?;
    scheduler.start().await;

    let total = args.lm_tasks + args.tts_tasks + args.image_tasks;
    info!(total, "submitting demo traffic");

    // Handlers report outcomes back over one channel; the demo is done
    // when all of them have fired.
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let priorities = [TaskPriority::High, TaskPriority::Medium, TaskPriority::Low];
    for i in 0..args.lm_tasks {
        let payload = TaskPayload::Lm(LmRequest::new(format!("tell me a story #{i}")));
        let tx = done_tx.clone();
        scheduler
            .submit(
                TaskClass::Lm,
                priorities[i % priorities.len()],
                payload,
                Some(Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                })),
            )
            .await?;
    }
    for i in 0..args.tts_tasks {
        let payload = TaskPayload::Tts(TtsRequest::new(format!("narration line {i}")));
        let tx = done_tx.clone();
        scheduler
            .submit(
                TaskClass::Tts,
                priorities[i % priorities.len()],
                payload,
                Some(Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                })),
            )
            .await?;
    }
    for i in 0..args.image_tasks {
        let mut request = ImageRequest::new(format!("a lighthouse at dusk, variation {i}"));
        request.steps = args.image_steps;
        let tx = done_tx.clone();
        scheduler
            .submit(
                TaskClass::Image,
                TaskPriority::Low,
                TaskPayload::Image(request),
                Some(Box::new(move |outcome| {
                    let _ = tx.send(outcome);
                })),
            )
            .await?;
    }
    drop(done_tx);

    let mut finished = 0usize;
    while let Some(outcome) = done_rx.recv().await {
        finished += 1;
        info!(
            task = %outcome.id,
            status = %outcome.status,
            finished,
            total,
            "task finished"
        );
        if finished == total {
            break;
        }
    }

    let snapshot = scheduler.stats_snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    scheduler
        .shutdown(Some(Duration::from_millis(args.grace_ms)))
        .await;
    Ok(())
}
