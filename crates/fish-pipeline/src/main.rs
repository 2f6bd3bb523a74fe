//! `fish-assistant`: run the pipeline from a terminal.
//!
//! Each line read from stdin is submitted as a transcript. Detected intents
//! and speech requests are printed to stdout.

use fish_events::{topics, BusError, Contract, Intent, SpeechRequest};
use fish_nlu::RulesClassifier;
use fish_pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineResult};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> PipelineResult<()> {
    let config = PipelineConfig::from_env()?;
    init_logging(&config)?;

    let pipeline = Pipeline::start(config, Arc::new(RulesClassifier::new()), None).await?;
    attach_printers(&pipeline).await;

    info!("fish-assistant ready, type a phrase and press enter");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = pipeline.submit_text(line).await {
            warn!(error = %e, "failed to submit transcript");
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}

fn init_logging(config: &PipelineConfig) -> PipelineResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| PipelineError::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| PipelineError::Logging(e.to_string()))
}

async fn attach_printers(pipeline: &Pipeline) {
    let bus = pipeline.bus();

    bus.subscribe_fn(topics::NLU_INTENT, "cli.intent", |payload| async move {
        let intent = Intent::from_payload(&payload)?;
        if !intent.is_reset() {
            println!("[intent] {} ({:.2})", intent.intent, intent.confidence);
        }
        Ok::<_, BusError>(())
    })
    .await;

    bus.subscribe_fn(topics::TTS_REQUEST, "cli.speech", |payload| async move {
        let speech = SpeechRequest::from_payload(&payload)?;
        println!("[say] {}", speech.text);
        Ok::<_, BusError>(())
    })
    .await;
}
