//! Loan Decision Pipeline - Main Entry Point
//!
//! Answers loan application and history requests over NATS request/reply.
//! Requests are processed in parallel up to the configured worker count.

use anyhow::{Context, Result};
use async_nats::Message;
use futures::StreamExt;
use loan_decision_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{DecisionMetrics, MetricsReporter},
    models::inference::OnnxClassifier,
    pipeline::DecisionPipeline,
    policy::DecisionPolicy,
    producer::ReplyPublisher,
    service,
    store::PredictionStore,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug)]
enum RequestKind {
    Application,
    History,
}

/// Everything a request task needs
struct Shared {
    pipeline: DecisionPipeline,
    publisher: ReplyPublisher,
    history_limit: usize,
    processed: AtomicU64,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("loan_decision_pipeline={}", logging.level).parse()?);

    if logging.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first: it decides the log format
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Loan Decision Pipeline");
    info!(
        "Policy: approve if P(approve) > {:.2}, credit score floor {}, loan/income ceiling {:.2}",
        config.policy.approval_threshold,
        config.policy.min_credit_score,
        config.policy.max_loan_percent_income
    );

    let metrics = Arc::new(DecisionMetrics::new());

    let classifier = OnnxClassifier::load(
        &config.model.path,
        config.model.feature_count,
        config.model.onnx_threads,
    )
    .with_context(|| format!("Failed to load classifier from {}", config.model.path))?;

    let store = PredictionStore::open(
        &config.store.path,
        chrono::Duration::seconds(config.store.dedup_window_secs as i64),
    )
    .with_context(|| format!("Failed to open prediction store at {}", config.store.path))?;
    info!(
        path = %config.store.path,
        records = store.count().unwrap_or(0),
        "Prediction log ready"
    );

    let pipeline = DecisionPipeline::new(
        Arc::new(classifier),
        DecisionPolicy::new(&config.policy),
        Arc::new(store),
        metrics.clone(),
    )?;

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let mut application_consumer =
        RequestConsumer::new(client.clone(), &config.nats.application_subject);
    let mut history_consumer = RequestConsumer::new(client.clone(), &config.nats.history_subject);
    if let Some(group) = &config.nats.queue_group {
        application_consumer = application_consumer.with_queue_group(group);
        history_consumer = history_consumer.with_queue_group(group);
    }
    let publisher = ReplyPublisher::new(client.clone());

    let shared = Arc::new(Shared {
        pipeline,
        publisher: publisher.clone(),
        history_limit: config.store.history_limit,
        processed: AtomicU64::new(0),
    });

    let num_workers = config.pipeline.workers;
    info!(
        "Starting request loop with {} parallel workers",
        num_workers
    );
    info!("Listening for applications on: {}", application_consumer.subject());
    info!("Listening for history queries on: {}", history_consumer.subject());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let applications = application_consumer
        .subscribe()
        .await?
        .map(|message| (RequestKind::Application, message));
    let history = history_consumer
        .subscribe()
        .await?
        .map(|message| (RequestKind::History, message));
    let mut requests = futures::stream::select(applications, history);

    loop {
        let (kind, message) = tokio::select! {
            next = requests.next() => match next {
                Some(request) => request,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let permit = semaphore.clone().acquire_owned().await?;
        let shared = shared.clone();

        tokio::spawn(async move {
            process_request(shared, kind, message).await;
            drop(permit);
        });
    }

    // Wait for in-flight requests
    let _ = semaphore.acquire_many(num_workers as u32).await;
    if let Err(e) = publisher.flush().await {
        warn!(error = %e, "Failed to flush replies");
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}

async fn process_request(shared: Arc<Shared>, kind: RequestKind, message: Message) {
    let reply_to = message.reply.clone();
    let payload = message.payload;

    // Inference and SQLite are blocking
    let worker = shared.clone();
    let reply = tokio::task::spawn_blocking(move || match kind {
        RequestKind::Application => {
            let reply = service::handle_application(&worker.pipeline, &payload);
            serde_json::to_value(reply)
        }
        RequestKind::History => {
            let reply = service::handle_history(
                worker.pipeline.store(),
                &payload,
                worker.history_limit,
            );
            serde_json::to_value(reply)
        }
    })
    .await;

    let reply = match reply {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            error!(kind = ?kind, error = %e, "Failed to serialize reply");
            return;
        }
        Err(e) => {
            error!(kind = ?kind, error = %e, "Request task failed");
            return;
        }
    };

    match reply_to {
        Some(reply_to) => {
            if let Err(e) = shared.publisher.reply(reply_to, &reply).await {
                error!(kind = ?kind, error = %e, "Failed to publish reply");
            }
        }
        None => info!(kind = ?kind, reply = %reply, "Request had no reply subject"),
    }

    let count = shared.processed.fetch_add(1, Ordering::Relaxed) + 1;

    // Log progress every 100 requests
    if count % 100 == 0 {
        let metrics = shared.pipeline.metrics();
        let processing_stats = metrics.get_processing_stats();
        info!(
            processed = count,
            throughput = format!("{:.1} req/s", metrics.get_throughput()),
            approval_rate = format!("{:.1}%", metrics.get_approval_rate()),
            avg_latency_us = processing_stats.mean_us,
            "Processing milestone"
        );
    }
}
