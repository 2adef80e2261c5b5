//! taskslot demo runner
//!
//! Loads configuration, submits a batch of synthetic jobs and prints the
//! ledger statistics and completion estimates as JSON.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskslot::config::AppConfig;
use taskslot::{BoxError, Priority, TaskScheduler, TaskSpec};

#[tokio::main]
async fn main() -> taskslot::Result<()> {
    let config = AppConfig::load()?;
    taskslot::logging::init_logging(&config.logging.to_logging_config());

    tracing::info!(
        max_concurrent = config.scheduler.max_concurrent,
        "Starting taskslot demo"
    );
    let scheduler = TaskScheduler::new(config.scheduler.clone())?;

    let priorities = [Priority::Low, Priority::Normal, Priority::High, Priority::Urgent];
    let specs = (0..8u64).map(|i| {
        let priority = priorities[(i % 4) as usize];
        TaskSpec::new(format!("render-{i}"), move || async move {
            tokio::time::sleep(Duration::from_millis(50 + i * 10)).await;
            Ok::<_, BoxError>(format!("rendered file {i}"))
        })
        .with_priority(priority)
        .with_metadata("kind", "render")
    });
    scheduler.add_batch(specs).await?;

    // Fails twice before succeeding, to exercise the backoff path
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let flaky = scheduler
        .add(
            TaskSpec::new("flaky-write", move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err::<&str, BoxError>("disk busy".into())
                    } else {
                        Ok("written")
                    }
                }
            })
            .with_retries(3),
        )
        .await?;

    let mut eta_history = Vec::new();
    eta_history.extend(scheduler.estimated_completion());

    let settled = scheduler.wait_for(flaky, Some(Duration::from_secs(60))).await?;
    tracing::info!(
        status = %settled.status,
        retries = settled.retry_count,
        took = %settled.duration_str(),
        "Flaky task settled"
    );
    if let Some(eta) = scheduler.estimated_completion() {
        tracing::info!(eta_ms = eta.eta.as_millis() as u64, "Remaining estimate");
        eta_history.push(eta);
    }

    scheduler.wait_all(Some(Duration::from_secs(60))).await?;

    let report = serde_json::json!({
        "stats": scheduler.statistics(),
        "eta_history": eta_history,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to serialize report: {}", e),
    }

    scheduler.stop();
    Ok(())
}
