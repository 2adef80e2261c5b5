//! Timeout Guard
//!
//! Races one attempt of a task against its deadline.

use super::model::Task;
use crate::error::TaskFailure;
use serde_json::Value;

/// Run one attempt, failing with [`TaskFailure::Timeout`] if it does not
/// settle in time.
///
/// The executor closure is called inside its own Tokio task, so a panic
/// while building the future or while polling it lands in the join handle.
/// On timeout the handle is dropped, which detaches the task: the work
/// carries on, we just stop waiting.
pub async fn run_guarded(task: &Task) -> Result<Value, TaskFailure> {
    let handle = tokio::spawn(task.invoke());

    match tokio::time::timeout(task.timeout, handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(error))) => Err(TaskFailure::Execution {
            message: error.to_string(),
        }),
        Ok(Err(join_error)) => {
            let message = if join_error.is_panic() {
                "executor panicked".to_string()
            } else {
                join_error.to_string()
            };
            Err(TaskFailure::Execution { message })
        }
        Err(_) => {
            tracing::debug!(task_id = %task.id, timeout = ?task.timeout, "Attempt timed out");
            Err(TaskFailure::Timeout {
                timeout_ms: u64::try_from(task.timeout.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::model::TaskSpec;
    use crate::error::BoxError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn task(spec: TaskSpec, timeout_ms: u64) -> Task {
        Task::from_spec(spec.with_timeout(Duration::from_millis(timeout_ms)), Duration::ZERO, 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let spec = TaskSpec::new("ok", || async { Ok::<_, BoxError>("done") });
        assert_eq!(run_guarded(&task(spec, 100)).await, Ok(Value::from("done")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_becomes_execution_failure() {
        let spec = TaskSpec::new("bad", || async { Err::<(), _>("template missing") });
        assert_eq!(
            run_guarded(&task(spec, 100)).await,
            Err(TaskFailure::Execution {
                message: "template missing".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_executor_times_out_and_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let spec = TaskSpec::new("slow", move || {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_millis(2000)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, BoxError>(())
            }
        });

        let started = tokio::time::Instant::now();
        let outcome = run_guarded(&task(spec, 100)).await;
        assert_eq!(outcome, Err(TaskFailure::Timeout { timeout_ms: 100 }));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_captured() {
        let spec = TaskSpec::new("panics", || async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, BoxError>(())
        });
        let outcome = run_guarded(&task(spec, 100)).await;
        assert!(matches!(outcome, Err(TaskFailure::Execution { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_before_future_is_captured() {
        let spec = TaskSpec::new("eager-panic", || {
            let outputs: Vec<u32> = Vec::new();
            let missing = outputs[3];
            async move { Ok::<_, BoxError>(missing) }
        });
        let outcome = run_guarded(&task(spec, 100)).await;
        assert!(matches!(outcome, Err(TaskFailure::Execution { .. })));
    }
}
