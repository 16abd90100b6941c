//! Restartable background tasks.
//!
//! Long-running loops (pollers, cleanup jobs) are registered by name and
//! run under a supervisor that restarts them after an error or panic.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

tokio::task_local! {
    static SUPERVISED_TASK: String;
}

/// Name of the supervised task whose attempt is running on this thread.
///
/// Available from inside the attempt, including from a panic hook that
/// fires while it is being polled.
pub fn current_task_name() -> Option<String> {
    SUPERVISED_TASK.try_with(|name| name.clone()).ok()
}

/// Delay before a crashed task is restarted.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(1);

/// How a supervised task ended for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    /// The task returned `Ok(())`; it is not restarted.
    Finished,
    /// The running attempt was cancelled.
    Cancelled,
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `factory()` until it finishes cleanly, restarting it after errors
/// and panics.
///
/// Each attempt runs as its own tokio task so a panic is contained and
/// reported instead of tearing down the supervisor. Dropping the returned
/// future aborts the attempt in flight.
pub async fn restartable_task<F, Fut, E>(name: &str, mut factory: F, restart_delay: Duration) -> TaskExit
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    loop {
        info!(task = name, "starting task");
        let mut attempt = AbortOnDrop(tokio::spawn(SUPERVISED_TASK.scope(name.to_string(), factory())));

        match (&mut attempt.0).await {
            Ok(Ok(())) => {
                warn!(task = name, "task finished normally, not restarting");
                return TaskExit::Finished;
            }
            Ok(Err(e)) => {
                error!(task = name, error = %e, delay = ?restart_delay, "task crashed, restarting");
            }
            Err(join) if join.is_cancelled() => {
                warn!(task = name, "task cancelled, exiting");
                return TaskExit::Cancelled;
            }
            Err(join) => {
                error!(task = name, error = %join, delay = ?restart_delay, "task panicked, restarting");
            }
        }

        sleep(restart_delay).await;
    }
}

type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type TaskFactory = Box<dyn FnMut() -> BoxTaskFuture + Send>;

/// Named task factories that are spawned together under supervisors.
pub struct TaskRegistry {
    tasks: Vec<(String, TaskFactory)>,
    restart_delay: Duration,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RESTART_DELAY)
    }
}

impl TaskRegistry {
    pub fn new(restart_delay: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            restart_delay,
        }
    }

    /// Register a task. `factory` is called once per (re)start.
    pub fn register<F, Fut, E>(&mut self, name: impl Into<String>, mut factory: F) -> &mut Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        let boxed: TaskFactory = Box::new(move || -> BoxTaskFuture {
            let fut = factory();
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
        });
        info!(task = %name, "registered restartable task");
        self.tasks.push((name, boxed));
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn every registered task under its own supervisor.
    pub fn spawn_all(self) -> Vec<JoinHandle<TaskExit>> {
        let delay = self.restart_delay;
        self.tasks
            .into_iter()
            .map(|(name, factory)| {
                tokio::spawn(async move { restartable_task(&name, factory, delay).await })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn restarts_after_errors_until_success() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let exit = restartable_task(
            "flaky",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("not yet")
                    } else {
                        Ok(())
                    }
                }
            },
            Duration::from_millis(5),
        )
        .await;

        assert_eq!(exit, TaskExit::Finished);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_know_their_task_name() {
        assert_eq!(current_task_name(), None);
        let seen = Arc::new(std::sync::Mutex::new(None));
        let slot = Arc::clone(&seen);

        let exit = restartable_task(
            "named",
            move || {
                let slot = Arc::clone(&slot);
                async move {
                    *slot.lock().unwrap() = current_task_name();
                    Ok::<(), String>(())
                }
            },
            Duration::from_millis(5),
        )
        .await;

        assert_eq!(exit, TaskExit::Finished);
        assert_eq!(seen.lock().unwrap().as_deref(), Some("named"));
    }

    #[tokio::test]
    async fn registry_spawns_every_task() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new(Duration::from_millis(5));
        for name in ["cleanup", "poller"] {
            let runs = Arc::clone(&runs);
            registry.register(name, move || {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                }
            });
        }
        assert_eq!(registry.len(), 2);

        for handle in registry.spawn_all() {
            assert_eq!(handle.await.unwrap(), TaskExit::Finished);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn aborting_the_supervisor_aborts_the_attempt() {
        let started = Arc::new(tokio::sync::Notify::new());
        let signal = Arc::clone(&started);
        let supervisor = tokio::spawn(async move {
            restartable_task(
                "forever",
                move || {
                    let signal = Arc::clone(&signal);
                    async move {
                        signal.notify_one();
                        std::future::pending::<()>().await;
                        Ok::<(), String>(())
                    }
                },
                Duration::from_millis(5),
            )
            .await
        });

        started.notified().await;
        supervisor.abort();
        assert!(supervisor.await.unwrap_err().is_cancelled());
    }
}
