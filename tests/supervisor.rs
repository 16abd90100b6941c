use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Duration;

use tracing_daily_json::supervisor::{restartable_task, TaskExit};

#[tokio::test]
async fn panicking_task_is_restarted() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let exit = restartable_task(
        "panicky",
        move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first attempt blows up");
                }
                Ok::<(), String>(())
            }
        },
        Duration::from_millis(5),
    )
    .await;

    assert_eq!(exit, TaskExit::Finished);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
