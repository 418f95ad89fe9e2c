//! Tracks webhook processing tasks spawned after the ingress ack, so shutdown
//! can drain them and tests can wait for them.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Default)]
pub struct TaskTracker {
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    idle: Arc<Notify>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` under `name`; the entry removes itself on completion.
    /// A second task with the same name runs alongside the first under a
    /// suffixed name rather than replacing it.
    pub async fn spawn<F>(&self, name: String, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tasks = self.tasks.clone();
        let idle = self.idle.clone();

        // Insert before the task can finish and try to remove itself.
        let mut guard = self.tasks.lock().await;
        let mut key = name;
        while guard.contains_key(&key) {
            key.push('+');
        }
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            future.await;
            let mut tasks = tasks.lock().await;
            tasks.remove(&task_key);
            debug!("task '{}' finished", task_key);
            if tasks.is_empty() {
                idle.notify_waiters();
            }
        });
        guard.insert(key, handle);
    }

    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Wait until no task is running. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                if self.tasks.lock().await.is_empty() {
                    return;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_ok() {
            true
        } else {
            warn!(
                "{} task(s) still running after {:?}",
                self.in_flight().await,
                timeout
            );
            false
        }
    }

    pub async fn cancel_all(&self) {
        let tasks: HashMap<String, JoinHandle<()>> = {
            let mut guard = self.tasks.lock().await;
            guard.drain().collect()
        };
        let count = tasks.len();
        for (name, handle) in tasks {
            handle.abort();
            debug!("cancelled task '{}'", name);
        }
        if count > 0 {
            info!("cancelled {} in-flight task(s)", count);
        }
        self.idle.notify_waiters();
    }
}
