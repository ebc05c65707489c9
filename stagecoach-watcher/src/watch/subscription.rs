//! Run update subscription

use std::sync::Arc;

use stagecoach_core::PipelineRun;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, warn};

use crate::repository::RunStore;

const CHANNEL_CAPACITY: usize = 64;

/// A stream of observed runs, fed by a background polling task
///
/// The task ends when the stop signal fires, its sender is dropped, or the
/// subscription itself is dropped.
pub struct Subscription {
    receiver: mpsc::Receiver<PipelineRun>,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn start(
        store: Arc<dyn RunStore>,
        poll_interval: Duration,
        mut stop: watch::Receiver<bool>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                if *stop.borrow() {
                    break;
                }
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = stop.changed() => {
                        // A dropped sender can never signal again.
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }

                let runs = match store.list_runs().await {
                    Ok(runs) => runs,
                    Err(e) => {
                        warn!("Failed to list pipelineruns: {}", e);
                        continue;
                    }
                };

                debug!(count = runs.len(), "observed pipelineruns");
                for run in runs {
                    if sender.send(run).await.is_err() {
                        debug!("subscriber went away");
                        return;
                    }
                }
            }
            debug!("subscription stopped");
        });

        Self { receiver, handle }
    }

    /// Waits for the next observed run; `None` once the subscription has ended
    pub async fn next(&mut self) -> Option<PipelineRun> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunStore, run_with};

    #[tokio::test]
    async fn test_forwards_listed_runs() {
        let store = Arc::new(FakeRunStore::with(vec![
            run_with("run-a", "True", None),
            run_with("run-b", "Unknown", None),
        ]));
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut subscription = Subscription::start(store, Duration::from_millis(10), stop_rx);

        let first = subscription.next().await.unwrap();
        let second = subscription.next().await.unwrap();
        assert_eq!(first.metadata.name.as_deref(), Some("run-a"));
        assert_eq!(second.metadata.name.as_deref(), Some("run-b"));
    }

    #[tokio::test]
    async fn test_stop_ends_subscription() {
        let store = Arc::new(FakeRunStore::with(vec![]));
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut subscription = Subscription::start(store, Duration::from_millis(10), stop_rx);
        stop_tx.send(true).unwrap();

        let next = time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_list_errors_are_not_fatal() {
        let store = Arc::new(FakeRunStore::with(vec![run_with("run-a", "True", None)]));
        store.fail_next_list();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let mut subscription = Subscription::start(store, Duration::from_millis(10), stop_rx);
        let run = time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.metadata.name.as_deref(), Some("run-a"));
    }
}
