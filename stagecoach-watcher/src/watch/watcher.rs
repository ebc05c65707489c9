//! Run watcher
//!
//! Derives each observed run's state and notifies the source host when it
//! differs from the state last reported for that run. The last reported state
//! is kept on the run itself in the notification-state annotation, so a
//! restarted watcher doesn't repeat notifications.

use std::sync::Arc;

use reqwest::Url;
use stagecoach_client::ClientError;
use stagecoach_core::PipelineRun;
use stagecoach_core::domain::run::{
    NOTIFICATION_STATE_ANNOTATION, SOURCE_REF_ANNOTATION, SOURCE_URL_ANNOTATION,
};
use stagecoach_core::domain::state::RunState;
use stagecoach_core::domain::status::StatusInput;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use super::Subscription;
use crate::repository::{RunStore, StatusNotifier};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("pipelinerun {run} has no {annotation} annotation")]
    MissingAnnotation { run: String, annotation: &'static str },

    #[error("failed to parse repository from source URL {url:?}")]
    InvalidSourceUrl { url: String },

    #[error("failed to send status notification: {0}")]
    Notify(#[source] ClientError),

    #[error("status notification timed out after {0:?}")]
    NotifyTimeout(Duration),

    #[error("failed to record notification state: {0}")]
    Update(#[source] ClientError),
}

/// What handling a run update did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The state matched the last one reported
    Unchanged(RunState),
    /// A notification was sent and recorded
    Notified(RunState),
}

pub struct RunWatcher {
    runs: Arc<dyn RunStore>,
    notifier: Arc<dyn StatusNotifier>,
    poll_interval: Duration,
    notify_timeout: Duration,
}

impl RunWatcher {
    pub fn new(
        runs: Arc<dyn RunStore>,
        notifier: Arc<dyn StatusNotifier>,
        poll_interval: Duration,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            runs,
            notifier,
            poll_interval,
            notify_timeout,
        }
    }

    /// Processes run updates one at a time until `stop` fires
    ///
    /// Failures while handling a single update are logged and the loop
    /// continues.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!(
            "Starting run watcher (interval: {:?})",
            self.poll_interval
        );

        let mut subscription =
            Subscription::start(self.runs.clone(), self.poll_interval, stop.clone());

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("Stopping run watcher");
                        return;
                    }
                }
                update = subscription.next() => match update {
                    Some(run) => {
                        let name = run.display_name().to_string();
                        match self.handle_run(run).await {
                            Ok(Outcome::Notified(state)) => {
                                info!(run = %name, state = %state, "reported run state");
                            }
                            Ok(Outcome::Unchanged(_)) => {}
                            Err(e) => error!(run = %name, "Failed to handle run update: {}", e),
                        }
                    }
                    None => {
                        info!("Run subscription ended");
                        return;
                    }
                },
            }
        }
    }

    /// Handles a single observed run
    ///
    /// Safe to call repeatedly with the same run: once a state has been
    /// reported and recorded, further calls are no-ops until it changes. The
    /// record is only written after a successful notification, so a failed
    /// send is retried on the next update.
    pub async fn handle_run(&self, mut run: PipelineRun) -> Result<Outcome, WatchError> {
        let state = RunState::from_run(&run);
        // An unreadable memo counts as nothing reported yet.
        let reported = run
            .annotation(NOTIFICATION_STATE_ANNOTATION)
            .and_then(|memo| memo.parse::<RunState>().ok());
        if reported == Some(state) {
            debug!(run = run.display_name(), state = %state, "state unchanged");
            return Ok(Outcome::Unchanged(state));
        }

        let url = required_annotation(&run, SOURCE_URL_ANNOTATION)?;
        let repo = parse_repo_from_url(url)?;
        let sha = required_annotation(&run, SOURCE_REF_ANNOTATION)?;

        let status = StatusInput::for_state(state);
        match time::timeout(self.notify_timeout, self.notifier.notify(&repo, sha, &status)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(WatchError::Notify(e)),
            Err(_) => return Err(WatchError::NotifyTimeout(self.notify_timeout)),
        }
        debug!(repo = %repo, sha, state = %state, "sent status notification");

        run.set_annotation(NOTIFICATION_STATE_ANNOTATION, state.as_str());
        self.runs.update_run(&run).await.map_err(WatchError::Update)?;

        Ok(Outcome::Notified(state))
    }
}

fn required_annotation<'a>(
    run: &'a PipelineRun,
    annotation: &'static str,
) -> Result<&'a str, WatchError> {
    run.annotation(annotation)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WatchError::MissingAnnotation {
            run: run.display_name().to_string(),
            annotation,
        })
}

/// Extracts `owner/name` from a clone URL
///
/// `https://github.com/Codertocat/Hello-World.git` gives
/// `Codertocat/Hello-World`.
pub fn parse_repo_from_url(url: &str) -> Result<String, WatchError> {
    let invalid = || WatchError::InvalidSourceUrl {
        url: url.to_string(),
    };
    let parsed = Url::parse(url).map_err(|_| invalid())?;
    let mut segments = parsed
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|s| !s.is_empty());

    match (segments.next(), segments.next()) {
        (Some(owner), Some(name)) => {
            let name = name.strip_suffix(".git").unwrap_or(name);
            Ok(format!("{}/{}", owner, name))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNotifier, FakeRunStore, run_with};
    use stagecoach_core::domain::status::CommitState;

    fn watcher(store: Arc<FakeRunStore>, notifier: Arc<FakeNotifier>) -> RunWatcher {
        RunWatcher::new(
            store,
            notifier,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_state_change_is_notified_once() {
        let store = Arc::new(FakeRunStore::with(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let watcher = watcher(store.clone(), notifier.clone());

        let run = run_with("run-a", "True", Some("Pending"));
        let outcome = watcher.handle_run(run).await.unwrap();
        assert_eq!(outcome, Outcome::Notified(RunState::Successful));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "Codertocat/Hello-World");
        assert_eq!(sent[0].1, "6113728f27ae82c7b1a177c8d03f9e96e0adf246");
        assert_eq!(sent[0].2.state, CommitState::Success);
        assert_eq!(sent[0].2.label, "tekton-ci");
        assert_eq!(sent[0].2.description, "Tekton CI Status");

        let updated = store.updated();
        assert_eq!(updated.len(), 1);
        assert_eq!(
            updated[0].annotation(NOTIFICATION_STATE_ANNOTATION),
            Some("Successful")
        );

        // The same update again, now carrying the recorded state.
        let outcome = watcher.handle_run(updated[0].clone()).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged(RunState::Successful));
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(store.updated().len(), 1);
    }

    #[tokio::test]
    async fn test_new_run_reports_pending() {
        let store = Arc::new(FakeRunStore::with(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let watcher = watcher(store, notifier.clone());

        let outcome = watcher
            .handle_run(run_with("run-a", "Unknown", None))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Notified(RunState::Pending));
        assert_eq!(notifier.sent()[0].2.state, CommitState::Pending);
    }

    #[tokio::test]
    async fn test_unreadable_memo_is_replaced() {
        let store = Arc::new(FakeRunStore::with(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let watcher = watcher(store.clone(), notifier.clone());

        let outcome = watcher
            .handle_run(run_with("run-a", "True", Some("successful")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Notified(RunState::Successful));
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(
            store.updated()[0].annotation(NOTIFICATION_STATE_ANNOTATION),
            Some("Successful")
        );
    }

    #[tokio::test]
    async fn test_failed_run() {
        let store = Arc::new(FakeRunStore::with(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let watcher = watcher(store, notifier.clone());

        watcher
            .handle_run(run_with("run-a", "False", Some("Pending")))
            .await
            .unwrap();
        assert_eq!(notifier.sent()[0].2.state, CommitState::Failure);
    }

    #[tokio::test]
    async fn test_missing_commit_annotation() {
        let store = Arc::new(FakeRunStore::with(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let watcher = watcher(store.clone(), notifier.clone());

        let mut run = run_with("run-a", "True", Some("Pending"));
        run.metadata.annotations.remove(SOURCE_REF_ANNOTATION);

        let err = watcher.handle_run(run).await.unwrap_err();
        assert!(matches!(
            err,
            WatchError::MissingAnnotation { annotation, .. } if annotation == SOURCE_REF_ANNOTATION
        ));
        assert!(notifier.sent().is_empty());
        assert!(store.updated().is_empty());
    }

    #[tokio::test]
    async fn test_failed_notification_is_retried() {
        let store = Arc::new(FakeRunStore::with(vec![]));
        let notifier = Arc::new(FakeNotifier::default());
        let watcher = watcher(store.clone(), notifier.clone());
        let run = run_with("run-a", "True", Some("Pending"));

        notifier.fail_next();
        let err = watcher.handle_run(run.clone()).await.unwrap_err();
        assert!(matches!(err, WatchError::Notify(_)));
        assert!(store.updated().is_empty());

        let outcome = watcher.handle_run(run).await.unwrap();
        assert_eq!(outcome, Outcome::Notified(RunState::Successful));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_until_stopped() {
        let store = Arc::new(FakeRunStore::with(vec![
            run_with("run-a", "True", Some("Pending")),
            run_with("run-b", "Unknown", Some("Pending")),
        ]));
        let notifier = Arc::new(FakeNotifier::default());
        let watcher = Arc::new(watcher(store.clone(), notifier.clone()));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn({
            let watcher = watcher.clone();
            async move { watcher.run(stop_rx).await }
        });

        // Wait for a few polling rounds.
        time::timeout(Duration::from_secs(5), async {
            while store.list_calls() < 3 {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(true).unwrap();
        time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        // Only run-a changed state; run-b is still at its recorded state.
        let sent = notifier.sent();
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|(_, _, s)| s.state == CommitState::Success));
        assert_eq!(
            store.runs()[0].annotation(NOTIFICATION_STATE_ANNOTATION),
            Some("Successful")
        );
    }

    #[test]
    fn test_parse_repo_from_url() {
        let cases = [
            ("https://github.com/Codertocat/Hello-World.git", "Codertocat/Hello-World"),
            ("https://github.com/Codertocat/Hello-World", "Codertocat/Hello-World"),
            ("https://example.com/org/repo/extra", "org/repo"),
        ];
        for (url, want) in cases {
            assert_eq!(parse_repo_from_url(url).unwrap(), want, "url {}", url);
        }

        assert!(parse_repo_from_url("https://github.com/Codertocat").is_err());
        assert!(parse_repo_from_url("not a url").is_err());
    }
}
