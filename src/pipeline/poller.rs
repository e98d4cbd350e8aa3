//! Pipeline progress polling.
//!
//! A poller is a tokio task bound to one project. It fetches progress right
//! away, then every `PROGRESS_POLL_INTERVAL` while the status is not
//! terminal. On a terminal status (completed, error, reviewing) it parks
//! until the project's `pipeline-progress` cache key is invalidated, e.g. by
//! a retry or resume, and then starts over.
//!
//! Every observation goes to the caller's callback with the projected
//! stepper states. Fetch failures are reported and polling carries on.
//! Dropping the handle cancels the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::stepper::{derive_step_states, StepStates};
use crate::api::ApiError;
use crate::models::PipelineProgress;
use crate::query_cache::{QueryCache, QueryKey};

/// One poll outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Progress {
        progress: PipelineProgress,
        steps: StepStates,
    },
    FetchFailed(ApiError),
}

impl PollEvent {
    /// Whether this observation parks the poller.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Progress { progress, .. } if progress.status.is_terminal())
    }
}

/// Handle to a running background task. Dropping it cancels the task.
pub struct PollerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Shut down and wait for the task to exit.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn a task around `work` that ends when the returned handle is shut
/// down or dropped.
fn spawn_cancellable<W>(label: &'static str, work: W) -> PollerHandle
where
    W: Future<Output = ()> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_rx => tracing::debug!(task = label, "Background task cancelled"),
            _ = work => {}
        }
    });
    PollerHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}

// ═══════════════════════════════════════════════════════════
// Progress poller
// ═══════════════════════════════════════════════════════════

/// Start polling progress for `project_id`.
///
/// `fetch` is called once per tick; results are written through `cache`
/// under the project's `pipeline-progress` key so other readers see them.
pub fn spawn_progress_poller<F, Fut, C>(
    cache: Arc<QueryCache>,
    project_id: &str,
    interval: Duration,
    fetch: F,
    mut on_event: C,
) -> PollerHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PipelineProgress, ApiError>> + Send + 'static,
    C: FnMut(PollEvent) + Send + 'static,
{
    let key = QueryKey::pipeline_progress(project_id);
    let wake = cache.watch(&key);
    let project_id = project_id.to_string();

    spawn_cancellable("progress-poller", async move {
        tracing::info!(project_id = %project_id, "Progress polling started");
        loop {
            let event = match cache.refetch(&key, &fetch).await {
                Ok(progress) => {
                    let steps = derive_step_states(progress.status, &progress.steps);
                    tracing::debug!(
                        project_id = %project_id,
                        status = %progress.status,
                        progress = progress.pipeline_progress,
                        "Progress observed"
                    );
                    PollEvent::Progress { progress, steps }
                }
                Err(e) => {
                    tracing::warn!(project_id = %project_id, error = %e, "Progress fetch failed");
                    PollEvent::FetchFailed(e)
                }
            };
            let terminal = event.is_terminal();
            on_event(event);

            if terminal {
                tracing::debug!(project_id = %project_id, "Polling parked until invalidation");
                wake.notified().await;
                tracing::debug!(project_id = %project_id, "Polling resumed");
            } else {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = wake.notified() => {}
                }
            }
        }
    })
}

// ═══════════════════════════════════════════════════════════
// Periodic refresh
// ═══════════════════════════════════════════════════════════

/// Refetch `key` every `interval` (dashboard stats auto-refresh) and hand
/// each result to `on_update`. An invalidation of `key` triggers an early
/// refresh.
pub fn spawn_periodic_refresh<T, F, Fut, C>(
    cache: Arc<QueryCache>,
    key: QueryKey,
    interval: Duration,
    fetch: F,
    mut on_update: C,
) -> PollerHandle
where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    C: FnMut(Result<T, ApiError>) + Send + 'static,
{
    let wake = cache.watch(&key);
    spawn_cancellable("periodic-refresh", async move {
        loop {
            let result = cache.refetch(&key, &fetch).await;
            if let Err(e) = &result {
                tracing::warn!(key = %key, error = %e, "Periodic refresh failed");
            }
            on_update(result);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = wake.notified() => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PipelineStatus, PipelineStep, StepStatus};
    use crate::pipeline::stepper::StepState;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    const TICK: Duration = Duration::from_millis(20);

    fn progress(status: PipelineStatus, pct: u8) -> PipelineProgress {
        PipelineProgress {
            project_id: "proj-001".into(),
            status,
            pipeline_progress: pct,
            current_step: None,
            steps: vec![PipelineStep::new("extraction", StepStatus::Completed)],
            error_message: None,
        }
    }

    /// Scripted backend: pops responses in order, repeating the last one.
    #[derive(Clone)]
    struct Script {
        responses: Arc<Mutex<VecDeque<Result<PipelineProgress, ApiError>>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Script {
        fn new(responses: Vec<Result<PipelineProgress, ApiError>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn push(&self, response: Result<PipelineProgress, ApiError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fetcher(
            &self,
        ) -> impl Fn() -> std::future::Ready<Result<PipelineProgress, ApiError>> + Send + Sync + 'static
        {
            let script = self.clone();
            move || {
                script.calls.fetch_add(1, Ordering::SeqCst);
                let mut responses = script.responses.lock().unwrap();
                let next = if responses.len() > 1 {
                    responses.pop_front().unwrap()
                } else {
                    responses.front().cloned().unwrap()
                };
                std::future::ready(next)
            }
        }
    }

    fn spawn(
        cache: &Arc<QueryCache>,
        script: &Script,
    ) -> (PollerHandle, mpsc::UnboundedReceiver<PollEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_progress_poller(cache.clone(), "proj-001", TICK, script.fetcher(), move |e| {
            let _ = tx.send(e);
        });
        (handle, rx)
    }

    async fn next_status(rx: &mut mpsc::UnboundedReceiver<PollEvent>) -> PipelineStatus {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(PollEvent::Progress { progress, .. })) => progress.status,
            other => panic!("expected progress event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn polls_until_terminal_then_parks() {
        let cache = Arc::new(QueryCache::default());
        let script = Script::new(vec![
            Ok(progress(PipelineStatus::Extracting, 20)),
            Ok(progress(PipelineStatus::Classifying, 40)),
            Ok(progress(PipelineStatus::Reviewing, 65)),
        ]);
        let (_handle, mut rx) = spawn(&cache, &script);

        assert_eq!(next_status(&mut rx).await, PipelineStatus::Extracting);
        assert_eq!(next_status(&mut rx).await, PipelineStatus::Classifying);
        assert_eq!(next_status(&mut rx).await, PipelineStatus::Reviewing);

        tokio::time::sleep(TICK * 6).await;
        assert_eq!(script.calls(), 3, "no fetches after a terminal status");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn events_carry_projected_steps() {
        let cache = Arc::new(QueryCache::default());
        let script = Script::new(vec![Ok(progress(PipelineStatus::Reviewing, 65))]);
        let (_handle, mut rx) = spawn(&cache, &script);

        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(PollEvent::Progress { steps, progress })) => {
                assert_eq!(progress.pipeline_progress, 65);
                assert_eq!(steps[3], StepState::Running);
                assert_eq!(steps[1], StepState::Completed);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalidation_resumes_parked_poller() {
        let cache = Arc::new(QueryCache::default());
        let script = Script::new(vec![Ok(progress(PipelineStatus::Error, 40))]);
        let (_handle, mut rx) = spawn(&cache, &script);
        assert_eq!(next_status(&mut rx).await, PipelineStatus::Error);

        // Retry accepted by the backend: pipeline runs again.
        script.responses.lock().unwrap().clear();
        script.push(Ok(progress(PipelineStatus::Extracting, 10)));
        script.push(Ok(progress(PipelineStatus::Completed, 100)));
        cache.invalidate(&QueryKey::pipeline_progress("proj-001")).await;

        assert_eq!(next_status(&mut rx).await, PipelineStatus::Extracting);
        assert_eq!(next_status(&mut rx).await, PipelineStatus::Completed);
    }

    #[tokio::test]
    async fn fetch_errors_are_reported_and_polling_continues() {
        let cache = Arc::new(QueryCache::default());
        let script = Script::new(vec![
            Err(ApiError::Timeout),
            Ok(progress(PipelineStatus::Completed, 100)),
        ]);
        let (_handle, mut rx) = spawn(&cache, &script);

        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(PollEvent::FetchFailed(e))) => assert_eq!(e, ApiError::Timeout),
            other => panic!("expected failure event, got {other:?}"),
        }
        assert_eq!(next_status(&mut rx).await, PipelineStatus::Completed);
    }

    #[tokio::test]
    async fn dropping_handle_stops_polling() {
        let cache = Arc::new(QueryCache::default());
        let script = Script::new(vec![Ok(progress(PipelineStatus::Extracting, 20))]);
        let (handle, mut rx) = spawn(&cache, &script);
        assert_eq!(next_status(&mut rx).await, PipelineStatus::Extracting);

        drop(handle);
        tokio::time::sleep(TICK * 2).await;
        let calls = script.calls();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(script.calls(), calls);
    }

    #[tokio::test]
    async fn stop_waits_for_task_exit() {
        let cache = Arc::new(QueryCache::default());
        let script = Script::new(vec![Ok(progress(PipelineStatus::Generating, 90))]);
        let (handle, _rx) = spawn(&cache, &script);
        tokio::time::sleep(TICK).await;
        assert!(!handle.is_finished());
        handle.stop().await;
    }

    #[tokio::test]
    async fn poll_results_land_in_cache() {
        let cache = Arc::new(QueryCache::default());
        let script = Script::new(vec![Ok(progress(PipelineStatus::Reviewing, 65))]);
        let (_handle, mut rx) = spawn(&cache, &script);
        next_status(&mut rx).await;

        let cached = cache
            .peek(&QueryKey::pipeline_progress("proj-001"))
            .await
            .expect("progress cached");
        assert_eq!(cached["pipeline_progress"], 65);
    }

    #[tokio::test]
    async fn periodic_refresh_ticks() {
        let cache = Arc::new(QueryCache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = spawn_periodic_refresh(
            cache,
            QueryKey::dashboard(),
            TICK,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) as u64;
                std::future::ready(Ok::<u64, ApiError>(n))
            },
            move |r| {
                let _ = tx.send(r);
            },
        );

        for expected in 0..3u64 {
            let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            assert_eq!(got, expected);
        }
    }
}
