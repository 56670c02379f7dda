//! Calendar session. Runs the 24 generation tasks for one profile.
//!
//! Batches are dispatched strictly in sequence, each one `batch_width` tasks
//! wide and awaited as a whole. A task failure only ever marks its own slot
//! Failed; nothing propagates out of the batch loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::Stream;
use futures::StreamExt;
use futures::future::{join_all, ready};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calendar::{
    CalendarView, PromptInput, TASK_COUNT, TaskKey, build_prompt, render_view,
};
use crate::config::GenerationConfig;
use crate::error::SessionError;
use crate::imagegen::{ImageClient, prompt_parts};
use crate::onboarding::Profile;
use crate::storage::{ObjectStore, PutRequest, artifact_path};

use super::board::{SessionEvent, SlotBoard, SlotCounts};
use super::slot::{DispatchKind, SlotOutcome, SlotSnapshot, SlotStatus};
use super::ticker::ProgressTicker;

/// Shared collaborators handed to every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub client: ImageClient,
    pub store: Arc<dyn ObjectStore>,
    pub config: GenerationConfig,
    /// Storage namespace for artifact paths.
    pub namespace: String,
}

/// Result of one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub done: usize,
    pub failed: usize,
    pub all_complete: bool,
}

pub struct CalendarSession {
    id: Uuid,
    profile: Arc<Profile>,
    board: Arc<SlotBoard>,
    deps: SessionDeps,
    created_at: DateTime<Utc>,
    batch_running: AtomicBool,
    /// One lock per slot; serializes regenerate calls on the same slot.
    regenerate_locks: Vec<Mutex<()>>,
}

impl CalendarSession {
    pub fn new(profile: Arc<Profile>, deps: SessionDeps) -> Arc<Self> {
        let board = Arc::new(SlotBoard::new(deps.config.progress.clone()));
        Arc::new(Self {
            id: Uuid::new_v4(),
            profile,
            board,
            deps,
            created_at: Utc::now(),
            batch_running: AtomicBool::new(false),
            regenerate_locks: (0..TASK_COUNT).map(|_| Mutex::new(())).collect(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.board.subscribe()
    }

    pub async fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.board.snapshot().await
    }

    pub async fn slot(&self, key: TaskKey) -> SlotSnapshot {
        self.board.slot(key).await
    }

    pub async fn counts(&self) -> SlotCounts {
        self.board.counts().await
    }

    pub async fn is_complete(&self) -> bool {
        self.board.is_complete().await
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running.load(Ordering::SeqCst)
    }

    /// The printable calendar for the current slot state.
    pub async fn view(&self) -> CalendarView {
        render_view(self.deps.config.calendar_year, &self.snapshot().await)
    }

    /// Kick off a batch run in the background.
    ///
    /// The returned stream yields every event of the run and ends right after
    /// the `Finished` event.
    pub fn start_batch_generation(
        self: &Arc<Self>,
    ) -> Result<impl Stream<Item = SessionEvent> + Send + 'static, SessionError> {
        self.claim_batch()?;

        // Subscribe before spawning so no event of this run is missed.
        let rx = self.board.subscribe();
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.run_claimed().await;
        });

        let events = BroadcastStream::new(rx)
            .filter_map(|event| ready(event.ok()))
            .scan(false, |finished, event| {
                if *finished {
                    return ready(None);
                }
                *finished = matches!(event, SessionEvent::Finished { .. });
                ready(Some(event))
            });
        Ok(events)
    }

    /// Run every batch to completion on the current task.
    ///
    /// Task failures never surface here; the only error is a run already in
    /// progress.
    pub async fn run_batches(&self) -> Result<BatchSummary, SessionError> {
        self.claim_batch()?;
        Ok(self.run_claimed().await)
    }

    /// Generate a single slot again, independent of any batch run.
    pub async fn regenerate(&self, key: TaskKey) -> Result<SlotSnapshot, SessionError> {
        let _serial = self.regenerate_locks[key.slot_index()].lock().await;
        info!(session_id = %self.id, slot = %key, "Regenerating slot");
        match self.run_task(key, DispatchKind::Regenerate).await? {
            Some(snapshot) => Ok(snapshot),
            None => Ok(self.board.slot(key).await),
        }
    }

    fn claim_batch(&self) -> Result<(), SessionError> {
        self.batch_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| SessionError::BatchInProgress { id: self.id })
    }

    async fn run_claimed(&self) -> BatchSummary {
        let pending: Vec<TaskKey> = self
            .board
            .snapshot()
            .await
            .into_iter()
            .filter(|s| s.status != SlotStatus::Done)
            .map(|s| s.key)
            .collect();

        let width = self.deps.config.batch_width.max(1);
        let batches = pending.len().div_ceil(width);
        info!(
            session_id = %self.id,
            tasks = pending.len(),
            batches,
            width,
            "Starting batch generation"
        );

        // Slots a regenerate held or took over while the batch ran.
        let mut contested = Vec::new();
        for (i, chunk) in pending.chunks(width).enumerate() {
            self.board.publish(SessionEvent::BatchStarted {
                batch: i + 1,
                batches,
            });
            let outcomes = join_all(chunk.iter().map(|key| async move {
                (*key, self.run_task(*key, DispatchKind::Batch).await)
            }))
            .await;
            contested.extend(
                outcomes
                    .into_iter()
                    .filter(|(_, outcome)| !matches!(outcome, Ok(Some(_))))
                    .map(|(key, _)| key),
            );
        }

        // Count contested slots only once their regenerate has settled.
        for key in contested {
            let _settled = self.regenerate_locks[key.slot_index()].lock().await;
        }

        let counts = self.board.counts().await;
        let summary = BatchSummary {
            done: counts.done,
            failed: counts.failed,
            all_complete: counts.done == TASK_COUNT,
        };
        info!(
            session_id = %self.id,
            done = summary.done,
            failed = summary.failed,
            "Batch generation finished"
        );

        self.batch_running.store(false, Ordering::SeqCst);
        self.board.publish(SessionEvent::Finished {
            all_complete: summary.all_complete,
            done: summary.done,
            failed: summary.failed,
        });
        summary
    }

    /// Dispatch, generate, store and settle one slot.
    ///
    /// `Ok(None)` means the result was superseded by a newer dispatch.
    async fn run_task(
        &self,
        key: TaskKey,
        kind: DispatchKind,
    ) -> Result<Option<SlotSnapshot>, SessionError> {
        let token = match self.board.dispatch(key, kind).await {
            Ok(token) => token,
            Err(e) => {
                warn!(session_id = %self.id, slot = %key, error = %e, "Slot not dispatched");
                return Err(e);
            }
        };

        let ticker = ProgressTicker::spawn(Arc::clone(&self.board), token);
        let outcome = match self.produce(key).await {
            Ok(image_url) => SlotOutcome::Done { image_url },
            Err(e) => {
                warn!(session_id = %self.id, slot = %key, error = %e, "Slot generation failed");
                SlotOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        ticker.stop();

        Ok(self.board.settle(token, outcome).await)
    }

    /// Generate and store the image for one task, returning its URL.
    async fn produce(&self, key: TaskKey) -> crate::error::Result<String> {
        let month = key.month();
        let text = build_prompt(month, key.path(), &PromptInput::from_profile(&self.profile));
        let reference = self.profile.primary_photo().map(|p| p.to_inline_image());

        let image = self
            .deps
            .client
            .generate(&prompt_parts(reference, text))
            .await?;

        let path = artifact_path(
            &self.deps.namespace,
            self.id,
            month,
            key.path(),
            &image.mime_type,
        );
        let stored = self
            .deps
            .store
            .put(PutRequest {
                path,
                bytes: image.data,
                content_type: image.mime_type,
                public: true,
            })
            .await?;
        Ok(stored.url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;

    use super::*;
    use crate::calendar::Path;
    use crate::error::{ProviderError, StorageError};
    use crate::imagegen::{
        ContentRequest, ContentResponse, ImageProvider, InlineImage, PromptPart, RetryPolicy,
        Sleeper,
    };
    use crate::storage::{DataUrlStore, StoredObject};

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: std::time::Duration) {}
    }

    /// Returns a PNG for every prompt, except lazy prompts when `fail_lazy`.
    struct StubProvider {
        calls: AtomicU32,
        fail_lazy: bool,
    }

    #[async_trait]
    impl ImageProvider for StubProvider {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn generate_content(
            &self,
            request: &ContentRequest,
        ) -> Result<ContentResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let is_lazy = request
                .parts
                .iter()
                .any(|p| matches!(p, PromptPart::Text(t) if t.contains("on a couch")));
            if self.fail_lazy && is_lazy {
                return Err(ProviderError::InvalidRequest {
                    provider: "stub".into(),
                    reason: "no".into(),
                });
            }
            Ok(ContentResponse::image(InlineImage::new("image/png", vec![1, 2, 3])))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn put(&self, request: PutRequest) -> Result<StoredObject, StorageError> {
            Err(StorageError::Http {
                path: request.path,
                status: 500,
            })
        }
    }

    fn profile() -> Arc<Profile> {
        Arc::new(
            Profile::new(
                vec![],
                vec!["Fat loss".into()],
                "Weight training",
                vec!["Core/Abs".into()],
                String::new(),
            )
            .unwrap(),
        )
    }

    fn session(provider: Arc<StubProvider>, store: Arc<dyn ObjectStore>) -> Arc<CalendarSession> {
        let client =
            ImageClient::new(provider, RetryPolicy::default()).with_sleeper(Arc::new(NoSleep));
        CalendarSession::new(
            profile(),
            SessionDeps {
                client,
                store,
                config: GenerationConfig::default(),
                namespace: "calendars".into(),
            },
        )
    }

    fn stub(fail_lazy: bool) -> Arc<StubProvider> {
        Arc::new(StubProvider {
            calls: AtomicU32::new(0),
            fail_lazy,
        })
    }

    #[tokio::test]
    async fn run_batches_completes_all_slots() {
        let provider = stub(false);
        let session = session(provider.clone(), Arc::new(DataUrlStore));
        let summary = session.run_batches().await.unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                done: 24,
                failed: 0,
                all_complete: true
            }
        );
        assert!(session.is_complete().await);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 24);
        assert!(!session.is_batch_running());
        for slot in session.snapshot().await {
            assert_eq!(slot.progress, 100);
            assert_eq!(slot.image_url.as_deref(), Some("data:image/png;base64,AQID"));
        }
    }

    #[tokio::test]
    async fn failures_are_isolated_and_resumable() {
        let provider = stub(true);
        let session = session(provider.clone(), Arc::new(DataUrlStore));
        let summary = session.run_batches().await.unwrap();
        assert_eq!(summary.done, 12);
        assert_eq!(summary.failed, 12);
        assert!(!summary.all_complete);

        // A second run only touches the slots that are not done.
        let before = provider.calls.load(Ordering::SeqCst);
        session.run_batches().await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst) - before, 12);
    }

    #[tokio::test]
    async fn storage_failure_fails_slot() {
        let session = session(stub(false), Arc::new(FailingStore));
        let snapshot = session
            .regenerate(TaskKey::new(0, Path::Gym).unwrap())
            .await
            .unwrap();
        assert_eq!(snapshot.status, SlotStatus::Failed);
        assert!(snapshot.image_url.is_none());
        assert_eq!(snapshot.progress, 0);
    }

    #[tokio::test]
    async fn regenerate_replaces_done_slot() {
        let provider = stub(false);
        let session = session(provider.clone(), Arc::new(DataUrlStore));
        let key = TaskKey::new(11, Path::Lazy).unwrap();
        let first = session.regenerate(key).await.unwrap();
        assert_eq!(first.status, SlotStatus::Done);
        let second = session.regenerate(key).await.unwrap();
        assert_eq!(second.status, SlotStatus::Done);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_batch_run_is_rejected() {
        let session = session(stub(false), Arc::new(DataUrlStore));
        let _events = session.start_batch_generation().unwrap();
        let err = session.run_batches().await.unwrap_err();
        assert_eq!(err, SessionError::BatchInProgress { id: session.id() });
    }

    #[tokio::test]
    async fn event_stream_ends_after_finished() {
        let session = session(stub(false), Arc::new(DataUrlStore));
        let events: Vec<SessionEvent> = session.start_batch_generation().unwrap().collect().await;
        let finished: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Finished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Finished {
                all_complete: true,
                ..
            })
        ));
        let batches = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::BatchStarted { .. }))
            .count();
        assert_eq!(batches, 6);
    }
}
