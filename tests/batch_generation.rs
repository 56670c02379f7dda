//! End-to-end tests of the batch orchestrator against scripted providers.
//!
//! Every provider here is in-process; sleeps between retries are recorded
//! instead of waited, so the tests run in milliseconds.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt;
use tokio::sync::Notify;
use tokio::time::timeout;

use future_you::calendar::{Path, PromptInput, TaskKey, all_tasks, build_prompt};
use future_you::config::{GenerationConfig, ProgressConfig};
use future_you::error::ProviderError;
use future_you::generation::{CalendarSession, SessionDeps, SessionEvent, SlotStatus};
use future_you::imagegen::{
    ContentRequest, ContentResponse, ImageClient, ImageProvider, InlineImage, PromptPart,
    RetryPolicy, Sleeper,
};
use future_you::onboarding::Profile;
use future_you::storage::DataUrlStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What the scripted provider does for a given call.
#[derive(Clone)]
enum Reply {
    Image,
    Empty,
    Transient,
    Permanent,
}

type Script = dyn Fn(TaskKey, usize) -> Reply + Send + Sync;

/// Provider that maps each request back to its task and replies per script.
///
/// `script(key, n)` receives the 1-based call number for that task.
struct ScriptedProvider {
    prompts: HashMap<String, TaskKey>,
    script: Box<Script>,
    latency: Duration,
    calls: Mutex<HashMap<TaskKey, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    in_flight_by_key: Mutex<HashMap<TaskKey, usize>>,
    max_in_flight_same_key: AtomicUsize,
    /// When set, the first call for this key waits for `gate` before replying.
    gated: Option<TaskKey>,
    gate: Notify,
}

impl ScriptedProvider {
    fn new(
        profile: &Profile,
        latency: Duration,
        script: impl Fn(TaskKey, usize) -> Reply + Send + Sync + 'static,
    ) -> Self {
        let input = PromptInput::from_profile(profile);
        let prompts = all_tasks()
            .into_iter()
            .map(|key| (build_prompt(key.month(), key.path(), &input), key))
            .collect();
        Self {
            prompts,
            script: Box::new(script),
            latency,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            in_flight_by_key: Mutex::new(HashMap::new()),
            max_in_flight_same_key: AtomicUsize::new(0),
            gated: None,
            gate: Notify::new(),
        }
    }

    fn gated_on(mut self, key: TaskKey) -> Self {
        self.gated = Some(key);
        self
    }

    fn calls_for(&self, key: TaskKey) -> usize {
        self.calls.lock().unwrap().get(&key).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn key_of(&self, request: &ContentRequest) -> TaskKey {
        let text = request
            .parts
            .iter()
            .find_map(|p| match p {
                PromptPart::Text(t) => Some(t.as_str()),
                PromptPart::InlineImage(_) => None,
            })
            .expect("prompt has a text part");
        *self.prompts.get(text).expect("prompt matches a task")
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> Result<ContentResponse, ProviderError> {
        let key = self.key_of(request);
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(key).or_insert(0);
            *n += 1;
            *n
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        {
            let mut by_key = self.in_flight_by_key.lock().unwrap();
            let same = by_key.entry(key).or_insert(0);
            *same += 1;
            self.max_in_flight_same_key.fetch_max(*same, Ordering::SeqCst);
        }

        if self.gated == Some(key) && n == 1 {
            self.gate.notified().await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(same) = self.in_flight_by_key.lock().unwrap().get_mut(&key) {
            *same -= 1;
        }

        match (self.script)(key, n) {
            // Distinct bytes per call so results can be told apart.
            Reply::Image => Ok(ContentResponse::image(InlineImage::new(
                "image/png",
                vec![key.slot_index() as u8, n as u8],
            ))),
            Reply::Empty => Ok(ContentResponse::text("no image this time")),
            Reply::Transient => Err(ProviderError::Overloaded {
                provider: "scripted".into(),
                status: 503,
            }),
            Reply::Permanent => Err(ProviderError::InvalidRequest {
                provider: "scripted".into(),
                reason: "content policy".into(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

fn happy_profile() -> Profile {
    Profile::new(
        vec![],
        vec!["Fat loss".into()],
        "Weight training",
        vec!["Core/Abs".into()],
        "",
    )
    .unwrap()
}

fn fast_config(batch_width: usize) -> GenerationConfig {
    GenerationConfig {
        batch_width,
        progress: ProgressConfig {
            tick: Duration::from_millis(5),
            ..ProgressConfig::default()
        },
        ..GenerationConfig::default()
    }
}

fn session_with(
    provider: Arc<ScriptedProvider>,
    sleeper: Arc<RecordingSleeper>,
    config: GenerationConfig,
) -> Arc<CalendarSession> {
    let client = ImageClient::new(provider, RetryPolicy::default()).with_sleeper(sleeper);
    CalendarSession::new(
        Arc::new(happy_profile()),
        SessionDeps {
            client,
            store: Arc::new(DataUrlStore),
            config,
            namespace: "calendars".into(),
        },
    )
}

fn key(month_index: u8, path: Path) -> TaskKey {
    TaskKey::new(month_index, path).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn happy_path_completes_all_slots_and_finishes_once() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let provider = Arc::new(ScriptedProvider::new(&profile, Duration::ZERO, |_, _| Reply::Image));
        let session = session_with(provider.clone(), Arc::default(), fast_config(4));

        let events: Vec<SessionEvent> = session.start_batch_generation().unwrap().collect().await;

        let finished: Vec<&SessionEvent> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Finished { .. }))
            .collect();
        assert_eq!(finished.len(), 1, "all-complete must fire exactly once");
        assert_eq!(
            finished[0],
            &SessionEvent::Finished {
                all_complete: true,
                done: 24,
                failed: 0
            }
        );

        let slots = session.snapshot().await;
        assert_eq!(slots.len(), 24);
        assert!(slots.iter().all(|s| s.status == SlotStatus::Done && s.progress == 100));
        assert!(slots.iter().all(|s| s.image_url.as_deref().is_some_and(|u| u.starts_with("data:image/png;base64,"))));
        assert!(session.is_complete().await);
        assert_eq!(provider.total_calls(), 24);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slot_identity_is_stable() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let provider = Arc::new(ScriptedProvider::new(&profile, Duration::ZERO, |_, _| Reply::Image));
        let session = session_with(provider, Arc::default(), fast_config(4));

        let before: Vec<TaskKey> = session.snapshot().await.iter().map(|s| s.key).collect();
        let unique: HashSet<TaskKey> = before.iter().copied().collect();
        assert_eq!(unique.len(), 24);
        assert_eq!(unique, all_tasks().into_iter().collect());

        session.run_batches().await.unwrap();
        let after: Vec<TaskKey> = session.snapshot().await.iter().map(|s| s.key).collect();
        assert_eq!(before, after);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_then_success_takes_two_calls() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let january_gym = key(0, Path::Gym);
        let provider = Arc::new(ScriptedProvider::new(&profile, Duration::ZERO, move |k, n| {
            if k == january_gym && n == 1 {
                Reply::Empty
            } else {
                Reply::Image
            }
        }));
        let sleeper = Arc::new(RecordingSleeper::default());
        let session = session_with(provider.clone(), sleeper.clone(), fast_config(4));

        let summary = session.run_batches().await.unwrap();
        assert!(summary.all_complete);
        assert_eq!(session.slot(january_gym).await.status, SlotStatus::Done);
        assert_eq!(provider.calls_for(january_gym), 2);
        assert_eq!(*sleeper.slept.lock().unwrap(), vec![Duration::from_millis(2000)]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn permanent_failure_is_isolated_and_not_retried() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let march_lazy = key(2, Path::Lazy);
        let provider = Arc::new(ScriptedProvider::new(&profile, Duration::ZERO, move |k, _| {
            if k == march_lazy {
                Reply::Permanent
            } else {
                Reply::Image
            }
        }));
        let session = session_with(provider.clone(), Arc::default(), fast_config(4));

        let summary = session.run_batches().await.unwrap();
        assert_eq!(summary.done, 23);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_complete);

        let failed = session.slot(march_lazy).await;
        assert_eq!(failed.status, SlotStatus::Failed);
        assert_eq!(failed.progress, 0);
        assert!(failed.image_url.is_none());
        assert_eq!(provider.calls_for(march_lazy), 1);

        for slot in session.snapshot().await {
            if slot.key != march_lazy {
                assert_eq!(slot.status, SlotStatus::Done, "{}", slot.key);
                assert_eq!(provider.calls_for(slot.key), 1);
            }
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn always_empty_stops_after_four_calls_per_task() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let provider = Arc::new(ScriptedProvider::new(&profile, Duration::ZERO, |_, _| Reply::Empty));
        let session = session_with(provider.clone(), Arc::default(), fast_config(4));

        let summary = session.run_batches().await.unwrap();
        assert_eq!(summary.failed, 24);
        for k in all_tasks() {
            assert_eq!(provider.calls_for(k), 4, "{k}");
        }
        assert!(session.snapshot().await.iter().all(|s| s.status == SlotStatus::Failed));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn transient_backoff_never_shrinks() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let target = key(5, Path::Gym);
        let provider = Arc::new(ScriptedProvider::new(&profile, Duration::ZERO, move |k, _| {
            if k == target {
                Reply::Transient
            } else {
                Reply::Image
            }
        }));
        let sleeper = Arc::new(RecordingSleeper::default());
        let session = session_with(provider.clone(), sleeper.clone(), fast_config(4));

        session.regenerate(target).await.unwrap();
        assert_eq!(provider.calls_for(target), 4);
        let delays = sleeper.slept.lock().unwrap().clone();
        assert_eq!(delays.len(), 3);
        assert!(delays.windows(2).all(|w| w[1] >= w[0]), "{delays:?}");
        assert_eq!(session.slot(target).await.status, SlotStatus::Failed);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn batch_width_bounds_concurrency() {
    timeout(TEST_TIMEOUT, async {
        for width in [1, 3, 4] {
            let profile = happy_profile();
            let provider = Arc::new(ScriptedProvider::new(
                &profile,
                Duration::from_millis(10),
                |_, _| Reply::Image,
            ));
            let session = session_with(provider.clone(), Arc::default(), fast_config(width));

            // Track Generating slots from the event stream as well.
            let mut rx = session.subscribe();
            let watcher = tokio::spawn(async move {
                let mut generating = HashSet::new();
                let mut peak = 0;
                while let Ok(event) = rx.recv().await {
                    match event {
                        SessionEvent::Slot { slot } => {
                            if slot.status == SlotStatus::Generating {
                                generating.insert(slot.key);
                            } else {
                                generating.remove(&slot.key);
                            }
                            peak = peak.max(generating.len());
                        }
                        SessionEvent::Finished { .. } => break,
                        SessionEvent::BatchStarted { .. } => {}
                    }
                }
                peak
            });

            let summary = session.run_batches().await.unwrap();
            assert!(summary.all_complete);
            let peak_generating = watcher.await.unwrap();

            assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), width);
            assert!(peak_generating <= width, "width {width}: peak {peak_generating}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn progress_is_monotonic_until_settled() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let failing = key(7, Path::Lazy);
        let provider = Arc::new(ScriptedProvider::new(
            &profile,
            Duration::from_millis(60),
            move |k, _| {
                if k == failing {
                    Reply::Permanent
                } else {
                    Reply::Image
                }
            },
        ));
        let session = session_with(provider, Arc::default(), fast_config(4));

        let events: Vec<SessionEvent> = session.start_batch_generation().unwrap().collect().await;

        let mut last: HashMap<TaskKey, u8> = HashMap::new();
        let mut saw_tick = false;
        for event in events {
            let SessionEvent::Slot { slot } = event else { continue };
            match slot.status {
                SlotStatus::Generating => {
                    assert!(slot.progress <= 90, "{} at {}", slot.key, slot.progress);
                    if let Some(prev) = last.get(&slot.key) {
                        assert!(slot.progress >= *prev, "{} regressed", slot.key);
                        saw_tick |= slot.progress > *prev;
                    }
                    last.insert(slot.key, slot.progress);
                }
                SlotStatus::Done => assert_eq!(slot.progress, 100),
                SlotStatus::Failed => assert_eq!(slot.progress, 0),
                SlotStatus::Idle => panic!("slot went back to idle"),
            }
        }
        assert!(saw_tick, "ticker never advanced any slot");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn regenerate_supersedes_in_flight_batch_request() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let january_gym = key(0, Path::Gym);
        let provider = Arc::new(
            ScriptedProvider::new(&profile, Duration::ZERO, |_, _| Reply::Image)
                .gated_on(january_gym),
        );
        let session = session_with(provider.clone(), Arc::default(), fast_config(4));

        let batch = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run_batches().await })
        };

        // Wait until the batch request for January/gym is parked at the gate.
        while provider.calls_for(january_gym) == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let regenerated = session.regenerate(january_gym).await.unwrap();
        assert_eq!(regenerated.status, SlotStatus::Done);
        let winning_url = regenerated.image_url.clone().unwrap();

        // Release the stale batch request; its result must be dropped.
        provider.gate.notify_one();
        let summary = batch.await.unwrap().unwrap();
        assert!(summary.all_complete);

        let slot = session.slot(january_gym).await;
        assert_eq!(slot.image_url.as_deref(), Some(winning_url.as_str()));
        assert_eq!(provider.calls_for(january_gym), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn regenerate_calls_on_one_slot_are_serialized() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let target = key(9, Path::Gym);
        let provider = Arc::new(ScriptedProvider::new(
            &profile,
            Duration::from_millis(20),
            |_, _| Reply::Image,
        ));
        let session = session_with(provider.clone(), Arc::default(), fast_config(4));

        let (a, b, c) = tokio::join!(
            session.regenerate(target),
            session.regenerate(target),
            session.regenerate(target),
        );
        for result in [a, b, c] {
            assert_eq!(result.unwrap().status, SlotStatus::Done);
        }
        assert_eq!(provider.calls_for(target), 3);
        assert_eq!(provider.max_in_flight_same_key.load(Ordering::SeqCst), 1);

        // The final state is the last regenerate's result.
        let slot = session.slot(target).await;
        let expected = format!(
            "data:image/png;base64,{}",
            STANDARD.encode([target.slot_index() as u8, 3])
        );
        assert_eq!(slot.image_url.as_deref(), Some(expected.as_str()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn regenerate_on_different_slots_runs_concurrently() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let provider = Arc::new(ScriptedProvider::new(
            &profile,
            Duration::from_millis(30),
            |_, _| Reply::Image,
        ));
        let session = session_with(provider.clone(), Arc::default(), fast_config(4));

        let (a, b) = tokio::join!(
            session.regenerate(key(0, Path::Gym)),
            session.regenerate(key(0, Path::Lazy)),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn batch_waits_for_regenerate_holding_a_slot() {
    timeout(TEST_TIMEOUT, async {
        let profile = happy_profile();
        let held = key(0, Path::Gym);
        let provider = Arc::new(
            ScriptedProvider::new(&profile, Duration::ZERO, |_, _| Reply::Image).gated_on(held),
        );
        let session = session_with(provider.clone(), Arc::default(), fast_config(4));

        let regenerate = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.regenerate(held).await })
        };
        // The regenerate owns the slot and is parked inside the provider.
        while provider.calls_for(held) == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let mut rx = session.subscribe();
        let batch = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run_batches().await })
        };

        // Every other slot settles; the batch must not report yet.
        while provider.total_calls() < 24 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!batch.is_finished(), "batch finished before the held slot settled");

        provider.gate.notify_one();
        assert_eq!(regenerate.await.unwrap().unwrap().status, SlotStatus::Done);

        let summary = batch.await.unwrap().unwrap();
        assert!(summary.all_complete);
        assert_eq!(summary.done, 24);
        assert_eq!(provider.calls_for(held), 1);

        let finished = loop {
            if let SessionEvent::Finished { all_complete, .. } = rx.recv().await.unwrap() {
                break all_complete;
            }
        };
        assert!(finished);
    })
    .await
    .expect("test timed out");
}
