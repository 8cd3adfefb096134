//! Poller schedule and watermark behavior, on paused tokio time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flagwatch_core::{
    Category, Dispatcher, FileStore, HandlerError, HandlerErrorPolicy, Indicator, MemoryStore,
    Monotonicity, PollOutcome,
    Poller, PollerConfig, RetryPolicy, RetryStrategy, SourceError, StatusRequest, StatusResponse,
    StatusSource, Watermark, WatermarkStore,
};
use tokio::time::Instant;

enum Step {
    Respond(StatusResponse),
    Fail(SourceError),
    Slow(Duration, StatusResponse),
}

/// Replays a fixed script, then answers with an empty response.
struct ScriptedSource {
    started: Instant,
    script: Mutex<VecDeque<Step>>,
    fail_forever: bool,
    calls: Mutex<Vec<(Duration, StatusRequest)>>,
}

impl ScriptedSource {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            script: Mutex::new(script.into()),
            fail_forever: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            script: Mutex::new(VecDeque::new()),
            fail_forever: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_times_ms(&self) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| at.as_millis() as u64)
            .collect()
    }

    fn request(&self, index: usize) -> StatusRequest {
        self.calls.lock().unwrap()[index].1.clone()
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self, request: &StatusRequest) -> Result<StatusResponse, SourceError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.started.elapsed(), request.clone()));

        if self.fail_forever {
            return Err(SourceError::Connection("connection refused".to_string()));
        }

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Slow(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => Ok(StatusResponse::default()),
        }
    }
}

fn cat(name: &str) -> Category {
    Category::new(name).unwrap()
}

fn config() -> PollerConfig {
    PollerConfig::new(vec![cat("messages"), cat("activity")])
        .with_poll_interval(Duration::from_millis(5000))
        .with_retry(RetryPolicy::fixed(Duration::from_millis(30000)))
}

/// Dispatcher with a counting handler for `messages`.
fn counting_dispatcher() -> (Arc<Dispatcher>, Arc<AtomicUsize>) {
    let dispatcher = Arc::new(Dispatcher::default());
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    dispatcher.register(
        cat("messages"),
        move |_: &Category, _: Indicator| -> Result<(), HandlerError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );
    (dispatcher, count)
}

fn assert_times(actual: &[u64], expected: &[u64]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "calls at {actual:?}, expected {expected:?}"
    );
    for (a, e) in actual.iter().zip(expected) {
        assert!(a.abs_diff(*e) <= 1, "calls at {actual:?}, expected {expected:?}");
    }
}

async fn advance_to(started: Instant, ms: u64) {
    tokio::time::sleep_until(started + Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_success_then_failure_schedules_backoff() {
    let started = Instant::now();
    let source = ScriptedSource::new(vec![
        Step::Respond(
            StatusResponse::default()
                .with_update("messages", true)
                .with_watermark("messages", 100),
        ),
        Step::Fail(SourceError::Connection("network down".to_string())),
    ]);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, count) = counting_dispatcher();

    let mut poller = Poller::new(config(), source.clone(), store.clone(), dispatcher);
    assert!(poller.start());

    advance_to(started, 1000).await;
    assert_times(&source.call_times_ms(), &[0]);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(store.get(&cat("messages")).unwrap(), Some(Watermark::new(100)));

    advance_to(started, 6000).await;
    assert_times(&source.call_times_ms(), &[0, 5000]);
    assert_eq!(store.get(&cat("messages")).unwrap(), Some(Watermark::new(100)));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    // Nothing between the failure and the retry
    advance_to(started, 34000).await;
    assert_eq!(source.call_times_ms().len(), 2);

    advance_to(started, 36000).await;
    assert_times(&source.call_times_ms(), &[0, 5000, 35000]);
    assert_eq!(source.request(2).watermarks.get("messages"), Some(&Watermark::new(100)));

    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let started = Instant::now();
    let source = ScriptedSource::new(Vec::new());
    let mut poller = Poller::new(
        config(),
        source.clone(),
        Arc::new(MemoryStore::default()),
        Arc::new(Dispatcher::default()),
    );

    assert!(poller.start());
    assert!(!poller.start());
    assert!(poller.is_running());

    advance_to(started, 12000).await;
    assert_times(&source.call_times_ms(), &[0, 5000, 10000]);
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_further_requests() {
    let started = Instant::now();
    let source = ScriptedSource::new(Vec::new());
    let mut poller = Poller::new(
        config(),
        source.clone(),
        Arc::new(MemoryStore::default()),
        Arc::new(Dispatcher::default()),
    );

    poller.start();
    advance_to(started, 100).await;
    poller.stop();
    assert!(!poller.is_running());

    advance_to(started, 60000).await;
    assert_times(&source.call_times_ms(), &[0]);

    // Restart polls immediately
    assert!(poller.start());
    advance_to(started, 60001).await;
    assert_times(&source.call_times_ms(), &[0, 60000]);
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_watermark_never_decreases() {
    let started = Instant::now();
    let source = ScriptedSource::new(vec![
        Step::Respond(StatusResponse::default().with_watermark("messages", 100)),
        Step::Respond(StatusResponse::default().with_watermark("messages", 50)),
        Step::Respond(StatusResponse::default().with_watermark("messages", 150)),
    ]);
    let store = Arc::new(MemoryStore::default());
    let mut poller = Poller::new(
        config(),
        source.clone(),
        store.clone(),
        Arc::new(Dispatcher::default()),
    );

    poller.start();
    advance_to(started, 1000).await;
    assert_eq!(store.get(&cat("messages")).unwrap(), Some(Watermark::new(100)));

    advance_to(started, 6000).await;
    assert_eq!(store.get(&cat("messages")).unwrap(), Some(Watermark::new(100)));

    advance_to(started, 11000).await;
    assert_eq!(store.get(&cat("messages")).unwrap(), Some(Watermark::new(150)));

    // Each request carried the newest stored watermark
    assert!(source.request(0).watermarks.is_empty());
    assert_eq!(source.request(1).watermarks.get("messages"), Some(&Watermark::new(100)));
    assert_eq!(source.request(2).watermarks.get("messages"), Some(&Watermark::new(100)));
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_failure_leaves_watermarks_and_retries_once() {
    let started = Instant::now();
    let source = ScriptedSource::failing();
    let store = Arc::new(MemoryStore::default());
    store.set(&cat("messages"), Watermark::new(42)).unwrap();

    let mut poller = Poller::new(
        config(),
        source.clone(),
        store.clone(),
        Arc::new(Dispatcher::default()),
    );
    poller.start();

    advance_to(started, 29000).await;
    assert_times(&source.call_times_ms(), &[0]);

    advance_to(started, 61000).await;
    assert_times(&source.call_times_ms(), &[0, 30000, 60000]);
    assert_eq!(store.get(&cat("messages")).unwrap(), Some(Watermark::new(42)));
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_resets_on_success() {
    let started = Instant::now();
    let fail = || Step::Fail(SourceError::Timeout);
    let source = ScriptedSource::new(vec![fail(), fail(), fail(), fail()]);
    let retry = RetryPolicy {
        retry_interval: Duration::from_millis(1000),
        strategy: RetryStrategy::Exponential,
        max_retry_interval: Duration::from_millis(4000),
        max_attempts: None,
    };
    let mut poller = Poller::new(
        config().with_retry(retry),
        source.clone(),
        Arc::new(MemoryStore::default()),
        Arc::new(Dispatcher::default()),
    );
    poller.start();

    advance_to(started, 16500).await;
    // 1s, 2s, 4s, capped 4s, then the regular 5s interval
    assert_times(&source.call_times_ms(), &[0, 1000, 3000, 7000, 11000, 16000]);
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let source = ScriptedSource::failing();
    let mut retry = RetryPolicy::fixed(Duration::from_millis(30000));
    retry.max_attempts = Some(3);
    let mut poller = Poller::new(
        config().with_retry(retry),
        source.clone(),
        Arc::new(MemoryStore::default()),
        Arc::new(Dispatcher::default()),
    );
    poller.start();

    poller.wait().await;
    assert!(!poller.is_running());
    assert_times(&source.call_times_ms(), &[0, 30000, 60000]);

    // A cycle that gave up can be started again
    assert!(poller.start());
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_response() {
    let started = Instant::now();
    let source = ScriptedSource::new(vec![Step::Slow(
        Duration::from_millis(10000),
        StatusResponse::default()
            .with_update("messages", true)
            .with_watermark("messages", 500),
    )]);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, count) = counting_dispatcher();
    let mut poller = Poller::new(config(), source.clone(), store.clone(), dispatcher);

    poller.start();
    advance_to(started, 1000).await;
    poller.stop();

    advance_to(started, 30000).await;
    assert_eq!(source.call_times_ms().len(), 1);
    assert_eq!(store.get(&cat("messages")).unwrap(), None);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_poll_skipped_while_in_flight() {
    let started = Instant::now();
    let source = ScriptedSource::new(vec![Step::Slow(
        Duration::from_millis(10000),
        StatusResponse::default(),
    )]);
    let mut poller = Poller::new(
        config(),
        source.clone(),
        Arc::new(MemoryStore::default()),
        Arc::new(Dispatcher::default()),
    );

    poller.start();
    advance_to(started, 1000).await;
    assert_eq!(poller.poll().await, PollOutcome::Skipped);
    assert_eq!(source.call_times_ms().len(), 1);
    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_manual_poll_before_start_and_after_stop() {
    let source = ScriptedSource::new(vec![Step::Respond(
        StatusResponse::default()
            .with_update("messages", 3u64)
            .with_update("unknown", true)
            .with_watermark("messages", 7)
            .with_watermark("unknown", 9),
    )]);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, count) = counting_dispatcher();
    let mut poller = Poller::new(config(), source.clone(), store.clone(), dispatcher);

    match poller.poll().await {
        PollOutcome::Completed { advanced, report } => {
            assert_eq!(advanced, vec![(cat("messages"), Watermark::new(7))]);
            assert_eq!(report.invoked, vec![cat("messages")]);
            // Unknown categories are filtered before dispatch
            assert!(report.unhandled.is_empty());
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(store.snapshot().unwrap().len(), 1);

    poller.stop();
    assert_eq!(poller.poll().await, PollOutcome::Skipped);
    assert_eq!(source.call_times_ms().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abort_policy_reported_through_poll() {
    let source = ScriptedSource::new(vec![Step::Respond(
        StatusResponse::default()
            .with_update("activity", true)
            .with_update("messages", true),
    )]);
    let dispatcher = Arc::new(Dispatcher::new(HandlerErrorPolicy::Abort));
    dispatcher.register(
        cat("activity"),
        |_: &Category, _: Indicator| -> Result<(), HandlerError> {
            Err(HandlerError::failed("render failed"))
        },
    );
    dispatcher.register(
        cat("messages"),
        |_: &Category, _: Indicator| -> Result<(), HandlerError> { Ok(()) },
    );
    let poller = Poller::new(
        config(),
        source,
        Arc::new(MemoryStore::default()),
        dispatcher,
    );

    let PollOutcome::Completed { report, .. } = poller.poll().await else {
        panic!("expected Completed");
    };
    assert!(report.aborted);
    assert_eq!(report.failed.len(), 1);
    assert!(report.invoked.is_empty());
}

#[tokio::test]
async fn test_file_store_round_trips_through_poll_cycles() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = ScriptedSource::new(vec![
        Step::Respond(StatusResponse::default().with_watermark("messages", 40)),
        Step::Respond(StatusResponse::default().with_watermark("messages", 30)),
    ]);
    let store = Arc::new(FileStore::new(dir.path().to_path_buf(), Monotonicity::Enforce));
    let poller = Poller::new(
        config(),
        source.clone(),
        store.clone(),
        Arc::new(Dispatcher::default()),
    );

    assert!(matches!(poller.poll().await, PollOutcome::Completed { .. }));
    assert!(dir.path().join("messages.json").exists());

    assert!(matches!(poller.poll().await, PollOutcome::Completed { .. }));
    assert_eq!(source.request(1).watermarks.get("messages"), Some(&Watermark::new(40)));

    // A fresh store over the same directory sees what the poller wrote
    let reopened = FileStore::new(dir.path().to_path_buf(), Monotonicity::Enforce);
    assert_eq!(reopened.get(&cat("messages")).unwrap(), Some(Watermark::new(40)));
}
