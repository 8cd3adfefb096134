//! The polling cycle.
//!
//! A [`Poller`] repeatedly asks its [`StatusSource`] what changed since the
//! stored watermarks. It advances the watermarks, hands the result to the
//! [`Dispatcher`], and sleeps for the delay chosen by [`Backoff`].
//!
//! # Invariants
//!
//! - At most one request is in flight per poller. The cycle waits for the
//!   request guard; a manual [`Poller::poll`] that finds it taken is skipped.
//! - The poller never moves a stored watermark backward, whatever the store's
//!   own [`Monotonicity`](crate::store::Monotonicity) setting.
//! - After [`Poller::stop`] no further request is issued and an in-flight
//!   response is discarded.

mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Backoff;
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::source::{SourceError, StatusSource};
use crate::store::{SetOutcome, WatermarkStore};
use crate::types::{Category, StatusRequest, StatusResponse, Watermark};

pub use config::PollerConfig;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The endpoint answered; watermarks were advanced and handlers ran.
    Completed {
        advanced: Vec<(Category, Watermark)>,
        report: DispatchReport,
    },
    /// The request failed. Watermarks are unchanged.
    Failed(SourceError),
    /// Not issued: the poller was stopped, or another request was in flight.
    Skipped,
    /// The poller was stopped while the request was in flight.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Stopped,
}

struct Shared {
    config: PollerConfig,
    source: Arc<dyn StatusSource>,
    store: Arc<dyn WatermarkStore>,
    dispatcher: Arc<Dispatcher>,
    in_flight: Mutex<()>,
}

struct Cycle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the poll/dispatch/sleep cycle against one status source.
///
/// `start` and `stop` must be called from within a tokio runtime.
pub struct Poller {
    shared: Arc<Shared>,
    state: State,
    cycle: Option<Cycle>,
}

impl Poller {
    pub fn new(
        config: PollerConfig,
        source: Arc<dyn StatusSource>,
        store: Arc<dyn WatermarkStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                source,
                store,
                dispatcher,
                in_flight: Mutex::new(()),
            }),
            state: State::Idle,
            cycle: None,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.shared.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.shared.dispatcher
    }

    pub fn store(&self) -> &Arc<dyn WatermarkStore> {
        &self.shared.store
    }

    /// Whether a cycle task is alive.
    ///
    /// A cycle that gave up after `max_attempts` failures is not running.
    pub fn is_running(&self) -> bool {
        self.cycle
            .as_ref()
            .is_some_and(|cycle| !cycle.handle.is_finished())
    }

    /// Begin the cycle. The first poll is issued immediately.
    ///
    /// Returns `false` without doing anything if a cycle is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            debug!(event = "core.poller.start_ignored", reason = "already running");
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_cycle(Arc::clone(&self.shared), token.clone()));
        self.cycle = Some(Cycle { token, handle });
        self.state = State::Running;

        info!(
            event = "core.poller.started",
            categories = ?self.shared.config.categories,
            poll_interval_ms = self.shared.config.poll_interval.as_millis() as u64,
            retry_interval_ms = self.shared.config.retry.retry_interval.as_millis() as u64,
        );
        true
    }

    /// Cancel the pending poll and any in-flight request.
    ///
    /// Later [`poll`](Self::poll) calls are skipped until `start` is called
    /// again.
    pub fn stop(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            cycle.token.cancel();
            info!(event = "core.poller.stopped");
        }
        self.state = State::Stopped;
    }

    /// Wait until the cycle ends on its own, i.e. after giving up.
    ///
    /// Returns immediately if no cycle is running. Cancel-safe.
    pub async fn wait(&mut self) {
        let Some(cycle) = self.cycle.as_mut() else {
            return;
        };
        let result = (&mut cycle.handle).await;
        self.cycle = None;
        if let Err(e) = result {
            error!(event = "core.poller.cycle_panicked", error = %e);
        }
    }

    /// Issue one request outside the schedule.
    ///
    /// Skipped after `stop`, and when a request is already in flight. Does not
    /// reschedule the running cycle.
    pub async fn poll(&self) -> PollOutcome {
        if self.state == State::Stopped {
            debug!(event = "core.poller.poll_skipped", reason = "stopped");
            return PollOutcome::Skipped;
        }

        let Ok(_guard) = self.shared.in_flight.try_lock() else {
            debug!(event = "core.poller.poll_skipped", reason = "request in flight");
            return PollOutcome::Skipped;
        };

        match self.cycle.as_ref() {
            Some(cycle) => self.shared.poll_once(&cycle.token).await,
            None => self.shared.poll_once(&CancellationToken::new()).await,
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            cycle.token.cancel();
        }
    }
}

async fn run_cycle(shared: Arc<Shared>, token: CancellationToken) {
    let mut backoff = Backoff::new(shared.config.poll_interval, shared.config.retry.clone());

    loop {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => PollOutcome::Cancelled,
            guard = shared.in_flight.lock() => {
                let outcome = shared.poll_once(&token).await;
                drop(guard);
                outcome
            }
        };

        let delay = match outcome {
            PollOutcome::Completed { .. } | PollOutcome::Skipped => backoff.on_success(),
            PollOutcome::Failed(_) => match backoff.on_failure() {
                Some(delay) => delay,
                None => {
                    error!(
                        event = "core.poller.gave_up",
                        consecutive_failures = backoff.consecutive_failures(),
                    );
                    return;
                }
            },
            PollOutcome::Cancelled => break,
        };

        debug!(
            event = "core.poller.next_poll_scheduled",
            delay_ms = delay.as_millis() as u64,
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(event = "core.poller.cycle_exited");
}

impl Shared {
    /// One request/response/dispatch step. The caller holds `in_flight`.
    async fn poll_once(&self, token: &CancellationToken) -> PollOutcome {
        if token.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        let request = self.build_request();
        debug!(
            event = "core.poller.poll_started",
            watermarks = request.watermarks.len(),
        );

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(event = "core.poller.response_discarded");
                return PollOutcome::Cancelled;
            }
            result = self.source.fetch(&request) => result,
        };

        let mut response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(event = "core.poller.poll_failed", error = %e);
                return PollOutcome::Failed(e);
            }
        };

        let ignored = response.retain_categories(&self.config.categories);
        if !ignored.is_empty() {
            debug!(event = "core.poller.unknown_categories", categories = ?ignored);
        }

        let advanced = self.advance_watermarks(&request.watermarks, &response);
        let report = self.dispatcher.dispatch(&response);

        info!(
            event = "core.poller.poll_completed",
            advanced = advanced.len(),
            invoked = report.invoked.len(),
            failed = report.failed.len(),
        );

        PollOutcome::Completed { advanced, report }
    }

    fn build_request(&self) -> StatusRequest {
        let watermarks = self
            .config
            .categories
            .iter()
            .filter_map(|category| Some((category.clone(), self.read_watermark(category)?)))
            .collect();

        StatusRequest {
            categories: self.config.categories.clone(),
            watermarks,
            now: Utc::now(),
        }
    }

    /// Store read that degrades to "no watermark" on error.
    fn read_watermark(&self, category: &Category) -> Option<Watermark> {
        match self.store.get(category) {
            Ok(watermark) => watermark,
            Err(e) => {
                warn!(
                    event = "core.poller.watermark_read_failed",
                    category = %category,
                    error = %e,
                );
                None
            }
        }
    }

    /// Store every response watermark newer than the one sent in the request.
    fn advance_watermarks(
        &self,
        sent: &BTreeMap<Category, Watermark>,
        response: &StatusResponse,
    ) -> Vec<(Category, Watermark)> {
        let mut advanced = Vec::new();

        for category in &self.config.categories {
            let Some(&next) = response.watermarks.get(category.as_str()) else {
                continue;
            };

            // Re-read in case the store was written since the request was built
            let current = self
                .read_watermark(category)
                .max(sent.get(category).copied());
            if let Some(current) = current
                && next <= current
            {
                if next < current {
                    debug!(
                        event = "core.poller.watermark_regression_ignored",
                        category = %category,
                        current = %current,
                        received = %next,
                    );
                }
                continue;
            }

            match self.store.set(category, next) {
                Ok(SetOutcome::Stored) => {
                    debug!(
                        event = "core.poller.watermark_advanced",
                        category = %category,
                        watermark = %next,
                    );
                    advanced.push((category.clone(), next));
                }
                Ok(SetOutcome::Rejected { current }) => {
                    debug!(
                        event = "core.poller.watermark_rejected",
                        category = %category,
                        current = %current,
                        received = %next,
                    );
                }
                Err(e) => {
                    error!(
                        event = "core.poller.watermark_write_failed",
                        category = %category,
                        error = %e,
                    );
                }
            }
        }

        advanced
    }
}
