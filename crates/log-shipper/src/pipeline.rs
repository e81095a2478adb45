// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public surface of the shipping pipeline.
//!
//! A [`Pipeline`] accepts records from any number of producers and owns the
//! background worker that batches and ships them:
//!
//! ```text
//! enqueue ─▶ RollingBuffer ─▶ Batcher ─▶ Dispatcher ─▶ Sink
//! stop    ─▶ close buffer ─▶ worker drains ─▶ done (or cancel on timeout)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::batcher::Batcher;
use crate::config::PipelineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::PipelineError;
use crate::reporter::{ErrorReporter, Severity};
use crate::rolling_buffer::RollingBuffer;
use crate::sink::Sink;

/// How long a cancelled worker gets to acknowledge the cancellation.
const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Lifecycle state of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed but not started. Records are buffered.
    Idle,
    /// The worker is shipping records.
    Running,
    /// Stop was requested; the worker is draining what is left.
    Draining,
    /// The worker has exited, or was never started.
    Stopped,
}

/// What a call to [`Pipeline::stop`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every buffered record was handed to the sink before the timeout.
    Drained,
    /// The timeout elapsed and the worker was cancelled.
    TimedOut,
    /// Another stop already ran or is running.
    AlreadyStopped,
    /// The pipeline was never started; buffered records were discarded.
    NotStarted,
}

pub struct Pipeline<R, S> {
    config: PipelineConfig,
    buffer: Arc<RollingBuffer<R>>,
    sink: Mutex<Option<S>>,
    state: Arc<Mutex<PipelineState>>,
    faulted: Arc<AtomicBool>,
    cancel: CancellationToken,
    done: CancellationToken,
    reporter: Arc<dyn ErrorReporter>,
}

impl<R, S> Pipeline<R, S>
where
    R: Send + Sync + 'static,
    S: Sink<R> + 'static,
{
    /// Creates an idle pipeline. Nothing runs until [`Pipeline::start`].
    pub fn new(config: PipelineConfig, sink: S, reporter: Arc<dyn ErrorReporter>) -> Self {
        let buffer = Arc::new(RollingBuffer::new(
            config.rolling_buffer_size,
            Arc::clone(&reporter),
        ));
        Pipeline {
            config,
            buffer,
            sink: Mutex::new(Some(sink)),
            state: Arc::new(Mutex::new(PipelineState::Idle)),
            faulted: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
            reporter,
        }
    }

    /// Spawns the worker on the current tokio runtime.
    pub fn start(&self) -> Result<(), PipelineError> {
        let mut state = lock(&self.state);
        if *state != PipelineState::Idle {
            return Err(PipelineError::AlreadyStarted);
        }
        let runtime = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;
        let sink = lock(&self.sink)
            .take()
            .ok_or(PipelineError::AlreadyStarted)?;

        let dispatcher = Dispatcher::new(
            self.config.backoff_policy(),
            self.config.rng(),
            Arc::clone(&self.reporter),
        );
        let batcher = Batcher::new(
            Arc::clone(&self.buffer),
            sink,
            dispatcher,
            self.config.flush_trigger_size,
            Arc::clone(&self.reporter),
        );
        let worker = runtime.spawn(batcher.run(self.cancel.clone()));

        let buffer = Arc::clone(&self.buffer);
        let shared_state = Arc::clone(&self.state);
        let faulted = Arc::clone(&self.faulted);
        let reporter = Arc::clone(&self.reporter);
        let done = self.done.clone();
        runtime.spawn(async move {
            if let Err(err) = worker.await {
                if err.is_panic() {
                    reporter.report(
                        Severity::Error,
                        "Log shipping worker failed, pipeline disabled",
                        Some(&err),
                    );
                    buffer.close();
                    *lock(&shared_state) = PipelineState::Stopped;
                    faulted.store(true, Ordering::SeqCst);
                }
            }
            done.cancel();
        });

        *state = PipelineState::Running;
        debug!(
            "Log shipping pipeline started, rolling buffer size {}, flush trigger size {}",
            self.config.rolling_buffer_size, self.config.flush_trigger_size
        );
        Ok(())
    }

    /// Hands `record` to the pipeline without blocking.
    ///
    /// Records are buffered while idle and silently discarded once the
    /// pipeline is stopping, stopped or faulted.
    pub fn enqueue(&self, record: R) {
        if self.faulted.load(Ordering::Relaxed) {
            return;
        }
        self.buffer.try_insert(record);
    }

    /// Closes the buffer and waits up to `timeout` for the worker to drain it.
    ///
    /// On timeout the worker is cancelled and the records it still held are
    /// reported as abandoned.
    pub async fn stop(&self, timeout: Duration) -> StopOutcome {
        {
            let mut state = lock(&self.state);
            let current = *state;
            match current {
                PipelineState::Idle => {
                    *state = PipelineState::Stopped;
                    drop(state);
                    self.buffer.close();
                    let abandoned = self.buffer.len();
                    if abandoned > 0 {
                        self.reporter.report(
                            Severity::Warn,
                            &format!(
                                "Pipeline stopped before it was started, discarding {abandoned} log records"
                            ),
                            None,
                        );
                    }
                    return StopOutcome::NotStarted;
                }
                PipelineState::Draining | PipelineState::Stopped => {
                    return StopOutcome::AlreadyStopped
                }
                PipelineState::Running => *state = PipelineState::Draining,
            }
        }

        debug!("Stopping log shipping pipeline, timeout {timeout:?}");
        self.buffer.close();

        let outcome = match tokio::time::timeout(timeout, self.done.cancelled()).await {
            Ok(()) => StopOutcome::Drained,
            Err(_) => {
                self.cancel.cancel();
                if tokio::time::timeout(CANCEL_GRACE_PERIOD, self.done.cancelled())
                    .await
                    .is_err()
                {
                    self.reporter.report(
                        Severity::Error,
                        &format!(
                            "Log shipping worker did not acknowledge cancellation within {CANCEL_GRACE_PERIOD:?}"
                        ),
                        None,
                    );
                }
                StopOutcome::TimedOut
            }
        };

        *lock(&self.state) = PipelineState::Stopped;
        debug!("Log shipping pipeline stopped: {outcome:?}");
        outcome
    }

    /// Stops with the configured on-close timeout.
    pub async fn close(&self) -> StopOutcome {
        self.stop(self.config.on_close_timeout).await
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    /// Whether the worker died and the pipeline no longer ships anything.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    /// Records waiting in the buffer.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Records evicted by backpressure since the pipeline was created.
    pub fn dropped_total(&self) -> u64 {
        self.buffer.dropped_total()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl<R, S> Drop for Pipeline<R, S> {
    fn drop(&mut self) {
        // The worker keeps its own handle on the buffer and drains it on its own.
        self.buffer.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
