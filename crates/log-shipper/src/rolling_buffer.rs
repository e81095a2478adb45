// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Multi-producer, single-consumer queue with drop-oldest backpressure.
//!
//! ```text
//!   producers ──try_insert──▶ ┌───────────────────────┐ ──next──▶ batcher
//!   (many, sync)              │ VecDeque behind Mutex │    (one, async)
//!                             └───────────────────────┘
//!                               full? pop_front, then push_back
//! ```
//!
//! Producers only hold the lock for one evict-then-insert. The single consumer
//! parks on a [`Notify`] while the queue is empty. Evictions are counted per
//! drop episode; the episode total is reported once the episode ends.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::reporter::{ErrorReporter, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Accepted,
    /// The record was stored after evicting the oldest buffered record.
    AcceptedWithEviction,
    /// The buffer is closed; the record was discarded.
    Rejected,
}

impl InsertOutcome {
    pub fn is_accepted(self) -> bool {
        !matches!(self, InsertOutcome::Rejected)
    }
}

#[derive(Debug)]
struct State<R> {
    queue: VecDeque<R>,
    closed: bool,
    episode_dropped: u64,
    total_dropped: u64,
}

#[derive(Debug)]
pub struct RollingBuffer<R> {
    state: Mutex<State<R>>,
    notify: Notify,
    capacity: Option<NonZeroUsize>,
    reporter: Arc<dyn ErrorReporter>,
}

impl<R> RollingBuffer<R> {
    /// Creates a buffer holding at most `capacity` records; `0` means unbounded.
    ///
    /// The bound only drives eviction; storage grows with the records held.
    pub fn new(capacity: usize, reporter: Arc<dyn ErrorReporter>) -> Self {
        RollingBuffer {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
                episode_dropped: 0,
                total_dropped: 0,
            }),
            notify: Notify::new(),
            capacity: NonZeroUsize::new(capacity),
            reporter,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    /// Stores `record`, evicting the oldest record first when the buffer is full.
    pub fn try_insert(&self, record: R) -> InsertOutcome {
        let mut finished_episode = None;
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return InsertOutcome::Rejected;
            }

            let full = self
                .capacity
                .is_some_and(|capacity| state.queue.len() >= capacity.get());
            let outcome = if full {
                state.queue.pop_front();
                state.episode_dropped += 1;
                state.total_dropped += 1;
                InsertOutcome::AcceptedWithEviction
            } else {
                if state.episode_dropped > 0 {
                    finished_episode = Some(std::mem::take(&mut state.episode_dropped));
                }
                InsertOutcome::Accepted
            };
            state.queue.push_back(record);
            outcome
        };

        self.notify.notify_one();
        if let Some(dropped) = finished_episode {
            self.report_dropped(dropped);
        }
        outcome
    }

    /// Waits for the next record.
    ///
    /// Returns `None` once the buffer is closed and empty, or as soon as
    /// `cancel` has fired, even if records remain. Only one task may consume
    /// from a buffer.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<R> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            {
                let mut state = self.lock();
                if let Some(record) = state.queue.pop_front() {
                    return Some(record);
                }
                if state.closed {
                    return None;
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    trace!("Rolling buffer wait cancelled");
                    return None;
                }
                () = self.notify.notified() => {}
            }
        }
    }

    /// Stops accepting records. Buffered records stay drainable.
    pub fn close(&self) {
        let finished_episode = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.episode_dropped)
        };

        self.notify.notify_one();
        if finished_episode > 0 {
            self.report_dropped(finished_episode);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Total number of records evicted since the buffer was created.
    pub fn dropped_total(&self) -> u64 {
        self.lock().total_dropped
    }

    fn report_dropped(&self, dropped: u64) {
        let capacity = self.capacity().unwrap_or_default();
        self.reporter.report(
            Severity::Warn,
            &format!(
                "{dropped} log records have been dropped, rolling buffer size {capacity} has been reached"
            ),
            None,
        );
    }

    // The queue stays consistent even if a holder panicked, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State<R>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
