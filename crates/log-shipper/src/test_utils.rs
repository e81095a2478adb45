// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared fakes for unit tests.

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::reporter::{ErrorReporter, Severity};
use crate::sink::Sink;

/// Reporter that keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingReporter {
    pub(crate) fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn count_containing(&self, needle: &str) -> usize {
        self.messages()
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .count()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>) {
        let message = match cause {
            Some(cause) => format!("{message}: {cause}"),
            None => message.to_string(),
        };
        self.messages
            .lock()
            .expect("lock poisoned")
            .push((severity, message));
    }
}

/// Which sink entry point a batch went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    One(u32),
    Bulk(Vec<u32>),
}

/// Sink that records calls and fails the first `failures` of them.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    calls: Mutex<Vec<Call>>,
    attempts: AtomicUsize,
    failures: usize,
}

impl RecordingSink {
    pub(crate) fn failing(failures: usize) -> Self {
        RecordingSink {
            failures,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Records that reached the sink successfully, in delivery order.
    pub(crate) fn delivered(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .flat_map(|call| match call {
                Call::One(record) => vec![record],
                Call::Bulk(records) => records,
            })
            .collect()
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.calls()
            .iter()
            .map(|call| match call {
                Call::One(_) => 1,
                Call::Bulk(records) => records.len(),
            })
            .collect()
    }

    fn attempt(&self, call: Call) -> Result<(), TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(TransportError::Request(format!("attempt {attempt} refused")));
        }
        self.calls.lock().expect("lock poisoned").push(call);
        Ok(())
    }
}

#[async_trait]
impl Sink<u32> for RecordingSink {
    async fn send_one(&self, record: &u32) -> Result<(), TransportError> {
        self.attempt(Call::One(*record))
    }

    async fn send_bulk(&self, records: &[u32]) -> Result<(), TransportError> {
        self.attempt(Call::Bulk(records.to_vec()))
    }
}

/// Sink whose calls never complete.
#[derive(Debug, Default)]
pub(crate) struct HangingSink;

#[async_trait]
impl Sink<u32> for HangingSink {
    async fn send_one(&self, _record: &u32) -> Result<(), TransportError> {
        std::future::pending().await
    }

    async fn send_bulk(&self, _records: &[u32]) -> Result<(), TransportError> {
        std::future::pending().await
    }
}

/// Sink that blocks its thread for the given duration, ignoring cancellation.
#[derive(Debug)]
pub(crate) struct BlockingSink(pub(crate) Duration);

#[async_trait]
impl Sink<u32> for BlockingSink {
    async fn send_one(&self, _record: &u32) -> Result<(), TransportError> {
        std::thread::sleep(self.0);
        Ok(())
    }

    async fn send_bulk(&self, _records: &[u32]) -> Result<(), TransportError> {
        std::thread::sleep(self.0);
        Ok(())
    }
}

/// Sink that panics on every call.
#[derive(Debug, Default)]
pub(crate) struct PanickingSink;

#[async_trait]
impl Sink<u32> for PanickingSink {
    async fn send_one(&self, _record: &u32) -> Result<(), TransportError> {
        panic!("sink exploded");
    }

    async fn send_bulk(&self, _records: &[u32]) -> Result<(), TransportError> {
        panic!("sink exploded");
    }
}
