// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single consumer of the rolling buffer.
//!
//! A batch is flushed as soon as the buffer runs dry or the batch reaches the
//! flush trigger size. Light traffic therefore ships almost in real time in
//! small batches, heavy traffic in batches capped at the trigger size.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::reporter::{ErrorReporter, Severity};
use crate::rolling_buffer::RollingBuffer;
use crate::sink::{self, Sink};

pub struct Batcher<R, S> {
    buffer: Arc<RollingBuffer<R>>,
    sink: S,
    dispatcher: Dispatcher,
    flush_trigger_size: usize,
    reporter: Arc<dyn ErrorReporter>,
}

impl<R, S> Batcher<R, S>
where
    R: Send + Sync,
    S: Sink<R>,
{
    pub fn new(
        buffer: Arc<RollingBuffer<R>>,
        sink: S,
        dispatcher: Dispatcher,
        flush_trigger_size: usize,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Batcher {
            buffer,
            sink,
            dispatcher,
            flush_trigger_size: flush_trigger_size.max(1),
            reporter,
        }
    }

    /// Drains the buffer until it is closed and empty, or until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!("Batcher started");
        let mut batch = Vec::with_capacity(self.flush_trigger_size);

        while let Some(record) = self.buffer.next(&cancel).await {
            batch.push(record);
            if self.buffer.is_empty() || batch.len() >= self.flush_trigger_size {
                self.flush(&mut batch, &cancel).await;
            }
        }

        if cancel.is_cancelled() {
            let buffered = self.buffer.len();
            if !batch.is_empty() || buffered > 0 {
                self.reporter.report(
                    Severity::Error,
                    &format!(
                        "Shutdown timeout reached, abandoning {} batched and {buffered} buffered log records",
                        batch.len()
                    ),
                    None,
                );
            }
        } else if !batch.is_empty() {
            self.flush(&mut batch, &cancel).await;
        }

        debug!("Batcher stopped");
    }

    async fn flush(&mut self, batch: &mut Vec<R>, cancel: &CancellationToken) {
        let label = format!("Batch of {} log records", batch.len());
        let sink = &self.sink;
        let records = batch.as_slice();

        let result = self
            .dispatcher
            .dispatch(&label, || sink::deliver(sink, records), cancel)
            .await;

        match result {
            Ok(_) => {}
            Err(err @ DispatchError::RetriesExhausted { .. }) => {
                self.reporter
                    .report(Severity::Error, &format!("{label} was dropped"), Some(&err));
            }
            Err(DispatchError::Cancelled) => {
                self.reporter.report(
                    Severity::Error,
                    &format!("{label} was abandoned by shutdown"),
                    None,
                );
            }
        }

        batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::test_utils::{Call, RecordingReporter, RecordingSink};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    struct Harness {
        buffer: Arc<RollingBuffer<u32>>,
        sink: Arc<RecordingSink>,
        reporter: Arc<RecordingReporter>,
    }

    impl Harness {
        fn new(sink: RecordingSink) -> Self {
            let reporter = Arc::new(RecordingReporter::default());
            Harness {
                buffer: Arc::new(RollingBuffer::new(0, reporter.clone())),
                sink: Arc::new(sink),
                reporter,
            }
        }

        fn batcher(&self, flush_trigger_size: usize, max_retries: u32) -> Batcher<u32, Arc<RecordingSink>> {
            let policy = BackoffPolicy {
                max_retries,
                seed_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(100),
            };
            let dispatcher =
                Dispatcher::new(policy, StdRng::seed_from_u64(5), self.reporter.clone());
            Batcher::new(
                Arc::clone(&self.buffer),
                Arc::clone(&self.sink),
                dispatcher,
                flush_trigger_size,
                self.reporter.clone(),
            )
        }
    }

    #[tokio::test]
    async fn test_burst_is_split_at_trigger_size() {
        let harness = Harness::new(RecordingSink::default());
        let trigger = 4;
        for i in 0..(trigger as u32 * 3 + 2) {
            harness.buffer.try_insert(i);
        }
        harness.buffer.close();

        harness
            .batcher(trigger, 3)
            .run(CancellationToken::new())
            .await;

        assert_eq!(harness.sink.batch_sizes(), vec![4, 4, 4, 2]);
        assert_eq!(harness.sink.delivered(), (0..14).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_single_record_goes_through_send_one() {
        let harness = Harness::new(RecordingSink::default());
        harness.buffer.try_insert(9);
        harness.buffer.close();

        harness
            .batcher(256, 3)
            .run(CancellationToken::new())
            .await;

        assert_eq!(harness.sink.calls(), vec![Call::One(9)]);
    }

    #[tokio::test]
    async fn test_trickle_produces_small_batches() {
        let harness = Harness::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(harness.batcher(256, 3).run(cancel.clone()));

        for i in 0..3 {
            harness.buffer.try_insert(i);
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        harness.buffer.close();
        worker.await.expect("batcher task failed");

        assert_eq!(
            harness.sink.calls(),
            vec![Call::One(0), Call::One(1), Call::One(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_batch_is_reported_and_skipped() {
        let harness = Harness::new(RecordingSink::failing(2));
        harness.buffer.try_insert(1);
        harness.buffer.try_insert(2);
        harness.buffer.close();

        harness.batcher(256, 2).run(CancellationToken::new()).await;

        assert_eq!(harness.sink.attempts(), 2);
        assert!(harness.sink.calls().is_empty());
        assert_eq!(harness.reporter.count_containing("was dropped"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_batches_still_flow_after_a_dropped_one() {
        let harness = Harness::new(RecordingSink::failing(1));
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(harness.batcher(256, 1).run(cancel.clone()));

        harness.buffer.try_insert(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        harness.buffer.try_insert(2);
        harness.buffer.close();
        worker.await.expect("batcher task failed");

        assert_eq!(harness.sink.delivered(), vec![2]);
        assert_eq!(harness.reporter.count_containing("was dropped"), 1);
    }

    #[tokio::test]
    async fn test_cancelled_worker_reports_abandoned_records() {
        let harness = Harness::new(RecordingSink::default());
        for i in 0..5 {
            harness.buffer.try_insert(i);
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        harness.batcher(2, 3).run(cancel).await;

        assert!(harness.sink.calls().is_empty());
        assert_eq!(harness.reporter.count_containing("abandoning 0 batched and 5 buffered"), 1);
    }
}
