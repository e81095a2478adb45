// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;

/// Transport that delivers records to the remote store.
///
/// The pipeline only ever holds one call in flight at a time.
#[async_trait]
pub trait Sink<R: Send + Sync>: Send + Sync {
    /// Sends a single record.
    async fn send_one(&self, record: &R) -> Result<(), TransportError>;

    /// Sends several records in one request.
    async fn send_bulk(&self, records: &[R]) -> Result<(), TransportError>;
}

#[async_trait]
impl<R, S> Sink<R> for Arc<S>
where
    R: Send + Sync,
    S: Sink<R> + ?Sized,
{
    async fn send_one(&self, record: &R) -> Result<(), TransportError> {
        self.as_ref().send_one(record).await
    }

    async fn send_bulk(&self, records: &[R]) -> Result<(), TransportError> {
        self.as_ref().send_bulk(records).await
    }
}

/// Sends `batch` through the entry point matching its size: one record goes
/// through [`Sink::send_one`], more through [`Sink::send_bulk`]. An empty
/// batch is not sent at all.
pub async fn deliver<R, S>(sink: &S, batch: &[R]) -> Result<(), TransportError>
where
    R: Send + Sync,
    S: Sink<R> + ?Sized,
{
    match batch {
        [] => Ok(()),
        [record] => sink.send_one(record).await,
        records => sink.send_bulk(records).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, RecordingSink};

    #[tokio::test]
    async fn test_single_record_uses_send_one() {
        let sink = RecordingSink::default();
        deliver::<u32, _>(&sink, &[7]).await.expect("delivery failed");
        assert_eq!(sink.calls(), vec![Call::One(7)]);
    }

    #[tokio::test]
    async fn test_many_records_use_send_bulk() {
        let sink = RecordingSink::default();
        deliver::<u32, _>(&sink, &[1, 2, 3]).await.expect("delivery failed");
        assert_eq!(sink.calls(), vec![Call::Bulk(vec![1, 2, 3])]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_sent() {
        let sink = RecordingSink::default();
        deliver::<u32, _>(&sink, &[]).await.expect("delivery failed");
        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_returned() {
        let sink = Arc::new(RecordingSink::failing(1));
        let result = deliver::<u32, _>(&sink, &[1, 2]).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
        assert!(sink.calls().is_empty());
    }
}
