// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retrying wrapper around a single batch send.
//!
//! Failed attempts are retried after decorrelated jitter delays until
//! `max_retries` attempts have been made. The last failure is then returned to
//! the caller; the batch is never requeued.

use std::future::Future;
use std::sync::Arc;

use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backoff::BackoffPolicy;
use crate::error::{DispatchError, TransportError};
use crate::reporter::{ErrorReporter, Severity};

#[derive(Debug)]
pub struct Dispatcher {
    policy: BackoffPolicy,
    rng: StdRng,
    reporter: Arc<dyn ErrorReporter>,
}

impl Dispatcher {
    pub fn new(policy: BackoffPolicy, rng: StdRng, reporter: Arc<dyn ErrorReporter>) -> Self {
        Dispatcher {
            policy,
            rng,
            reporter,
        }
    }

    /// Runs `send` until it succeeds or `max_retries` attempts have failed.
    ///
    /// Returns the number of attempts it took. At least one attempt is always
    /// made. Cancellation aborts both an in-flight attempt and a pending wait.
    pub async fn dispatch<F, Fut>(
        &mut self,
        label: &str,
        mut send: F,
        cancel: &CancellationToken,
    ) -> Result<u32, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let max_retries = self.policy.max_retries;
        let mut delays = self.policy.delays(&mut self.rng);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DispatchError::Cancelled),
                result = send() => result,
            };

            let err = match result {
                Ok(()) => {
                    debug!("{label} delivered after {attempts} attempt(s)");
                    return Ok(attempts);
                }
                Err(err) => err,
            };

            let delay = match delays.next() {
                Some(delay) if attempts < max_retries => delay,
                _ => {
                    return Err(DispatchError::RetriesExhausted {
                        attempts,
                        source: err,
                    })
                }
            };

            self.reporter.report(
                Severity::Warn,
                &format!(
                    "{label} failed on attempt {attempts} of {max_retries}, retrying after {delay:?}"
                ),
                Some(&err),
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DispatchError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
