// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Operational diagnostics sink for the pipeline.
//!
//! Everything that goes wrong inside the pipeline (dropped records, retried
//! sends, abandoned batches, a dead worker) is reported here and never on the
//! producer call path.

use std::error::Error;
use std::fmt::Debug;

use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
}

/// Fire-and-forget receiver of pipeline diagnostics.
///
/// Implementations must not panic and must not block for long: `report` is
/// called from producer threads (drop warnings) as well as from the worker.
pub trait ErrorReporter: Send + Sync + Debug {
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>);
}

/// Reporter that forwards diagnostics to `tracing`.
///
/// Events are emitted under the `log_shipper` target so that a
/// [`crate::layer::ShippingLayer`] installed in the same subscriber ignores them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>) {
        match (severity, cause) {
            (Severity::Warn, Some(cause)) => warn!(target: "log_shipper", "{message}: {cause}"),
            (Severity::Warn, None) => warn!(target: "log_shipper", "{message}"),
            (Severity::Error, Some(cause)) => error!(target: "log_shipper", "{message}: {cause}"),
            (Severity::Error, None) => error!(target: "log_shipper", "{message}"),
        }
    }
}
