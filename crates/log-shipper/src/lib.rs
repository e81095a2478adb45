// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Non-blocking log shipping.
//!
//! Producers hand records to a [`Pipeline`], which buffers them in a bounded
//! rolling buffer, batches them on a single background task and delivers each
//! batch to a [`Sink`] with jittered retries. [`ElasticsearchSink`] ships to
//! Elasticsearch and [`ShippingLayer`] feeds `tracing` events into a pipeline.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod backoff;
pub mod batcher;
pub mod config;
pub mod dispatcher;
pub mod elasticsearch;
pub mod error;
pub mod layer;
pub mod pipeline;
pub mod reporter;
pub mod rolling_buffer;
pub mod sink;

#[cfg(test)]
mod test_utils;

pub use config::{AgentConfig, PipelineConfig};
pub use elasticsearch::{ElasticsearchSink, ExceptionInfo, LogEvent};
pub use error::{ConfigError, DispatchError, PipelineError, TransportError};
pub use layer::ShippingLayer;
pub use pipeline::{Pipeline, PipelineState, StopOutcome};
pub use reporter::{ErrorReporter, Severity, TracingReporter};
pub use sink::Sink;
