// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` integration: ships the application's own events.
//!
//! ```rust,ignore
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let pipeline = Arc::new(Pipeline::new(config, sink, Arc::new(TracingReporter)));
//! pipeline.start()?;
//! let subscriber = tracing_subscriber::registry().with(ShippingLayer::new(Arc::clone(&pipeline)));
//! tracing::subscriber::set_global_default(subscriber)?;
//! ```

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::elasticsearch::{ExceptionInfo, LogEvent};
use crate::pipeline::Pipeline;
use crate::sink::Sink;

/// Targets whose events would feed back into the pipeline.
const DEFAULT_IGNORED_TARGETS: [&str; 6] =
    ["log_shipper", "reqwest", "hyper", "h2", "rustls", "mockito"];

pub struct ShippingLayer<S> {
    pipeline: Arc<Pipeline<LogEvent, S>>,
    ignored_targets: Vec<String>,
    machine_ip: Option<IpAddr>,
}

impl<S> ShippingLayer<S> {
    pub fn new(pipeline: Arc<Pipeline<LogEvent, S>>) -> Self {
        ShippingLayer {
            pipeline,
            ignored_targets: DEFAULT_IGNORED_TARGETS
                .iter()
                .map(|target| target.to_string())
                .collect(),
            machine_ip: None,
        }
    }

    /// Stamps every shipped event with `ip`, usually resolved once at startup
    /// with [`crate::elasticsearch::machine_ip`].
    #[must_use]
    pub fn with_machine_ip(mut self, ip: IpAddr) -> Self {
        self.machine_ip = Some(ip);
        self
    }

    /// Also drops events from `target` and its submodules.
    #[must_use]
    pub fn ignore_target(mut self, target: impl Into<String>) -> Self {
        self.ignored_targets.push(target.into());
        self
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|ignored| {
            target
                .strip_prefix(ignored.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

impl<Sub, S> Layer<Sub> for ShippingLayer<S>
where
    Sub: Subscriber,
    S: Sink<LogEvent> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let metadata = event.metadata();
        if self.is_ignored(metadata.target()) {
            return;
        }

        let mut fields = FieldVisitor::default();
        event.record(&mut fields);

        let mut log_event =
            LogEvent::new(metadata.level().to_string(), metadata.target(), fields.message);
        log_event.file_name = metadata.file().map(str::to_string);
        log_event.line_number = metadata.line();
        log_event.module_path = metadata.module_path().map(str::to_string);
        log_event.machine_ip = self.machine_ip;
        log_event.exception = fields.exception;
        log_event.properties = fields.properties;

        self.pipeline.enqueue(log_event);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    exception: Option<ExceptionInfo>,
    properties: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.properties.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        // The first error becomes the exception; any others stay properties.
        if self.exception.is_none() {
            self.exception = Some(ExceptionInfo::from_error(value));
        } else {
            self.record(field, value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }
}
