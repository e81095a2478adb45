// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use log_shipper::{ErrorReporter, PipelineConfig, Severity};
use mockito::Server;
use std::error::Error;
use std::sync::Mutex;
use std::time::Duration;

/// Reporter that keeps every diagnostic for later assertions
#[derive(Debug, Default)]
pub struct CollectingReporter {
    messages: Mutex<Vec<(Severity, String)>>,
}

impl CollectingReporter {
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .count()
    }
}

impl ErrorReporter for CollectingReporter {
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

/// Connection string pointing at the mock server's `logs` index
pub fn connection_string(server: &Server, extra: &str) -> String {
    let address = server.host_with_port();
    let (host, port) = address
        .split_once(':')
        .expect("mock server address has a port");
    format!("Server={host};Port={port};Index=logs;SkipProxy=true;Timeout=5;{extra}")
}

/// Pipeline settings with short, reproducible retry delays
pub fn fast_retry_config(max_retries: u32) -> PipelineConfig {
    PipelineConfig {
        max_retries,
        retry_seed_delay: Duration::from_millis(10),
        retry_max_delay: Duration::from_millis(50),
        retry_rng_seed: Some(1),
        ..Default::default()
    }
}
