// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Failure of a single sink call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The destination answered with a status the sink does not accept
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The request never produced a response (connect, timeout, TLS, ...)
    #[error("request failed: {0}")]
    Request(String),

    /// A record could not be turned into a request body
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}

/// Outcome of a batch dispatch that did not deliver the batch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("batch abandoned after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("dispatch cancelled by shutdown")]
    Cancelled,
}

/// Errors returned by the pipeline lifecycle entry points.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline already started")]
    AlreadyStarted,

    #[error("no tokio runtime available to spawn the batching worker")]
    NoRuntime,
}

/// Errors raised while reading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid connection string: {0}")]
    ConnectionString(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::InvalidConfig("flush trigger size must be positive".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: flush trigger size must be positive"
        );

        let error = TransportError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "unexpected status 500 Internal Server Error: boom"
        );
    }

    #[test]
    fn test_retries_exhausted_keeps_source() {
        use std::error::Error;

        let error = DispatchError::RetriesExhausted {
            attempts: 3,
            source: TransportError::Request("connection refused".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "batch abandoned after 3 attempts: request failed: connection refused"
        );
        let source = error.source().expect("source should be kept");
        assert_eq!(source.to_string(), "request failed: connection refused");
    }

    #[test]
    fn test_error_debug() {
        let error = PipelineError::AlreadyStarted;
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("AlreadyStarted"));
    }
}
