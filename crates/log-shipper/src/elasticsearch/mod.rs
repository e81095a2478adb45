// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Elasticsearch destination: connection string parsing, request addresses,
//! host identification, the indexed document and the HTTP sink.

pub mod client;
pub mod connection_string;
pub mod document;
pub mod machine;
pub mod uri;

pub use client::ElasticsearchSink;
pub use connection_string::{ConnectionString, ElasticsearchConfig};
pub use document::{ExceptionInfo, LogEvent};
pub use machine::{host_name, machine_ip, DEFAULT_EXTERNAL_IP_CHECK_ADDRESS};
pub use uri::ElasticsearchUri;
