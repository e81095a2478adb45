// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `Key=Value;` connection strings.
//!
//! Keys are case-insensitive. A value wrapped in braces is taken verbatim, so
//! it may contain `;` and `=`:
//!
//! ```text
//! Scheme=https;Server=es.local;Port=9200;Index=app;Rolling=true;Pwd={s3cr;et}
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_DOCUMENT_TYPE: &str = "_doc";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw key/value pairs of a connection string, keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    parts: HashMap<String, String>,
}

impl ConnectionString {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut parts = HashMap::new();
        for segment in split_segments(input)? {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                ConfigError::ConnectionString(format!("'{segment}' is not a Key=Value pair"))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::ConnectionString(format!(
                    "'{segment}' has an empty key"
                )));
            }
            parts.insert(key.to_lowercase(), unquote(value.trim()).to_string());
        }
        Ok(ConnectionString { parts })
    }

    /// Value of `key`, treating empty values as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parts
            .get(&key.to_lowercase())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(false),
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConfigError::ConnectionString(format!("'{value}' is not a boolean for {key}"))
            }),
        }
    }

    fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| ConfigError::ConnectionString(format!("{key} is required")))
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }
}

impl FromStr for ConnectionString {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

/// Typed view of an Elasticsearch connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticsearchConfig {
    pub scheme: String,
    pub server: String,
    pub port: Option<u16>,
    pub index: String,
    /// Appends the current UTC date to the index name
    pub rolling: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub routing: Option<String>,
    /// Ingest pipeline applied to every document
    pub pipeline: Option<String>,
    pub document_type: String,
    pub skip_certificate_validation: bool,
    pub skip_proxy: bool,
    pub http_proxy: Option<String>,
    pub timeout: Duration,
}

impl ElasticsearchConfig {
    pub fn from_connection_string(input: &str) -> Result<Self, ConfigError> {
        let parts = ConnectionString::parse(input)?;

        let port = parts
            .get("Port")
            .map(|port| {
                port.parse::<u16>().map_err(|_| {
                    ConfigError::ConnectionString(format!("'{port}' is not a valid port"))
                })
            })
            .transpose()?;
        let timeout = parts
            .get("Timeout")
            .map(|secs| {
                secs.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    ConfigError::ConnectionString(format!("'{secs}' is not a timeout in seconds"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_TIMEOUT);

        Ok(ElasticsearchConfig {
            scheme: parts
                .optional("Scheme")
                .unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
            server: parts.require("Server")?,
            port,
            index: parts.require("Index")?,
            rolling: parts.get_bool("Rolling")?,
            user: parts.optional("User"),
            password: parts.optional("Pwd"),
            routing: parts.optional("Routing"),
            pipeline: parts.optional("Pipeline"),
            document_type: parts
                .optional("Type")
                .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string()),
            skip_certificate_validation: parts.get_bool("SkipCertificateValidation")?,
            skip_proxy: parts.get_bool("SkipProxy")?,
            http_proxy: parts.optional("HttpProxy"),
            timeout,
        })
    }

    /// User and password, when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

impl FromStr for ElasticsearchConfig {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::from_connection_string(input)
    }
}

fn split_segments(input: &str) -> Result<Vec<&str>, ConfigError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ConfigError::ConnectionString(format!("unbalanced '}}' at offset {i}"))
                })?
            }
            ';' if depth == 0 => {
                segments.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ConfigError::ConnectionString(
            "unterminated '{' in connection string".to_string(),
        ));
    }
    segments.push(&input[start..]);
    Ok(segments)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(value)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
