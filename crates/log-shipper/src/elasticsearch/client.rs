// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{ClientBuilder, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, trace};

use super::connection_string::ElasticsearchConfig;
use super::uri::ElasticsearchUri;
use crate::error::{ConfigError, TransportError};
use crate::sink::Sink;

const JSON_CONTENT_TYPE: &str = "application/json";
const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
const BULK_ACTION: &[u8] = br#"{"index":{}}"#;

/// [`Sink`] writing documents to Elasticsearch over HTTP.
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    client: reqwest::Client,
    uri: ElasticsearchUri,
    credentials: Option<(String, String)>,
}

impl ElasticsearchSink {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, ConfigError> {
        Ok(ElasticsearchSink {
            client: build_client(config)?,
            uri: ElasticsearchUri::new(config)?,
            credentials: config
                .credentials()
                .map(|(user, password)| (user.to_string(), password.to_string())),
        })
    }

    pub fn from_connection_string(connection_string: &str) -> Result<Self, ConfigError> {
        Self::new(&ElasticsearchConfig::from_connection_string(connection_string)?)
    }

    async fn post(
        &self,
        url: Url,
        content_type: &'static str,
        body: Vec<u8>,
        accepted: &[StatusCode],
    ) -> Result<(), TransportError> {
        trace!("POST {} bytes to {url}", body.len());
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if accepted.contains(&status) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        debug!("Elasticsearch answered {status}: {body}");
        Err(TransportError::Status { status, body })
    }
}

#[async_trait]
impl<R> Sink<R> for ElasticsearchSink
where
    R: Serialize + Send + Sync,
{
    async fn send_one(&self, record: &R) -> Result<(), TransportError> {
        let body = serde_json::to_vec(record)?;
        let url = self.uri.document(Utc::now().date_naive());
        self.post(url, JSON_CONTENT_TYPE, body, &[StatusCode::CREATED])
            .await
    }

    async fn send_bulk(&self, records: &[R]) -> Result<(), TransportError> {
        let body = bulk_body(records)?;
        let url = self.uri.bulk(Utc::now().date_naive());
        self.post(
            url,
            NDJSON_CONTENT_TYPE,
            body,
            &[StatusCode::OK, StatusCode::CREATED],
        )
        .await
    }
}

/// One `index` action line followed by the document line, per record.
fn bulk_body<R: Serialize>(records: &[R]) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    for record in records {
        body.extend_from_slice(BULK_ACTION);
        body.push(b'\n');
        body.extend_from_slice(&serde_json::to_vec(record)?);
        body.push(b'\n');
    }
    Ok(body)
}

fn build_client(config: &ElasticsearchConfig) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder().timeout(config.timeout);

    if config.skip_certificate_validation {
        builder = accept_invalid_certs(builder)?;
    }

    if config.skip_proxy {
        builder = builder.no_proxy();
    } else if let Some(proxy) = &config.http_proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| {
            ConfigError::ConnectionString(format!("invalid HttpProxy '{proxy}': {e}"))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ConfigError::InvalidConfig(format!("Unable to build HTTP client: {e}")))
}

#[cfg(feature = "rustls-tls")]
fn accept_invalid_certs(builder: ClientBuilder) -> Result<ClientBuilder, ConfigError> {
    Ok(builder.danger_accept_invalid_certs(true))
}

#[cfg(not(feature = "rustls-tls"))]
fn accept_invalid_certs(_builder: ClientBuilder) -> Result<ClientBuilder, ConfigError> {
    Err(ConfigError::ConnectionString(
        "SkipCertificateValidation requires the rustls-tls feature".to_string(),
    ))
}
