// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use reqwest::Url;

use super::connection_string::ElasticsearchConfig;
use crate::error::ConfigError;

const DEFAULT_DOCUMENT_TYPE: &str = "_doc";

/// Builds request addresses for one index.
///
/// Addresses are rebuilt for every request so that a rolling index follows
/// the date.
#[derive(Debug, Clone)]
pub struct ElasticsearchUri {
    base: Url,
    index: String,
    rolling: bool,
    document_type: String,
    routing: Option<String>,
    pipeline: Option<String>,
}

impl ElasticsearchUri {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, ConfigError> {
        let authority = match config.port {
            Some(port) => format!("{}:{port}", config.server),
            None => config.server.clone(),
        };
        let base = Url::parse(&format!("{}://{authority}/", config.scheme)).map_err(|e| {
            ConfigError::ConnectionString(format!("invalid server address '{authority}': {e}"))
        })?;

        Ok(ElasticsearchUri {
            base,
            index: config.index.clone(),
            rolling: config.rolling,
            document_type: config.document_type.clone(),
            routing: config.routing.clone(),
            pipeline: config.pipeline.clone(),
        })
    }

    /// Index name for documents written on `date`.
    pub fn index_name(&self, date: NaiveDate) -> String {
        if self.rolling {
            format!("{}-{}", self.index, date.format("%Y.%m.%d"))
        } else {
            self.index.clone()
        }
    }

    /// Address of the single-document API.
    pub fn document(&self, date: NaiveDate) -> Url {
        let path = format!("/{}/{}", self.index_name(date), self.document_type);
        self.with_path(&path)
    }

    /// Address of the bulk API.
    pub fn bulk(&self, date: NaiveDate) -> Url {
        let index = self.index_name(date);
        let path = if self.document_type == DEFAULT_DOCUMENT_TYPE {
            format!("/{index}/_bulk")
        } else {
            format!("/{index}/{}/_bulk", self.document_type)
        };
        self.with_path(&path)
    }

    fn with_path(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        if self.routing.is_some() || self.pipeline.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(routing) = &self.routing {
                query.append_pair("routing", routing);
            }
            if let Some(pipeline) = &self.pipeline {
                query.append_pair("pipeline", pipeline);
            }
        }
        url
    }
}
