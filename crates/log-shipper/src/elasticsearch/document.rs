// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::error::Error;
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::machine::host_name;

/// Document indexed for every shipped log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub time_stamp: String,
    pub message: String,
    pub level: String,
    pub logger_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl LogEvent {
    /// Creates an event stamped with the current time, the calling thread's
    /// name and the host name.
    pub fn new(
        level: impl Into<String>,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::at(Utc::now(), level, logger_name, message)
    }

    pub fn at(
        time: DateTime<Utc>,
        level: impl Into<String>,
        logger_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let timestamp = time.to_rfc3339_opts(SecondsFormat::Micros, true);
        LogEvent {
            time_stamp: timestamp.clone(),
            timestamp,
            message: message.into(),
            level: level.into(),
            logger_name: logger_name.into(),
            thread_name: std::thread::current().name().map(str::to_string),
            host_name: host_name(),
            machine_ip: None,
            file_name: None,
            line_number: None,
            module_path: None,
            exception: None,
            properties: BTreeMap::new(),
        }
    }

    /// An `INFO` event for one line read from standard input.
    pub fn from_line(line: &str) -> Self {
        Self::new("INFO", "stdin", line.trim_end_matches(['\r', '\n']))
    }

    pub fn with_machine_ip(mut self, ip: IpAddr) -> Self {
        self.machine_ip = Some(ip);
        self
    }

    pub fn with_exception(mut self, error: &(dyn Error + 'static)) -> Self {
        self.exception = Some(ExceptionInfo::from_error(error));
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// An error and its chain of sources, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_exception: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        ExceptionInfo {
            message: error.to_string(),
            inner_exception: error.source().map(|source| Box::new(Self::from_error(source))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use chrono::TimeZone;
    use serde_json::json;
    use std::net::Ipv4Addr;

    #[test]
    fn test_serialized_field_names() {
        let time = Utc
            .with_ymd_and_hms(2024, 3, 7, 12, 30, 0)
            .single()
            .expect("valid time");
        let mut event = LogEvent::at(time, "WARN", "billing", "card declined")
            .with_property("order", "42");
        event.thread_name = Some("worker-1".to_string());
        event.host_name = None;
        event.line_number = Some(17);

        let value = serde_json::to_value(&event).expect("serializable");
        assert_eq!(
            value,
            json!({
                "@timestamp": "2024-03-07T12:30:00.000000Z",
                "timeStamp": "2024-03-07T12:30:00.000000Z",
                "message": "card declined",
                "level": "WARN",
                "loggerName": "billing",
                "threadName": "worker-1",
                "lineNumber": 17,
                "properties": { "order": "42" }
            })
        );
    }

    #[test]
    fn test_from_line_strips_line_ending() {
        let event = LogEvent::from_line("service started\r\n");
        assert_eq!(event.message, "service started");
        assert_eq!(event.logger_name, "stdin");
        assert_eq!(event.level, "INFO");
        assert!(event.timestamp.ends_with('Z'));
        assert_eq!(event.timestamp, event.time_stamp);
    }

    #[derive(Debug)]
    struct UploadFailed(TransportError);

    impl std::fmt::Display for UploadFailed {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "upload failed")
        }
    }

    impl Error for UploadFailed {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_machine_ip_and_exception_chain() {
        let error = UploadFailed(TransportError::Request("connection reset".to_string()));
        let mut event = LogEvent::new("ERROR", "uploader", "giving up")
            .with_machine_ip(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
            .with_exception(&error);
        event.host_name = None;
        event.thread_name = None;

        let value = serde_json::to_value(&event).expect("serializable");
        assert_eq!(value["machineIp"], json!("10.1.2.3"));
        assert_eq!(
            value["exception"],
            json!({
                "message": "upload failed",
                "innerException": { "message": "request failed: connection reset" }
            })
        );
    }
}
