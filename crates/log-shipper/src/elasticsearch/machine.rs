// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host identification stamped on shipped documents.

use std::env;
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::reporter::{ErrorReporter, Severity};

/// Address used to pick the outbound interface when none is configured.
pub const DEFAULT_EXTERNAL_IP_CHECK_ADDRESS: &str = "8.8.8.8";

/// Get the host name
///
/// Tries, in order:
/// 1. HOSTNAME environment variable
/// 2. COMPUTERNAME environment variable
/// 3. System host name via `hostname::get()`
#[must_use]
pub fn host_name() -> Option<String> {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| env::var(key).ok().filter(|name| !name.is_empty()))
        .or_else(|| {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
                .filter(|name| !name.is_empty())
        })
}

/// Local address of the interface that routes to `check_address`.
///
/// Connecting a UDP socket sends nothing; it only selects a route. Failures
/// are reported and yield `None`.
pub fn machine_ip(check_address: &str, reporter: &dyn ErrorReporter) -> Option<IpAddr> {
    match outbound_address(check_address) {
        Ok(ip) => Some(ip),
        Err(e) => {
            reporter.report(
                Severity::Error,
                "Failed to get IP address of the local machine",
                Some(&e),
            );
            None
        }
    }
}

fn outbound_address(check_address: &str) -> io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((check_address, 80))?;
    Ok(socket.local_addr()?.ip())
}
