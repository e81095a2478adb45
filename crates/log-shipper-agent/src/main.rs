// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use log_shipper::elasticsearch::machine_ip;
use log_shipper::{
    AgentConfig, ElasticsearchSink, LogEvent, Pipeline, StopOutcome, TracingReporter,
};

#[tokio::main]
pub async fn main() {
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Unable to start log shipper agent: {e}");
            return;
        }
    };

    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,reqwest=off,{}",
        config.log_level
    );

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let sink = match ElasticsearchSink::from_connection_string(&config.connection_string) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Error creating Elasticsearch sink: {e}");
            return;
        }
    };

    let machine_ip = machine_ip(&config.external_ip_check_address, &TracingReporter);
    debug!("Machine IP resolved to {machine_ip:?}");

    let pipeline = Pipeline::new(config.pipeline.clone(), sink, Arc::new(TracingReporter));
    if let Err(e) = pipeline.start() {
        error!("Error starting log shipping pipeline: {e}");
        return;
    }
    info!("log shipper agent: shipping stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        let mut event = LogEvent::from_line(&line);
                        event.machine_ip = machine_ip;
                        pipeline.enqueue(event);
                    }
                }
                Ok(None) => {
                    debug!("End of input reached");
                    break;
                }
                Err(e) => {
                    error!("Error reading stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    match pipeline.close().await {
        StopOutcome::Drained => info!("All log records shipped"),
        StopOutcome::TimedOut => warn!(
            "Shutdown timeout of {:?} reached before all log records were shipped",
            config.pipeline.on_close_timeout
        ),
        outcome => debug!("Pipeline stop: {outcome:?}"),
    }
}
