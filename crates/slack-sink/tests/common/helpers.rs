// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use slack_sink::config::SinkConfigBuilder;
use slack_sink::sink::SlackSink;
use std::time::Duration;
use tokio::time::{sleep, timeout};

pub const WEBHOOK_URL: &str = "https://hooks.slack.com/services/T000/B000/XXXX";

/// Config builder that flushes every 10 ms, one record per batch
pub fn fast_config(url: &str) -> SinkConfigBuilder {
    SinkConfigBuilder::new(url)
        .batch_size_limit(1)
        .period(Duration::from_millis(10))
}

/// Wait until `condition` holds, polling every 5 ms for at most 2 s
#[allow(dead_code)]
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Dispose the sink, failing the test if draining hangs
pub async fn dispose(sink: &SlackSink) {
    timeout(Duration::from_secs(5), sink.dispose())
        .await
        .expect("sink did not finish draining");
}
