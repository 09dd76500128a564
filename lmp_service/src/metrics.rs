// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics endpoint, served on its own port.

use axum::{routing::get, Router};
use prometheus::TextEncoder;
use tokio::net::TcpListener;

async fn handler_metrics() -> String {
    TextEncoder::new()
        .encode_to_string(&prometheus::gather())
        .unwrap_or_else(|err| {
            log::error!("failed to encode metrics: {err}");
            String::new()
        })
}

/// Runs the metrics server until the process exits.
pub async fn run_server(port: u16) {
    let router = Router::new().route("/metrics", get(handler_metrics));

    let listener = match TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("failed to bind metrics server on port {port}: {err}");
            return;
        }
    };
    if let Err(err) = axum::serve(listener, router).await {
        log::error!("metrics server error: {err}");
    }
}
