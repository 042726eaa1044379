//! Isolated browser worker.
//!
//! One process per request: the parent writes a single JSON request to this
//! process's stdin, the worker drives a fresh headless browser, prints
//! exactly one JSON response on stdout, and exits. Logs go to stderr only;
//! stdout belongs to the protocol.
//!
//! The browser-automation runtime is not safely reentrant inside a
//! long-lived host process; this binary's short lifetime is the isolation
//! guarantee.

use std::error::Error;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Stderr-only tracing: stdout carries the single response object.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    info!(bytes = input.len(), "Worker request received");

    let response = tp_benchmark::worker::serve(input.trim()).await;
    println!("{response}");
    Ok(())
}
