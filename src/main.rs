use anyhow::{Context, Result, bail};
use insight_forwarder::{
    config::Settings,
    event::Event,
    pipeline::{Forwarder, build_forwarder},
};
use std::{future::Future, time::Duration};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env().context("Failed to load settings")?;
    set_up_tracing(settings.debug)?;
    info!("Starting insight-forwarder {}", env!("CARGO_PKG_VERSION"));

    let forwarder = build_forwarder(&settings).context("Failed to construct forwarder")?;
    if forwarder.connect() || settings.debug {
        info!("Forwarder ready, reading events from stdin");
    } else {
        bail!("Failed connecting to the ingestion endpoint, check settings and try again");
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Signal received, draining");
        }
    };
    forward_until_shutdown(
        BufReader::new(tokio::io::stdin()),
        &*forwarder,
        shutdown,
        settings.drain_timeout,
    )
    .await
}

/// Forwards `input` until it ends, fails or `shutdown` completes, then drains.
/// The drain runs even when reading fails, so accepted events are still flushed.
async fn forward_until_shutdown<R>(
    input: R,
    forwarder: &(dyn Forwarder + Send + Sync),
    shutdown: impl Future<Output = ()>,
    drain_timeout: Duration,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let forwarded = tokio::select! {
        result = forward_lines(input, forwarder) => result,
        _ = shutdown => Ok(()),
    };

    let report = forwarder.drain(drain_timeout).await;
    info!(
        discarded = report.discarded,
        timed_out = report.timed_out,
        "Shutdown complete"
    );
    forwarded
}

/// Reads one JSON event per line, e.g. `{"fields": {"org": "acme"}, "message": "hello"}`.
/// Lines are taken as raw bytes so invalid UTF-8 is skipped like any other malformed line.
async fn forward_lines<R>(mut input: R, forwarder: &(dyn Forwarder + Send + Sync)) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = input
            .read_until(b'\n', &mut line)
            .await
            .context("Failed to read input")?;
        if read == 0 {
            return Ok(());
        }
        if line.trim_ascii().is_empty() {
            continue;
        }
        match serde_json::from_slice::<Event>(&line) {
            Ok(event) => forwarder.submit(event.fields, event.message).await,
            Err(err) => warn!("Skipping malformed input line: {err}"),
        }
    }
}

fn set_up_tracing(debug: bool) -> Result<()> {
    #[cfg(windows)]
    let with_color = nu_ansi_term::enable_ansi_support().is_ok();
    #[cfg(not(windows))]
    let with_color = true;

    let default_level = if debug || cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let fmt_layer = fmt::layer().with_ansi(with_color).with_target(false);
    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}
