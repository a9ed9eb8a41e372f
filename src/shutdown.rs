//! Stop requests for `sync`.
//!
//! A stop request never interrupts a record midway: archive copies and ledger
//! rows for that record are written together, and its staged downloads are
//! removed before the pass returns. The pass polls the token before picking
//! up the next record and reports itself as interrupted. In watch mode the
//! wait between passes ends immediately.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

/// Token cancelled by the first Ctrl+C, SIGTERM or SIGHUP.
///
/// Cron-style deployments send SIGTERM on timeout; an operator at a terminal
/// can press Ctrl+C twice to exit at once with status 130.
pub(crate) fn install_signal_handler() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let count = Arc::new(AtomicU32::new(0));

    #[cfg(unix)]
    let (mut sigterm, mut sighup) = {
        use tokio::signal::unix::{signal, SignalKind};
        (
            signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?,
            signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?,
        )
    };

    let handler_token = token.clone();
    tokio::spawn(async move {
        loop {
            #[cfg(unix)]
            {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                    _ = sighup.recv() => {}
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Cannot listen for Ctrl+C, shutdown signals disabled");
                    return;
                }
            }

            let prev = count.fetch_add(1, Ordering::SeqCst);
            if prev == 0 {
                tracing::info!("Stop requested, finishing the current record before exiting");
                tracing::info!("Press Ctrl+C again to exit immediately");
                handler_token.cancel();
            } else {
                tracing::warn!("Second stop request, exiting without cleanup");
                std::process::exit(130);
            }
        }
    });

    Ok(token)
}
