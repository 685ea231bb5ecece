/*!
 * Background Refresh Loop
 * Cooperative cancellation: a stop request is honoured between iterations
 */

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bluetooth::RefreshReport;
use crate::error::{BluetoothError, Result};

pub(crate) struct AutoRefresh {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl AutoRefresh {
    pub(crate) fn spawn<F, Fut>(interval: Duration, mut refresh: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<RefreshReport>> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();

        let handle = tokio::spawn(async move {
            info!("Auto-refresh started");
            let mut iterations: u64 = 0;

            while !cancel_token_for_task.is_cancelled() {
                iterations += 1;

                // Each cycle runs as its own task so a panic is contained to one iteration.
                match tokio::spawn(refresh()).await {
                    Ok(Ok(report)) => debug!("Refresh #{} complete: {:?}", iterations, report),
                    Ok(Err(e)) => error!("Refresh #{} failed: {}", iterations, e),
                    Err(e) => error!("Refresh #{} aborted: {}", iterations, e),
                }

                if interval.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::select! {
                        _ = cancel_token_for_task.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }

            info!("Auto-refresh stopped after {} iterations", iterations);
        });

        Self {
            cancel_token,
            handle,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the loop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Signals the loop and waits up to `wait` for it to exit. An in-flight
    /// refresh is allowed to finish.
    pub(crate) async fn stop(self, wait: Duration) -> Result<()> {
        info!("Stopping auto-refresh...");
        self.cancel_token.cancel();

        match tokio::time::timeout(wait, self.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Auto-refresh task ended with a join error: {}", e);
                Ok(())
            }
            Err(_) => {
                warn!("Auto-refresh did not stop within {:?}", wait);
                Err(BluetoothError::StopTimeout(wait))
            }
        }
    }
}
