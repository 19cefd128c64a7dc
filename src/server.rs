//! TCP accept loop.

use crate::commands::CommandRegistry;
use crate::connection::{handle_connection, ConnectionStats};
use crate::executor::ExecutorHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::error;

/// Pause after the first failed accept.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Longest pause between failed accepts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Accepts connections forever, one task per client.
///
/// Every connection shares the registry and submits to the same executor.
/// Accept errors (for example running out of file descriptors) back off
/// exponentially until an accept succeeds again.
pub async fn accept_loop(
    listener: TcpListener,
    registry: Arc<CommandRegistry>,
    executor: ExecutorHandle,
    stats: Arc<ConnectionStats>,
) {
    let mut backoff = ACCEPT_BACKOFF_MIN;

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                backoff = ACCEPT_BACKOFF_MIN;

                if let Err(e) = stream.set_nodelay(true) {
                    error!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                }

                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    Arc::clone(&registry),
                    executor.clone(),
                    Arc::clone(&stats),
                ));
            }
            Err(e) => {
                error!(
                    error = %e,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Failed to accept connection"
                );
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(ACCEPT_BACKOFF_MAX)
}
