//! Append-Only Log Replay
//!
//! At startup, before the executor exists and before any client can connect,
//! the log is read front to back and every command in it is validated and
//! executed directly against the fresh store. There is no queue and no
//! concurrency at this point: replay owns the store outright.
//!
//! ## Failure Modes
//!
//! | Situation                         | Outcome                              |
//! |-----------------------------------|--------------------------------------|
//! | clean EOF                         | `Ok(count)`                          |
//! | EOF in the middle of a command    | `Ok(count)`, tail ignored, `warn!`   |
//! | malformed frame / invalid command | `Err(RestoreError::InvalidCommand)`  |
//! | read error                        | `Err(RestoreError::Io)`              |
//!
//! A partially written last command is what a crash during an append leaves
//! behind, so it is skipped. Anything else means the log cannot be trusted
//! and the server refuses to start.

use crate::commands::CommandRegistry;
use crate::protocol::{read_frame, RespValue};
use crate::storage::Store;
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

/// Bytes requested from the reader per read.
pub const READ_CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("failed to read the append-only log: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid command in the append-only log at byte {offset}: {reason}")]
    InvalidCommand { offset: u64, reason: String },
}

/// Replays every command in `reader` into `store`, in order.
///
/// Returns the number of commands executed.
///
/// # Example
///
/// ```
/// use ledgerkv::commands::CommandRegistry;
/// use ledgerkv::executor::restore_from_archive;
/// use ledgerkv::storage::{InMemoryStore, Store, SystemClock};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let clock = Arc::new(SystemClock);
/// let registry = CommandRegistry::new(clock.clone());
/// let mut store = InMemoryStore::new(clock);
///
/// let mut log: &[u8] = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n";
/// let replayed = restore_from_archive(&mut log, &mut store, &registry).await.unwrap();
///
/// assert_eq!(replayed, 1);
/// assert!(store.exists(b"k"));
/// # });
/// ```
pub async fn restore_from_archive<R>(
    reader: &mut R,
    store: &mut dyn Store,
    registry: &CommandRegistry,
) -> Result<usize, RestoreError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut offset: u64 = 0;
    let mut replayed = 0;

    loop {
        while let Some((frame, consumed)) = read_frame(&buffer) {
            let request = buffer.split_to(consumed).freeze();

            let command = registry
                .validate(frame, request)
                .map_err(|reply| RestoreError::InvalidCommand {
                    offset,
                    reason: describe(reply),
                })?;
            command.execute(store);

            offset += consumed as u64;
            replayed += 1;
        }

        buffer.reserve(READ_CHUNK_SIZE);
        let n = reader.read_buf(&mut buffer).await?;
        if n == 0 {
            break;
        }
        debug!(bytes = n, buffered = buffer.len(), "Read append-only log chunk");
    }

    if !buffer.is_empty() {
        warn!(
            offset = offset,
            trailing_bytes = buffer.len(),
            "Ignoring incomplete command at the end of the append-only log"
        );
    }

    info!(commands = replayed, bytes = offset, "Append-only log replayed");
    Ok(replayed)
}

fn describe(reply: RespValue) -> String {
    match reply {
        RespValue::Error(message) => message,
        other => other.to_string(),
    }
}
