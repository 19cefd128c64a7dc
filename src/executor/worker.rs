//! Single-Writer Command Executor
//!
//! All access to the store goes through one Tokio task that drains a bounded
//! queue. Connections submit commands and await a per-command reply channel;
//! a ticker task submits periodic expiry scans into the same queue.
//!
//! ```text
//!  connection ──Execute{cmd, reply}──┐
//!  connection ──Execute{cmd, reply}──┤      bounded mpsc (1000)
//!  ticker ─────────RunScan (100ms)───┴──> [ m | m | m | ... ] ──> worker task
//!                                                                   │
//!                           ┌───────────────────────────────────────┤
//!                           ▼                                       ▼
//!                  archive.write_all(request)              scanner.scan(store)
//!                  archive.flush()                         (RunScan only)
//!                           │
//!                           ▼
//!                  command.execute(&mut store) ──> reply.send(...)
//! ```
//!
//! ## Ordering
//!
//! Store operations happen in exactly the order messages leave the queue. An
//! update command's request bytes are appended and flushed before the command
//! runs, and before the next message is taken, so the log is a prefix-exact
//! record of every mutation the store has seen.
//!
//! ## Backpressure
//!
//! The queue is the only flow control. When it is full, `send` waits, which
//! stalls the submitting connection (and the ticker) until the worker catches
//! up.
//!
//! ## Failure
//!
//! A failed log append stops the worker: the store must never get ahead of
//! the log. The command that hit the failure gets [`ExecutorError::Archive`];
//! everything submitted afterwards gets [`ExecutorError::Closed`].

use crate::commands::Command;
use crate::protocol::RespValue;
use crate::storage::{ExpiryScanner, ScannerConfig, Store};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// Messages the worker accepts before blocking senders (default).
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// How often the ticker asks for an expiry scan (default).
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Destination for archived update commands.
pub type ArchiveWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Errors a submitter can get back instead of a reply.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Appending the command to the log failed; the worker has stopped.
    #[error("append-only log write failed: {0}")]
    Archive(#[from] std::io::Error),

    /// The worker is not running any more.
    #[error("executor is not running")]
    Closed,
}

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Capacity of the command queue (default: 1000)
    pub queue_capacity: usize,

    /// Interval between expiry scans (default: 100ms)
    pub scan_interval: Duration,

    /// Sampling parameters for each scan
    pub scanner: ScannerConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            scanner: ScannerConfig::default(),
        }
    }
}

type Reply = oneshot::Sender<Result<RespValue, ExecutorError>>;

enum Message {
    RunScan,
    Execute { command: Command, reply: Reply },
}

/// Cheap, cloneable submission handle. One per connection.
#[derive(Debug, Clone)]
pub struct ExecutorHandle {
    sender: mpsc::Sender<Message>,
}

impl ExecutorHandle {
    /// Queues `command` and waits for its reply.
    ///
    /// Waits for queue space first if the queue is full.
    pub async fn execute(&self, command: Command) -> Result<RespValue, ExecutorError> {
        let (reply, response) = oneshot::channel();

        self.sender
            .send(Message::Execute { command, reply })
            .await
            .map_err(|_| ExecutorError::Closed)?;

        response.await.map_err(|_| ExecutorError::Closed)?
    }
}

/// The running executor: worker task, ticker task and the shutdown signal.
#[derive(Debug)]
pub struct Executor {
    handle: ExecutorHandle,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl Executor {
    /// Takes ownership of `store` and `archive` and starts both tasks.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ledgerkv::executor::{Executor, ExecutorConfig};
    /// use ledgerkv::storage::{InMemoryStore, SystemClock};
    /// use std::sync::Arc;
    ///
    /// let store = InMemoryStore::new(Arc::new(SystemClock));
    /// let executor = Executor::start(store, tokio::io::sink(), ExecutorConfig::default());
    ///
    /// let reply = executor.handle().execute(command).await?;
    ///
    /// executor.shutdown().await;
    /// ```
    pub fn start<S, W>(store: S, archive: W, config: ExecutorConfig) -> Self
    where
        S: Store + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scanner = ExpiryScanner::new(config.scanner);
        let worker = tokio::spawn(worker_loop(
            store,
            archive,
            scanner,
            receiver,
            shutdown_rx.clone(),
        ));
        let ticker = tokio::spawn(ticker_loop(
            sender.clone(),
            config.scan_interval,
            shutdown_rx,
        ));

        info!(
            queue_capacity = config.queue_capacity,
            scan_interval_ms = config.scan_interval.as_millis() as u64,
            "Command executor started"
        );

        Self {
            handle: ExecutorHandle { sender },
            shutdown_tx,
            worker,
            ticker,
        }
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// True once the worker has exited, for whatever reason.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Stops both tasks and waits for them.
    ///
    /// Messages still queued are dropped; their submitters get
    /// [`ExecutorError::Closed`].
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.worker.await;
        let _ = self.ticker.await;
        info!("Command executor stopped");
    }
}

async fn worker_loop<S, W>(
    mut store: S,
    mut archive: W,
    scanner: ExpiryScanner,
    mut receiver: mpsc::Receiver<Message>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: Store,
    W: AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Executor received shutdown signal");
                    return;
                }
                continue;
            }
            message = receiver.recv() => match message {
                Some(message) => message,
                None => return,
            },
        };

        match message {
            Message::RunScan => {
                let purged = scanner.scan(&mut store);
                if purged > 0 {
                    debug!(
                        purged = purged,
                        keys_remaining = store.size(),
                        "Expired keys purged"
                    );
                }
            }
            Message::Execute { command, reply } => {
                if command.is_update() {
                    if let Err(e) = append(&mut archive, &command).await {
                        error!(
                            command = command.name(),
                            error = %e,
                            "Append-only log write failed, stopping executor"
                        );
                        let _ = reply.send(Err(ExecutorError::Archive(e)));
                        return;
                    }
                }

                let response = command.execute(&mut store);
                trace!(command = command.name(), "Command executed");

                // The submitter may have gone away; the command still ran.
                let _ = reply.send(Ok(response));
            }
        }
    }
}

async fn append<W>(archive: &mut W, command: &Command) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    archive.write_all(command.request()).await?;
    archive.flush().await
}

async fn ticker_loop(
    sender: mpsc::Sender<Message>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if sender.send(Message::RunScan).await.is_err() {
                    return;
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}
