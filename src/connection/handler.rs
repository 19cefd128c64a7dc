//! Connection Handler Module
//!
//! This module handles individual client connections to LedgerKV.
//! Each client gets its own handler task that runs in a loop,
//! reading requests, handing them to the executor and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────────┐
//!    │      Main Loop                   │
//!    │                                  │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ read_frame(buffer)          │◄├──── read more bytes
//!    │  └───────────┬─────────────────┘ │     when None
//!    │              │ split_to(consumed)│
//!    │              ▼                   │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ registry.validate()         │─├──── error reply,
//!    │  └───────────┬─────────────────┘ │     executor untouched
//!    │              │                   │
//!    │              ▼                   │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ executor.execute().await    │ │
//!    │  └───────────┬─────────────────┘ │
//!    │              │                   │
//!    │              ▼                   │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ Send response               │ │
//!    │  └───────────┬─────────────────┘ │
//!    │              │                   │
//!    │              ▼                   │
//!    │         [Loop back]              │
//!    └──────────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error / executor gone
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. TCP is a stream
//! protocol: a read may hold half a request or several. Each complete frame
//! is split off the front of the buffer, and those exact bytes travel with the
//! command so the executor can append them to the log. Whatever follows stays
//! at the front for the next attempt.

use crate::commands::{Command, CommandRegistry};
use crate::executor::{ExecutorError, ExecutorHandle};
use crate::protocol::{read_frame, RespValue, MAX_BULK_LENGTH};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace, warn};

/// Maximum size for the read buffer: one largest bulk string plus headroom
const MAX_BUFFER_SIZE: usize = MAX_BULK_LENGTH + 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests answered, including rejected ones
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so that tests can drive it with mock I/O.
pub struct ConnectionHandler<S> {
    /// The client stream
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Turns frames into commands (shared across connections)
    registry: Arc<CommandRegistry>,

    /// Submission handle for the single-writer executor
    executor: ExecutorHandle,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream for this connection
    /// * `addr` - The client's socket address
    /// * `registry` - Validates incoming requests
    /// * `executor` - Runs validated commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        registry: Arc<CommandRegistry>,
        executor: ExecutorHandle,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            registry,
            executor,
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Reads requests from the client, executes them and sends back replies
    /// until the client disconnects, an I/O error occurs or the executor
    /// stops.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some((frame, consumed)) = read_frame(&self.buffer) {
                let request = self.buffer.split_to(consumed).freeze();
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Framed request"
                );

                let response = match self.registry.validate(frame, request) {
                    Ok(command) => self.dispatch(command).await?,
                    Err(reply) => {
                        debug!(client = %self.addr, reply = %reply, "Rejected request");
                        reply
                    }
                };
                self.stats.command_processed();

                self.send_response(&response).await?;
            }

            // Need more data - read from the socket
            self.read_more_data().await?;
        }
    }

    /// Hands `command` to the executor and waits for its reply.
    async fn dispatch(&mut self, command: Command) -> Result<RespValue, ConnectionError> {
        match self.executor.execute(command).await {
            Ok(response) => Ok(response),
            Err(e @ ExecutorError::Archive(_)) => Ok(RespValue::error(format!("ERR {}", e))),
            Err(e @ ExecutorError::Closed) => {
                self.send_response(&RespValue::error(format!("ERR {}", e)))
                    .await?;
                Err(ConnectionError::ExecutorUnavailable)
            }
        }
    }

    /// Reads more data from the stream into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Check buffer size limit
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial request in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial request)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,

    /// The executor stopped; no further commands can run
    #[error("Executor unavailable")]
    ExecutorUnavailable,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    registry: Arc<CommandRegistry>,
    executor: ExecutorHandle,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, registry, executor, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Executor, ExecutorConfig};
    use crate::server::accept_loop;
    use crate::storage::{InMemoryStore, SystemClock};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn start_executor() -> (Arc<CommandRegistry>, Executor) {
        let clock = Arc::new(SystemClock);
        let registry = Arc::new(CommandRegistry::new(clock.clone()));
        let executor = Executor::start(
            InMemoryStore::new(clock),
            tokio::io::sink(),
            ExecutorConfig::default(),
        );
        (registry, executor)
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    /// The returned executor must be kept alive for the server to work.
    async fn create_test_server() -> (SocketAddr, Executor, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (registry, executor) = start_executor();
        let stats = Arc::new(ConnectionStats::new());

        tokio::spawn(accept_loop(
            listener,
            registry,
            executor.handle(),
            Arc::clone(&stats),
        ));

        (addr, executor, stats)
    }

    async fn read_exactly(client: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            client.read_exact(&mut buf),
        )
        .await
        .expect("timed out waiting for reply")
        .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_request_split_across_reads() {
        let (registry, executor) = start_executor();
        let stats = Arc::new(ConnectionStats::new());

        let stream = tokio_test::io::Builder::new()
            .read(b"*3\r\n$3\r\nSET\r\n$1\r")
            .read(b"\nk\r\n$1\r\nv")
            .read(b"\r\n")
            .write(b"+OK\r\n")
            .read(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n")
            .write(b"$1\r\nv\r\n")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            registry,
            executor.handle(),
            Arc::clone(&stats),
        );
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_pipelined_requests_in_one_read() {
        let (registry, executor) = start_executor();
        let stats = Arc::new(ConnectionStats::new());

        let stream = tokio_test::io::Builder::new()
            .read(b"*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n*2\r\n$3\r\nGET")
            .write(b":1\r\n")
            .write(b":2\r\n")
            .read(b"\r\n$1\r\nn\r\n")
            .write(b"$1\r\n2\r\n")
            .build();

        handle_connection(stream, test_addr(), registry, executor.handle(), stats).await;
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_validation_error_keeps_connection_open() {
        let (registry, executor) = start_executor();
        let stats = Arc::new(ConnectionStats::new());

        let stream = tokio_test::io::Builder::new()
            .read(b"*1\r\n$3\r\nGET\r\n")
            .write(b"-ERR wrong number of arguments for 'get' command\r\n")
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();

        let handler =
            ConnectionHandler::new(stream, test_addr(), registry, executor.handle(), stats);
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::ClientDisconnected)
        ));
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_bulk_length_is_answered() {
        let (registry, executor) = start_executor();
        let stats = Arc::new(ConnectionStats::new());

        let stream = tokio_test::io::Builder::new()
            .read(b"$9223372036854775807\r\n")
            .write(b"-value \"9223372036854775807\" is not a valid bulk string length\r\n")
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();

        let handler =
            ConnectionHandler::new(stream, test_addr(), registry, executor.handle(), stats);
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::ClientDisconnected)
        ));
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_partial_request_at_eof() {
        let (registry, executor) = start_executor();
        let stats = Arc::new(ConnectionStats::new());

        let stream = tokio_test::io::Builder::new()
            .read(b"*2\r\n$3\r\nGET\r\n")
            .build();

        let handler =
            ConnectionHandler::new(stream, test_addr(), registry, executor.handle(), stats);
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::UnexpectedEof)
        ));
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_stopped_executor_closes_connection() {
        let (registry, executor) = start_executor();
        let handle = executor.handle();
        executor.shutdown().await;

        let stream = tokio_test::io::Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n")
            .write(b"-ERR executor is not running\r\n")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            registry,
            handle,
            Arc::new(ConnectionStats::new()),
        );
        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::ExecutorUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _executor, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();

        assert_eq!(read_exactly(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, _executor, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$4\r\nAriz\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut client, 5).await, b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nget\r\n$4\r\nname\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut client, 10).await, b"$4\r\nAriz\r\n");
    }

    #[tokio::test]
    async fn test_multiple_commands() {
        let (addr, _executor, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Pipelined: four requests in a single write
        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n*3\r\n$3\r\nSET\r\n$2\r\nk2\r\n$2\r\nv2\r\n*2\r\n$3\r\nGET\r\n$2\r\nk1\r\n*2\r\n$3\r\nGET\r\n$2\r\nk2\r\n")
            .await
            .unwrap();

        let expected = b"+OK\r\n+OK\r\n$2\r\nv1\r\n$2\r\nv2\r\n";
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_error_replies_keep_connection_open() {
        let (addr, _executor, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Malformed integer frame
        client.write_all(b":nope\r\n").await.unwrap();
        let expected = b"-value \"nope\" is not a 64-bit integer\r\n";
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);

        // Unknown command
        client.write_all(b"*1\r\n$3\r\nFLY\r\n").await.unwrap();
        let expected = b"-ERR unknown command 'FLY'\r\n";
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);

        // Wrong type
        client
            .write_all(b"*3\r\n$5\r\nRPUSH\r\n$1\r\nl\r\n$1\r\na\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut client, 4).await, b":1\r\n");
        client
            .write_all(b"*2\r\n$4\r\nINCR\r\n$1\r\nl\r\n")
            .await
            .unwrap();
        let expected = b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);

        // Still serving
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_clients_share_one_keyspace() {
        let (addr, _executor, _) = create_test_server().await;

        let mut writer = TcpStream::connect(addr).await.unwrap();
        let mut reader = TcpStream::connect(addr).await.unwrap();

        writer
            .write_all(b"*3\r\n$5\r\nLPUSH\r\n$1\r\nq\r\n$3\r\njob\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut writer, 4).await, b":1\r\n");

        reader
            .write_all(b"*4\r\n$6\r\nLRANGE\r\n$1\r\nq\r\n$1\r\n0\r\n$2\r\n-1\r\n")
            .await
            .unwrap();
        let expected = b"*1\r\n$3\r\njob\r\n";
        assert_eq!(read_exactly(&mut reader, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _executor, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Give the server time to accept the connection
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let _ = read_exactly(&mut client, 7).await;

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        // Close connection
        drop(client);

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
