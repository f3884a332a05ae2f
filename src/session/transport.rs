//! Connection-oriented transport for session negotiation.
//!
//! The negotiator only sees [`SessionTransport`] and [`ClientConnection`]. The host
//! implementation is a tokio TCP listener; the scripted implementation replays canned
//! byte sequences for tests.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// Outcome of a single-byte read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadByte {
    /// One byte arrived
    Byte(u8),
    /// Nothing available right now; retry
    NoData,
    /// Peer closed the connection
    Closed,
}

/// One attached client.
#[async_trait]
pub trait ClientConnection: Send {
    /// Peer description for diagnostics.
    fn peer(&self) -> String;

    /// Drop any bytes that arrived before the prompt.
    async fn discard_pending(&mut self) -> Result<usize>;

    /// Write `data` to the client.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read at most one byte.
    async fn read_byte(&mut self) -> Result<ReadByte>;
}

/// Listener that hands out clients one at a time.
#[async_trait]
pub trait SessionTransport: Send {
    /// Wait for the next client.
    async fn accept(&mut self) -> Result<Box<dyn ClientConnection>>;

    /// Stop listening. No further clients are accepted.
    fn close(&mut self);
}

// =============================================================================
// TCP
// =============================================================================

/// TCP listener, bound on first use.
pub struct TcpSessionTransport {
    address: String,
    listener: Option<TcpListener>,
}

impl TcpSessionTransport {
    /// Transport that will listen on `address` (`host:port`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            listener: None,
        }
    }

    /// Bind now if not bound yet and return the local address.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }
        let listener = TcpListener::bind(&self.address)
            .await
            .with_context(|| format!("cannot listen on {}", self.address))?;
        let local = listener.local_addr()?;
        info!(address = %local, "Waiting for session client");
        self.listener = Some(listener);
        Ok(local)
    }

    /// Whether the listener is currently open.
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }
}

#[async_trait]
impl SessionTransport for TcpSessionTransport {
    async fn accept(&mut self) -> Result<Box<dyn ClientConnection>> {
        self.bind().await?;
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| anyhow!("listener closed"))?;
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "Client connected");
        let mut client = TcpClient {
            stream,
            peer,
            gone: false,
        };
        if let Err(e) = client.stream.set_nodelay(true) {
            client.check_gone(e)?;
        }
        Ok(Box::new(client))
    }

    fn close(&mut self) {
        if self.listener.take().is_some() {
            debug!("Session listener closed");
        }
    }
}

struct TcpClient {
    stream: TcpStream,
    peer: SocketAddr,
    /// Peer reset or aborted the connection; every later read reports `Closed`
    gone: bool,
}

impl TcpClient {
    /// Swallow errors that only mean the peer went away.
    fn check_gone(&mut self, err: std::io::Error) -> Result<()> {
        if is_disconnect(&err) {
            debug!(peer = %self.peer, error = %err, "Client connection dropped");
            self.gone = true;
            Ok(())
        } else {
            Err(err.into())
        }
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}

#[async_trait]
impl ClientConnection for TcpClient {
    fn peer(&self) -> String {
        self.peer.to_string()
    }

    async fn discard_pending(&mut self) -> Result<usize> {
        let mut buf = [0u8; 64];
        let mut discarded = 0;
        while !self.gone {
            match self.stream.try_read(&mut buf) {
                Ok(0) => self.gone = true,
                Ok(n) => discarded += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => self.check_gone(e)?,
            }
        }
        Ok(discarded)
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.gone {
            return Ok(());
        }
        let written = match self.stream.write_all(data).await {
            Ok(()) => self.stream.flush().await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => Ok(()),
            Err(e) => self.check_gone(e),
        }
    }

    async fn read_byte(&mut self) -> Result<ReadByte> {
        if self.gone {
            return Ok(ReadByte::Closed);
        }
        if let Err(e) = self.stream.readable().await {
            self.check_gone(e)?;
            return Ok(ReadByte::Closed);
        }
        let mut buf = [0u8; 1];
        match self.stream.try_read(&mut buf) {
            Ok(0) => {
                self.gone = true;
                Ok(ReadByte::Closed)
            }
            Ok(_) => Ok(ReadByte::Byte(buf[0])),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(ReadByte::NoData),
            Err(e) => {
                self.check_gone(e)?;
                Ok(ReadByte::Closed)
            }
        }
    }
}

// =============================================================================
// Scripted
// =============================================================================

/// Bytes written to a scripted client, readable after the connection is gone.
pub type SentLog = Arc<Mutex<Vec<u8>>>;

/// Client that replays a fixed sequence of read outcomes.
///
/// Stale bytes are returned before the script unless `discard_pending` drops them.
/// Once the script runs out the client reports `Closed`.
#[derive(Debug)]
pub struct ScriptedConnection {
    peer: String,
    stale: VecDeque<u8>,
    script: VecDeque<ReadByte>,
    sent: SentLog,
}

impl ScriptedConnection {
    /// Client whose reads follow `script`.
    pub fn new(peer: impl Into<String>, script: impl IntoIterator<Item = ReadByte>) -> Self {
        Self {
            peer: peer.into(),
            stale: VecDeque::new(),
            script: script.into_iter().collect(),
            sent: SentLog::default(),
        }
    }

    /// Client that sends `bytes`, one per read.
    pub fn from_bytes(peer: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(peer, bytes.iter().copied().map(ReadByte::Byte))
    }

    /// Bytes already buffered when the client attaches.
    pub fn with_stale(mut self, bytes: &[u8]) -> Self {
        self.stale.extend(bytes.iter().copied());
        self
    }

    /// Handle on everything sent to this client.
    pub fn sent(&self) -> SentLog {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl ClientConnection for ScriptedConnection {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    async fn discard_pending(&mut self) -> Result<usize> {
        let n = self.stale.len();
        self.stale.clear();
        Ok(n)
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.sent.lock().extend_from_slice(data);
        Ok(())
    }

    async fn read_byte(&mut self) -> Result<ReadByte> {
        if let Some(byte) = self.stale.pop_front() {
            return Ok(ReadByte::Byte(byte));
        }
        Ok(self.script.pop_front().unwrap_or(ReadByte::Closed))
    }
}

/// Transport handing out pre-built scripted clients in order.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    clients: VecDeque<ScriptedConnection>,
    accepted: usize,
    closed: bool,
}

impl ScriptedTransport {
    pub fn new(clients: impl IntoIterator<Item = ScriptedConnection>) -> Self {
        Self {
            clients: clients.into_iter().collect(),
            accepted: 0,
            closed: false,
        }
    }

    /// Clients handed out so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn accept(&mut self) -> Result<Box<dyn ClientConnection>> {
        if self.closed {
            return Err(anyhow!("transport closed"));
        }
        let client = self
            .clients
            .pop_front()
            .ok_or_else(|| anyhow!("no more scripted clients"))?;
        self.accepted += 1;
        Ok(Box::new(client))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_stale_bytes_precede_script() {
        let mut client = ScriptedConnection::from_bytes("c", b"1").with_stale(b"9");
        assert_eq!(client.read_byte().await.unwrap(), ReadByte::Byte(b'9'));
        assert_eq!(client.read_byte().await.unwrap(), ReadByte::Byte(b'1'));
        assert_eq!(client.read_byte().await.unwrap(), ReadByte::Closed);
    }

    #[tokio::test]
    async fn scripted_discard_drops_stale_bytes() {
        let mut client = ScriptedConnection::from_bytes("c", b"1").with_stale(b"99\n");
        assert_eq!(client.discard_pending().await.unwrap(), 3);
        assert_eq!(client.read_byte().await.unwrap(), ReadByte::Byte(b'1'));
    }

    #[tokio::test]
    async fn scripted_transport_runs_out() {
        let mut transport = ScriptedTransport::new([ScriptedConnection::from_bytes("a", b"")]);
        assert!(transport.accept().await.is_ok());
        assert!(transport.accept().await.is_err());
        assert_eq!(transport.accepted(), 1);
    }

    #[tokio::test]
    async fn tcp_bind_is_lazy_and_close_drops_listener() {
        let mut transport = TcpSessionTransport::new("127.0.0.1:0");
        assert!(!transport.is_listening());

        let addr = transport.bind().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(transport.bind().await.unwrap(), addr);

        transport.close();
        assert!(!transport.is_listening());
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn tcp_reset_reads_as_closed() {
        let mut transport = TcpSessionTransport::new("127.0.0.1:0");
        let addr = transport.bind().await.unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();
        stream
            .set_linger(Some(std::time::Duration::ZERO))
            .unwrap();

        let mut client = transport.accept().await.unwrap();
        drop(stream);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        client.discard_pending().await.unwrap();
        client.send(b"prompt").await.unwrap();
        assert_eq!(client.read_byte().await.unwrap(), ReadByte::Closed);
        assert_eq!(client.read_byte().await.unwrap(), ReadByte::Closed);
    }
}
