//! Single-client session negotiation.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use super::parser::{ParseStep, SessionId, SessionIdParser};
use super::transport::{ClientConnection, ReadByte, SessionTransport};
use crate::config::NetworkConfig;
use crate::error::{AppResult, LoggerError};

/// Identifier accepted from the first client that completed a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedSession {
    /// Accepted subject number
    pub id: SessionId,
    /// Client that sent it
    pub peer: String,
}

/// Waits for a client, prompts it and reads one session identifier line.
///
/// Only one session is ever negotiated. Once it completes the transport is closed.
pub struct SessionNegotiator<T: SessionTransport> {
    transport: T,
    prompt: String,
    client_timeout: Option<Duration>,
    client_attached: bool,
}

impl<T: SessionTransport> SessionNegotiator<T> {
    pub fn new(transport: T, config: &NetworkConfig) -> Self {
        Self {
            transport,
            prompt: config.prompt.clone(),
            client_timeout: config.client_timeout_ms.map(Duration::from_millis),
            client_attached: false,
        }
    }

    /// Whether a session has been negotiated.
    pub fn client_attached(&self) -> bool {
        self.client_attached
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Block until a client sends a complete identifier line.
    ///
    /// Clients that disconnect before a line-end are dropped and the next one is awaited.
    /// An identifier above 999 is fatal.
    pub async fn negotiate(&mut self) -> AppResult<NegotiatedSession> {
        if self.client_attached {
            return Err(LoggerError::Network(
                "session already negotiated".to_string(),
            ));
        }

        let session = match self.client_timeout {
            Some(limit) => timeout(limit, self.accept_until_complete())
                .await
                .map_err(|_| LoggerError::Timeout("session client".to_string()))??,
            None => self.accept_until_complete().await?,
        };

        self.transport.close();
        self.client_attached = true;
        info!(session = %session.id, peer = %session.peer, "Session number accepted");
        Ok(session)
    }

    async fn accept_until_complete(&mut self) -> AppResult<NegotiatedSession> {
        loop {
            let mut client = self.transport.accept().await.map_err(network_error)?;
            let peer = client.peer();
            info!(%peer, "Client attached");

            match read_identifier(client.as_mut(), &self.prompt).await? {
                Some(id) => return Ok(NegotiatedSession { id, peer }),
                None => warn!(%peer, "Client left before sending a session number"),
            }
        }
    }
}

/// Prompt one client and read its line. `None` if the client closed first.
async fn read_identifier(
    client: &mut dyn ClientConnection,
    prompt: &str,
) -> AppResult<Option<SessionId>> {
    client.discard_pending().await.map_err(network_error)?;
    client
        .send(prompt.as_bytes())
        .await
        .map_err(network_error)?;

    let mut parser = SessionIdParser::new();
    loop {
        match client.read_byte().await.map_err(network_error)? {
            ReadByte::Byte(byte) => {
                if let ParseStep::Complete(id) = parser.feed(byte)? {
                    return Ok(Some(id));
                }
            }
            ReadByte::NoData => tokio::task::yield_now().await,
            ReadByte::Closed => return Ok(None),
        }
    }
}

fn network_error(err: anyhow::Error) -> LoggerError {
    LoggerError::Network(format!("{err:#}"))
}
