//! Session-initiation protocol.
//!
//! Before logging starts a single client connects, receives a prompt and answers with a
//! subject number terminated by `\n`. The number names the log file.

pub mod negotiator;
pub mod parser;
pub mod transport;

pub use negotiator::{NegotiatedSession, SessionNegotiator};
pub use parser::{parse_line, ParseStep, SessionId, SessionIdParser, MAX_SESSION_ID};
pub use transport::{
    ClientConnection, ReadByte, ScriptedConnection, ScriptedTransport, SessionTransport,
    TcpSessionTransport,
};
