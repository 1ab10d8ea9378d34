//! Structured events emitted by the handshake engine and the connection.
//!
//! Logging through `log` is diagnostic only. Anything an application wants to
//! observe or count goes through an [`Observer`] injected with
//! [`ConfigBuilder::observer`](crate::ConfigBuilder::observer).

use std::fmt;

use crate::connection::ConnectionState;
use crate::error::Alert;
use crate::message::{MessageType, SessionId};
use crate::types::{CipherSuite, ProtocolVersion};

/// Read or write side of the record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A ClientHello is about to be sent.
    HandshakeStarted { renegotiation: bool },
    /// A cached session is offered in ClientHello.
    ResumptionOffered { session_id: SessionId },
    /// The server accepted the offered session.
    SessionResumed { session_id: SessionId },
    /// The server started a new session.
    NewSession {
        session_id: SessionId,
        cipher_suite: CipherSuite,
        version: ProtocolVersion,
    },
    MessageReceived(MessageType),
    MessageSent(MessageType),
    CipherChanged(Direction),
    /// A HelloRequest was answered with a no_renegotiation warning.
    RenegotiationRefused,
    /// A completed session was put in the session cache.
    SessionCached { session_id: SessionId },
    AlertSent(Alert),
    AlertReceived(Alert),
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// The sequence number grew large enough to ask for fresh keys.
    SequenceRenegotiation(Direction),
}

/// Receiver of [`Event`]s.
///
/// Called synchronously from inside the engine. Implementations should be
/// quick and must not call back into the connection.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &Event);
}

/// Observer that ignores everything. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_event(&self, _event: &Event) {}
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}
