use std::fmt;

/// Lifecycle of a connection, across all of its handshakes.
///
/// ```text
/// Start -> Handshaking -> ApplicationData <-> Renegotiating
///                 \              |                 /
///                  +-----> Error/Closed <---------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Nothing sent yet.
    Start,
    /// The initial handshake is in progress.
    Handshaking,
    /// Established, no handshake in progress.
    ApplicationData,
    /// A handshake over the established connection is in progress.
    Renegotiating,
    /// A fatal error happened. Terminal apart from moving to Closed.
    Error,
    /// Outbound is closed. Inbound application data may still drain.
    Closed,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Start => "START",
            ConnectionState::Handshaking => "HANDSHAKING",
            ConnectionState::ApplicationData => "APPLICATION_DATA",
            ConnectionState::Renegotiating => "RENEGOTIATING",
            ConnectionState::Error => "ERROR",
            ConnectionState::Closed => "CLOSED",
        }
    }

    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            ConnectionState::Handshaking | ConnectionState::Renegotiating
        )
    }

    /// Whether application data records may arrive.
    pub fn accepts_application_data(&self) -> bool {
        matches!(
            self,
            ConnectionState::ApplicationData
                | ConnectionState::Renegotiating
                | ConnectionState::Closed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Error | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
