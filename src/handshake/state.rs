use crate::message::MessageType;
use crate::{AlertDescription, Error};

/// Where the client is in a handshake.
///
/// The state names the next message the client is prepared to receive. Every
/// inbound message is first checked against it, so a message that is out of
/// order never reaches processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    /// No handshake in progress. Either none has started yet or the last one
    /// completed.
    Idle,
    AwaitServerHello,
    AwaitCertificate,
    AwaitServerKeyExchange,
    /// CertificateRequest or ServerHelloDone.
    AwaitCertificateRequest,
    AwaitServerHelloDone,
    /// The next thing must be the peer's ChangeCipherSpec record.
    AwaitChangeCipherSpec,
    AwaitFinished,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Idle => "Idle",
            State::AwaitServerHello => "AwaitServerHello",
            State::AwaitCertificate => "AwaitCertificate",
            State::AwaitServerKeyExchange => "AwaitServerKeyExchange",
            State::AwaitCertificateRequest => "AwaitCertificateRequest",
            State::AwaitServerHelloDone => "AwaitServerHelloDone",
            State::AwaitChangeCipherSpec => "AwaitChangeCipherSpec",
            State::AwaitFinished => "AwaitFinished",
        }
    }

    /// Whether `msg_type` may arrive now.
    ///
    /// HelloRequest is legal everywhere and handled before this check.
    pub fn accepts(&self, msg_type: MessageType) -> bool {
        use MessageType::*;
        match self {
            State::Idle => false,
            State::AwaitServerHello => msg_type == ServerHello,
            State::AwaitCertificate => msg_type == Certificate,
            State::AwaitServerKeyExchange => msg_type == ServerKeyExchange,
            State::AwaitCertificateRequest => {
                matches!(msg_type, CertificateRequest | ServerHelloDone)
            }
            State::AwaitServerHelloDone => msg_type == ServerHelloDone,
            State::AwaitChangeCipherSpec => false,
            State::AwaitFinished => msg_type == Finished,
        }
    }

    /// Fail with unexpected_message unless `msg_type` may arrive now.
    pub fn check(&self, msg_type: MessageType) -> Result<(), Error> {
        if self.accepts(msg_type) {
            Ok(())
        } else {
            Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unexpected {} in state {}", msg_type, self.name()),
            ))
        }
    }

    /// Whether a ClientHello is outstanding or a handshake is running.
    pub fn is_handshaking(&self) -> bool {
        *self != State::Idle
    }
}
