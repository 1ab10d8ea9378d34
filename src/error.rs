use std::fmt;

use nom::number::complete::be_u8;
use nom::IResult;
use thiserror::Error;

/// Errors raised by the handshake engine and the connection coordinator.
///
/// Every variant maps to exactly one alert through [`Error::alert`]. Once a
/// connection has failed, every later call returns [`Error::Closed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Bytes that could not be decoded.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A message or record arrived that is not legal in the current state.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The peer broke a protocol rule.
    #[error("Protocol violation ({alert}): {reason}")]
    ProtocolViolation {
        alert: AlertDescription,
        reason: String,
    },

    /// Signature or Finished verification failed, or a key could not be used.
    #[error("Cryptographic failure ({alert}): {reason}")]
    CryptoError {
        alert: AlertDescription,
        reason: String,
    },

    /// Record protection could not be removed.
    #[error("Bad record MAC: {0}")]
    BadRecordMac(String),

    /// Certificate chain or identity was rejected.
    #[error("Trust failure ({alert}): {reason}")]
    TrustFailure {
        alert: AlertDescription,
        reason: String,
    },

    /// The peer chose something local policy does not allow.
    #[error("Policy violation ({alert}): {reason}")]
    PolicyViolation {
        alert: AlertDescription,
        reason: String,
    },

    /// Sequence number space is exhausted.
    #[error("Resource exhausted: {0}")]
    ResourceExhaustion(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Local failure unrelated to the peer.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// The peer sent a fatal alert.
    #[error("Received fatal alert: {0}")]
    PeerAlert(AlertDescription),

    /// The connection is closed. Carries the original failure, if any.
    #[error("Connection closed: {0}")]
    Closed(String),
}

impl Error {
    /// A protocol violation with an explicit alert.
    pub fn fatal(alert: AlertDescription, reason: impl Into<String>) -> Self {
        Error::ProtocolViolation {
            alert,
            reason: reason.into(),
        }
    }

    pub fn policy(alert: AlertDescription, reason: impl Into<String>) -> Self {
        Error::PolicyViolation {
            alert,
            reason: reason.into(),
        }
    }

    pub fn crypto(alert: AlertDescription, reason: impl Into<String>) -> Self {
        Error::CryptoError {
            alert,
            reason: reason.into(),
        }
    }

    pub fn trust(alert: AlertDescription, reason: impl Into<String>) -> Self {
        Error::TrustFailure {
            alert,
            reason: reason.into(),
        }
    }

    /// The alert sent to the peer when this error tears down the connection.
    pub fn alert(&self) -> AlertDescription {
        match self {
            Error::ParseError(_) => AlertDescription::DecodeError,
            Error::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            Error::ProtocolViolation { alert, .. } => *alert,
            Error::CryptoError { alert, .. } => *alert,
            Error::BadRecordMac(_) => AlertDescription::BadRecordMac,
            Error::TrustFailure { alert, .. } => *alert,
            Error::PolicyViolation { alert, .. } => *alert,
            Error::ResourceExhaustion(_) => AlertDescription::HandshakeFailure,
            Error::ConfigError(_) => AlertDescription::InternalError,
            Error::InternalError(_) => AlertDescription::InternalError,
            Error::PeerAlert(alert) => *alert,
            Error::Closed(_) => AlertDescription::CloseNotify,
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let reason = match value {
            nom::Err::Incomplete(_) => "incomplete input".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => format!("{:?}", e.code),
        };
        Error::ParseError(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }
}

/// Alert descriptions of TLS 1.0 to 1.2 (RFC 5246 section 7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    DecryptionFailed,
    RecordOverflow,
    DecompressionFailure,
    HandshakeFailure,
    NoCertificate,
    BadCertificate,
    UnsupportedCertificate,
    CertificateRevoked,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ExportRestriction,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    UserCanceled,
    NoRenegotiation,
    UnsupportedExtension,
    Unknown(u8),
}

impl AlertDescription {
    pub fn from_u8(value: u8) -> Self {
        use AlertDescription::*;
        match value {
            0 => CloseNotify,
            10 => UnexpectedMessage,
            20 => BadRecordMac,
            21 => DecryptionFailed,
            22 => RecordOverflow,
            30 => DecompressionFailure,
            40 => HandshakeFailure,
            41 => NoCertificate,
            42 => BadCertificate,
            43 => UnsupportedCertificate,
            44 => CertificateRevoked,
            45 => CertificateExpired,
            46 => CertificateUnknown,
            47 => IllegalParameter,
            48 => UnknownCa,
            49 => AccessDenied,
            50 => DecodeError,
            51 => DecryptError,
            60 => ExportRestriction,
            70 => ProtocolVersion,
            71 => InsufficientSecurity,
            80 => InternalError,
            90 => UserCanceled,
            100 => NoRenegotiation,
            110 => UnsupportedExtension,
            _ => Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        use AlertDescription::*;
        match self {
            CloseNotify => 0,
            UnexpectedMessage => 10,
            BadRecordMac => 20,
            DecryptionFailed => 21,
            RecordOverflow => 22,
            DecompressionFailure => 30,
            HandshakeFailure => 40,
            NoCertificate => 41,
            BadCertificate => 42,
            UnsupportedCertificate => 43,
            CertificateRevoked => 44,
            CertificateExpired => 45,
            CertificateUnknown => 46,
            IllegalParameter => 47,
            UnknownCa => 48,
            AccessDenied => 49,
            DecodeError => 50,
            DecryptError => 51,
            ExportRestriction => 60,
            ProtocolVersion => 70,
            InsufficientSecurity => 71,
            InternalError => 80,
            UserCanceled => 90,
            NoRenegotiation => 100,
            UnsupportedExtension => 110,
            Unknown(value) => *value,
        }
    }
}

impl fmt::Display for AlertDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use AlertDescription::*;
        let name = match self {
            CloseNotify => "close_notify",
            UnexpectedMessage => "unexpected_message",
            BadRecordMac => "bad_record_mac",
            DecryptionFailed => "decryption_failed",
            RecordOverflow => "record_overflow",
            DecompressionFailure => "decompression_failure",
            HandshakeFailure => "handshake_failure",
            NoCertificate => "no_certificate",
            BadCertificate => "bad_certificate",
            UnsupportedCertificate => "unsupported_certificate",
            CertificateRevoked => "certificate_revoked",
            CertificateExpired => "certificate_expired",
            CertificateUnknown => "certificate_unknown",
            IllegalParameter => "illegal_parameter",
            UnknownCa => "unknown_ca",
            AccessDenied => "access_denied",
            DecodeError => "decode_error",
            DecryptError => "decrypt_error",
            ExportRestriction => "export_restriction",
            ProtocolVersion => "protocol_version",
            InsufficientSecurity => "insufficient_security",
            InternalError => "internal_error",
            UserCanceled => "user_canceled",
            NoRenegotiation => "no_renegotiation",
            UnsupportedExtension => "unsupported_extension",
            Unknown(v) => return write!(f, "unknown({})", v),
        };
        f.write_str(name)
    }
}

/// An alert record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn new(level: AlertLevel, description: AlertDescription) -> Self {
        Alert { level, description }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = be_u8(input)?;
        let (input, description) = be_u8(input)?;
        Ok((
            input,
            Alert {
                level: AlertLevel::from_u8(level),
                description: AlertDescription::from_u8(description),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}
