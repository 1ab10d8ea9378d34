use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

/// TLS protocol versions understood by the client.
///
/// Ordering follows the wire value, so `TLS1_0 < TLS1_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// TLS 1.0 (RFC 2246).
    TLS1_0,
    /// TLS 1.1 (RFC 4346).
    TLS1_1,
    /// TLS 1.2 (RFC 5246).
    TLS1_2,
    /// Anything else seen on the wire.
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0301 => ProtocolVersion::TLS1_0,
            0x0302 => ProtocolVersion::TLS1_1,
            0x0303 => ProtocolVersion::TLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::TLS1_0 => 0x0301,
            ProtocolVersion::TLS1_1 => 0x0302,
            ProtocolVersion::TLS1_2 => 0x0303,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, value) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    /// Whether handshake signatures and the PRF are negotiated per suite.
    ///
    /// TLS 1.0 and 1.1 use the fixed MD5/SHA-1 combination.
    pub fn is_tls12(&self) -> bool {
        self.as_u16() >= 0x0303
    }

    /// Versions from newest to oldest.
    pub fn all() -> [ProtocolVersion; 3] {
        [
            ProtocolVersion::TLS1_2,
            ProtocolVersion::TLS1_1,
            ProtocolVersion::TLS1_0,
        ]
    }
}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_u16().cmp(&other.as_u16())
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::TLS1_0 => write!(f, "TLSv1"),
            ProtocolVersion::TLS1_1 => write!(f, "TLSv1.1"),
            ProtocolVersion::TLS1_2 => write!(f, "TLSv1.2"),
            ProtocolVersion::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
        }
    }
}
