use std::fmt;

use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u24, be_u8};
use nom::{Err, IResult};

use super::{
    Certificate, CertificateRequest, CertificateVerify, ClientHello, ClientKeyExchange, Finished,
    ServerHello, ServerKeyExchange,
};
use crate::types::{KeyExchange, ProtocolVersion};
use crate::util::expect_empty;

/// Largest handshake body we accept. Anything bigger is a peer bug or an attack.
pub const MAX_HANDSHAKE_LEN: usize = 1 << 18;

/// Negotiated values that change how bodies are decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext {
    pub version: ProtocolVersion,
    pub key_exchange: Option<KeyExchange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub msg_type: MessageType,
    pub body: Body,
}

/// Every handshake message a TLS 1.0 to 1.2 client sees or sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    HelloRequest,
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    Certificate(Certificate),
    ServerKeyExchange(ServerKeyExchange),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    CertificateVerify(CertificateVerify),
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
}

impl Handshake {
    pub fn new(body: Body) -> Self {
        Handshake {
            msg_type: body.msg_type(),
            body,
        }
    }

    /// Type and body length of the message at the start of `input`.
    pub fn parse_header(input: &[u8]) -> IResult<&[u8], (MessageType, usize)> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        Ok((input, (msg_type, length as usize)))
    }

    pub fn parse<'a>(input: &'a [u8], ctx: &ParseContext) -> IResult<&'a [u8], Handshake> {
        let (input, (msg_type, length)) = Self::parse_header(input)?;
        let (input, body_bytes) = take(length)(input)?;
        let (rest, body) = Body::parse(body_bytes, msg_type, ctx)?;
        expect_empty(rest)?;
        Ok((input, Handshake { msg_type, body }))
    }

    /// Serialize with the 4 byte header. This is also the transcript encoding.
    pub fn serialize(&self, output: &mut Vec<u8>, version: ProtocolVersion) {
        output.push(self.msg_type.as_u8());
        let len_pos = output.len();
        output.extend_from_slice(&[0, 0, 0]);
        self.body.serialize(output, version);
        let len = (output.len() - len_pos - 3) as u32;
        output[len_pos..len_pos + 3].copy_from_slice(&len.to_be_bytes()[1..]);
    }

    pub fn to_bytes(&self, version: ProtocolVersion) -> Vec<u8> {
        let mut out = Vec::new();
        self.serialize(&mut out, version);
        out
    }
}

impl Body {
    pub fn msg_type(&self) -> MessageType {
        match self {
            Body::HelloRequest => MessageType::HelloRequest,
            Body::ClientHello(_) => MessageType::ClientHello,
            Body::ServerHello(_) => MessageType::ServerHello,
            Body::Certificate(_) => MessageType::Certificate,
            Body::ServerKeyExchange(_) => MessageType::ServerKeyExchange,
            Body::CertificateRequest(_) => MessageType::CertificateRequest,
            Body::ServerHelloDone => MessageType::ServerHelloDone,
            Body::CertificateVerify(_) => MessageType::CertificateVerify,
            Body::ClientKeyExchange(_) => MessageType::ClientKeyExchange,
            Body::Finished(_) => MessageType::Finished,
        }
    }

    pub fn parse<'a>(
        input: &'a [u8],
        msg_type: MessageType,
        ctx: &ParseContext,
    ) -> IResult<&'a [u8], Body> {
        match msg_type {
            MessageType::HelloRequest => Ok((input, Body::HelloRequest)),
            MessageType::ClientHello => {
                let (input, m) = ClientHello::parse(input)?;
                Ok((input, Body::ClientHello(m)))
            }
            MessageType::ServerHello => {
                let (input, m) = ServerHello::parse(input)?;
                Ok((input, Body::ServerHello(m)))
            }
            MessageType::Certificate => {
                let (input, m) = Certificate::parse(input)?;
                Ok((input, Body::Certificate(m)))
            }
            MessageType::ServerKeyExchange => {
                let Some(kx) = ctx.key_exchange else {
                    return Err(Err::Failure(Error::new(input, ErrorKind::Verify)));
                };
                let (input, m) = ServerKeyExchange::parse(input, kx, ctx.version)?;
                Ok((input, Body::ServerKeyExchange(m)))
            }
            MessageType::CertificateRequest => {
                let (input, m) = CertificateRequest::parse(input, ctx.version)?;
                Ok((input, Body::CertificateRequest(m)))
            }
            MessageType::ServerHelloDone => Ok((input, Body::ServerHelloDone)),
            MessageType::CertificateVerify => {
                let (input, m) = CertificateVerify::parse(input, ctx.version)?;
                Ok((input, Body::CertificateVerify(m)))
            }
            MessageType::ClientKeyExchange => {
                let Some(kx) = ctx.key_exchange else {
                    return Err(Err::Failure(Error::new(input, ErrorKind::Verify)));
                };
                let (input, m) = ClientKeyExchange::parse(input, kx)?;
                Ok((input, Body::ClientKeyExchange(m)))
            }
            MessageType::Finished => {
                let (input, m) = Finished::parse(input)?;
                Ok((input, Body::Finished(m)))
            }
            MessageType::Unknown(_) => Err(Err::Failure(Error::new(input, ErrorKind::Tag))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>, version: ProtocolVersion) {
        match self {
            Body::HelloRequest | Body::ServerHelloDone => {}
            Body::ClientHello(m) => m.serialize(output),
            Body::ServerHello(m) => m.serialize(output),
            Body::Certificate(m) => m.serialize(output),
            Body::ServerKeyExchange(m) => m.serialize(output),
            Body::CertificateRequest(m) => m.serialize(output, version),
            Body::CertificateVerify(m) => m.serialize(output),
            Body::ClientKeyExchange(m) => m.serialize(output),
            Body::Finished(m) => m.serialize(output),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    Unknown(u8),
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unknown(v) => write!(f, "Unknown({})", v),
            _ => write!(f, "{:?}", self),
        }
    }
}
