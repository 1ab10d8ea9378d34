//! Wire level enumerations shared by the message codecs and the engine.

mod cipher_suite;
mod version;

pub use cipher_suite::{BulkCipher, CipherSuite, KeyExchange, MacAlgorithm};
pub use version::ProtocolVersion;

use std::fmt;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

wire_enum! {
    /// Record content types (RFC 5246 section 6.2.1).
    pub enum ContentType: u8, from_u8, as_u8, be_u8 {
        ChangeCipherSpec = 20,
        Alert = 21,
        Handshake = 22,
        ApplicationData = 23,
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

wire_enum! {
    pub enum CompressionMethod: u8, from_u8, as_u8, be_u8 {
        Null = 0,
        Deflate = 1,
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Null
    }
}

wire_enum! {
    /// Certificate types a server may ask for in CertificateRequest.
    #[allow(non_camel_case_types)]
    pub enum ClientCertificateType: u8, from_u8, as_u8, be_u8 {
        RSA_SIGN = 1,
        DSS_SIGN = 2,
        RSA_FIXED_DH = 3,
        DSS_FIXED_DH = 4,
        ECDSA_SIGN = 64,
        RSA_FIXED_ECDH = 65,
        ECDSA_FIXED_ECDH = 66,
    }
}

impl ClientCertificateType {
    /// Key algorithm a client certificate must carry for this type.
    ///
    /// Only the signing types are used for client authentication.
    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        match self {
            ClientCertificateType::RSA_SIGN => Some(SignatureAlgorithm::RSA),
            ClientCertificateType::DSS_SIGN => Some(SignatureAlgorithm::DSA),
            ClientCertificateType::ECDSA_SIGN => Some(SignatureAlgorithm::ECDSA),
            _ => None,
        }
    }
}

wire_enum! {
    #[allow(clippy::upper_case_acronyms)]
    pub enum SignatureAlgorithm: u8, from_u8, as_u8, be_u8 {
        Anonymous = 0,
        RSA = 1,
        DSA = 2,
        ECDSA = 3,
    }
}

wire_enum! {
    /// Hash algorithms as used in TLS 1.2 signature_algorithms.
    ///
    /// `None` doubles as the marker for the TLS 1.0/1.1 signature digest, which
    /// is MD5 and SHA-1 concatenated for RSA and plain SHA-1 for ECDSA.
    #[allow(clippy::upper_case_acronyms)]
    pub enum HashAlgorithm: u8, from_u8, as_u8, be_u8 {
        None = 0,
        MD5 = 1,
        SHA1 = 2,
        SHA224 = 3,
        SHA256 = 4,
        SHA384 = 5,
        SHA512 = 6,
    }
}

impl HashAlgorithm {
    /// Digest length in bytes, if known.
    pub fn output_len(&self) -> Option<usize> {
        match self {
            HashAlgorithm::MD5 => Some(16),
            HashAlgorithm::SHA1 => Some(20),
            HashAlgorithm::SHA224 => Some(28),
            HashAlgorithm::SHA256 => Some(32),
            HashAlgorithm::SHA384 => Some(48),
            HashAlgorithm::SHA512 => Some(64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub const fn new(hash: HashAlgorithm, signature: SignatureAlgorithm) -> Self {
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn from_u16(value: u16) -> Self {
        let hash = HashAlgorithm::from_u8((value >> 8) as u8);
        let signature = SignatureAlgorithm::from_u8(value as u8);
        SignatureAndHashAlgorithm { hash, signature }
    }

    pub fn as_u16(&self) -> u16 {
        ((self.hash.as_u8() as u16) << 8) | (self.signature.as_u8() as u16)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, value) = be_u16(input)?;
        Ok((input, SignatureAndHashAlgorithm::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    /// Algorithms advertised in ClientHello, most preferred first.
    pub fn supported() -> &'static [SignatureAndHashAlgorithm] {
        use HashAlgorithm::*;
        use SignatureAlgorithm::*;
        const ALL: &[SignatureAndHashAlgorithm] = &[
            SignatureAndHashAlgorithm::new(SHA256, ECDSA),
            SignatureAndHashAlgorithm::new(SHA384, ECDSA),
            SignatureAndHashAlgorithm::new(SHA256, RSA),
            SignatureAndHashAlgorithm::new(SHA384, RSA),
            SignatureAndHashAlgorithm::new(SHA512, RSA),
            SignatureAndHashAlgorithm::new(SHA1, ECDSA),
            SignatureAndHashAlgorithm::new(SHA1, RSA),
        ];
        ALL
    }
}

impl fmt::Display for SignatureAndHashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}with{:?}", self.hash, self.signature)
    }
}

wire_enum! {
    /// Named elliptic curves (RFC 8422 "supported_groups").
    pub enum NamedCurve: u16, from_u16, as_u16, be_u16 {
        Secp256r1 = 23,
        Secp384r1 = 24,
        Secp521r1 = 25,
        X25519 = 29,
    }
}

impl NamedCurve {
    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

wire_enum! {
    /// ECParameters curve_type of ServerKeyExchange.
    pub enum CurveType: u8, from_u8, as_u8, be_u8 {
        ExplicitPrime = 1,
        ExplicitChar2 = 2,
        NamedCurve = 3,
    }
}
