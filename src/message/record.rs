use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u16;
use nom::{Err, IResult};

use crate::types::{ContentType, ProtocolVersion};

/// Record header length.
pub const RECORD_HEADER_LEN: usize = 5;

/// Largest plaintext fragment.
pub const MAX_PLAINTEXT_LEN: usize = 1 << 14;

/// Largest protected fragment (RFC 5246 section 6.2.3).
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 2048;

/// The body of every ChangeCipherSpec record.
pub const CHANGE_CIPHER_SPEC: [u8; 1] = [1];

/// A framed TLS record. The fragment may be protected or plain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub fragment: Vec<u8>,
}

impl Record {
    pub fn new(content_type: ContentType, version: ProtocolVersion, fragment: Vec<u8>) -> Self {
        Record {
            content_type,
            version,
            fragment,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Record> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, length) = be_u16(input)?;
        if length as usize > MAX_CIPHERTEXT_LEN {
            return Err(Err::Failure(Error::new(input, ErrorKind::TooLarge)));
        }
        let (input, fragment) = take(length)(input)?;

        Ok((
            input,
            Record {
                content_type,
                version,
                fragment: fragment.to_vec(),
            },
        ))
    }

    /// The 5 byte header for a fragment of `len` bytes.
    pub fn header(content_type: ContentType, version: ProtocolVersion, len: usize) -> [u8; 5] {
        let v = version.as_u16().to_be_bytes();
        let l = (len as u16).to_be_bytes();
        [content_type.as_u8(), v[0], v[1], l[0], l[1]]
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&Self::header(
            self.content_type,
            self.version,
            self.fragment.len(),
        ));
        output.extend_from_slice(&self.fragment);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_HEADER_LEN + self.fragment.len());
        self.serialize(&mut out);
        out
    }
}
