use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::TypedExtension;
use crate::message::ExtensionType;
use crate::types::SignatureAndHashAlgorithm;
use crate::util::{expect_empty, many0, with_u16_length};

/// signature_algorithms (RFC 5246 section 7.4.1.4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAlgorithmsExtension {
    pub supported_signature_algorithms: Vec<SignatureAndHashAlgorithm>,
}

impl SignatureAlgorithmsExtension {
    pub fn new(supported_signature_algorithms: Vec<SignatureAndHashAlgorithm>) -> Self {
        SignatureAlgorithmsExtension {
            supported_signature_algorithms,
        }
    }

    /// Parse the bare u16 prefixed list, shared with CertificateRequest.
    pub fn parse_list(input: &[u8]) -> IResult<&[u8], Vec<SignatureAndHashAlgorithm>> {
        let (input, list_len) = be_u16(input)?;
        let (input, list) = take(list_len)(input)?;
        let (rest, algorithms) = many0(SignatureAndHashAlgorithm::parse)(list)?;
        expect_empty(rest)?;
        Ok((input, algorithms))
    }

    pub fn serialize_list(list: &[SignatureAndHashAlgorithm], output: &mut Vec<u8>) {
        with_u16_length(output, |out| {
            for alg in list {
                alg.serialize(out);
            }
        });
    }
}

impl TypedExtension for SignatureAlgorithmsExtension {
    const TYPE: ExtensionType = ExtensionType::SignatureAlgorithms;

    fn parse_data(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, list) = Self::parse_list(input)?;
        Ok((input, SignatureAlgorithmsExtension::new(list)))
    }

    fn serialize_data(&self, output: &mut Vec<u8>) {
        Self::serialize_list(&self.supported_signature_algorithms, output);
    }
}
