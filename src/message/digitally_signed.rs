use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::types::{ProtocolVersion, SignatureAndHashAlgorithm};
use crate::util::write_u16_prefixed;

/// A signature as carried in ServerKeyExchange and CertificateVerify.
///
/// The explicit algorithm only exists from TLS 1.2 on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitallySigned {
    pub algorithm: Option<SignatureAndHashAlgorithm>,
    pub signature: Vec<u8>,
}

impl DigitallySigned {
    pub fn new(algorithm: Option<SignatureAndHashAlgorithm>, signature: Vec<u8>) -> Self {
        DigitallySigned {
            algorithm,
            signature,
        }
    }

    pub fn parse(input: &[u8], version: ProtocolVersion) -> IResult<&[u8], DigitallySigned> {
        let (input, algorithm) = if version.is_tls12() {
            let (input, alg) = SignatureAndHashAlgorithm::parse(input)?;
            (input, Some(alg))
        } else {
            (input, None)
        };
        let (input, len) = be_u16(input)?;
        let (input, signature) = take(len)(input)?;

        Ok((
            input,
            DigitallySigned {
                algorithm,
                signature: signature.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        if let Some(alg) = &self.algorithm {
            alg.serialize(output);
        }
        write_u16_prefixed(output, &self.signature);
    }
}
