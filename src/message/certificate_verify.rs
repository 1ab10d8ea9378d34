use nom::IResult;

use super::DigitallySigned;
use crate::types::ProtocolVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub signed: DigitallySigned,
}

impl CertificateVerify {
    pub fn new(signed: DigitallySigned) -> Self {
        CertificateVerify { signed }
    }

    pub fn parse(input: &[u8], version: ProtocolVersion) -> IResult<&[u8], CertificateVerify> {
        let (input, signed) = DigitallySigned::parse(input, version)?;
        Ok((input, CertificateVerify { signed }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.signed.serialize(output);
    }
}
