use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::extensions::SignatureAlgorithmsExtension;
use crate::types::{ClientCertificateType, ProtocolVersion, SignatureAndHashAlgorithm};
use crate::util::{expect_empty, with_u16_length, write_u16_prefixed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<ClientCertificateType>,
    /// Only sent from TLS 1.2.
    pub supported_signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    /// DER encoded distinguished names of acceptable authorities.
    pub certificate_authorities: Vec<Vec<u8>>,
}

impl CertificateRequest {
    pub fn parse(input: &[u8], version: ProtocolVersion) -> IResult<&[u8], CertificateRequest> {
        let (input, types_len) = be_u8(input)?;
        let (input, types) = take(types_len)(input)?;
        let certificate_types = types
            .iter()
            .map(|b| ClientCertificateType::from_u8(*b))
            .collect();

        let (input, supported_signature_algorithms) = if version.is_tls12() {
            SignatureAlgorithmsExtension::parse_list(input)?
        } else {
            (input, Vec::new())
        };

        let (input, cas_len) = be_u16(input)?;
        let (input, mut cas) = take(cas_len)(input)?;
        let mut certificate_authorities = Vec::new();
        while !cas.is_empty() {
            let (rest, len) = be_u16(cas)?;
            let (rest, dn) = take(len)(rest)?;
            certificate_authorities.push(dn.to_vec());
            cas = rest;
        }
        expect_empty(cas)?;

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>, version: ProtocolVersion) {
        output.push(self.certificate_types.len() as u8);
        output.extend(self.certificate_types.iter().map(|t| t.as_u8()));
        if version.is_tls12() {
            SignatureAlgorithmsExtension::serialize_list(
                &self.supported_signature_algorithms,
                output,
            );
        }
        with_u16_length(output, |out| {
            for dn in &self.certificate_authorities {
                write_u16_prefixed(out, dn);
            }
        });
    }
}
