use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::TypedExtension;
use crate::message::ExtensionType;
use crate::util::{expect_empty, with_u16_length, write_u8_prefixed};

/// application_layer_protocol_negotiation (RFC 7301).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlpnExtension {
    pub protocols: Vec<Vec<u8>>,
}

impl AlpnExtension {
    pub fn new<I, P>(protocols: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        AlpnExtension {
            protocols: protocols.into_iter().map(|p| p.as_ref().to_vec()).collect(),
        }
    }
}

impl TypedExtension for AlpnExtension {
    const TYPE: ExtensionType = ExtensionType::ApplicationLayerProtocolNegotiation;

    fn parse_data(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, list_len) = be_u16(input)?;
        let (input, mut list) = take(list_len)(input)?;
        let mut protocols = Vec::new();
        while !list.is_empty() {
            let (rest, len) = be_u8(list)?;
            let (rest, name) = take(len)(rest)?;
            protocols.push(name.to_vec());
            list = rest;
        }
        expect_empty(list)?;
        Ok((input, AlpnExtension { protocols }))
    }

    fn serialize_data(&self, output: &mut Vec<u8>) {
        with_u16_length(output, |out| {
            for p in &self.protocols {
                write_u8_prefixed(out, p);
            }
        });
    }
}
