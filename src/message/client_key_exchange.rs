use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::types::KeyExchange;
use crate::util::{write_u16_prefixed, write_u8_prefixed};

/// ClientKeyExchange, one variant per key exchange family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    /// Premaster secret encrypted under the server's RSA key.
    Rsa(Vec<u8>),
    /// Client DH public value. Empty when it is implicit in a client certificate.
    Dh(Vec<u8>),
    /// Client EC point, uncompressed.
    Ecdh(Vec<u8>),
}

impl ClientKeyExchange {
    pub fn parse(input: &[u8], key_exchange: KeyExchange) -> IResult<&[u8], ClientKeyExchange> {
        match key_exchange {
            KeyExchange::RSA | KeyExchange::RSA_EXPORT => {
                let (input, len) = be_u16(input)?;
                let (input, data) = take(len)(input)?;
                Ok((input, ClientKeyExchange::Rsa(data.to_vec())))
            }
            k if k.is_ec() => {
                let (input, len) = be_u8(input)?;
                let (input, data) = take(len)(input)?;
                Ok((input, ClientKeyExchange::Ecdh(data.to_vec())))
            }
            _ => {
                if input.is_empty() {
                    return Ok((input, ClientKeyExchange::Dh(Vec::new())));
                }
                let (input, len) = be_u16(input)?;
                let (input, data) = take(len)(input)?;
                Ok((input, ClientKeyExchange::Dh(data.to_vec())))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ClientKeyExchange::Rsa(data) => write_u16_prefixed(output, data),
            ClientKeyExchange::Dh(data) if data.is_empty() => {}
            ClientKeyExchange::Dh(data) => write_u16_prefixed(output, data),
            ClientKeyExchange::Ecdh(data) => write_u8_prefixed(output, data),
        }
    }
}
