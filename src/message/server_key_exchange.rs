use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::DigitallySigned;
use crate::types::{CurveType, KeyExchange, NamedCurve, ProtocolVersion};
use crate::util::{write_u16_prefixed, write_u8_prefixed};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub params: ServerKeyExchangeParams,
    /// Absent for anonymous key exchanges.
    pub signature: Option<DigitallySigned>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchangeParams {
    /// Ephemeral RSA key of RSA_EXPORT.
    Rsa(RsaParams),
    Dh(DhParams),
    Ecdh(EcdhParams),
    /// Body of a key exchange that has no ServerKeyExchange.
    Opaque(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaParams {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    pub p: Vec<u8>,
    pub g: Vec<u8>,
    pub ys: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdhParams {
    pub named_curve: NamedCurve,
    pub public_key: Vec<u8>,
}

impl ServerKeyExchange {
    pub fn new(params: ServerKeyExchangeParams, signature: Option<DigitallySigned>) -> Self {
        ServerKeyExchange { params, signature }
    }

    pub fn parse(
        input: &[u8],
        key_exchange: KeyExchange,
        version: ProtocolVersion,
    ) -> IResult<&[u8], ServerKeyExchange> {
        let (input, params) = match key_exchange {
            KeyExchange::RSA_EXPORT => {
                let (input, p) = RsaParams::parse(input)?;
                (input, ServerKeyExchangeParams::Rsa(p))
            }
            KeyExchange::DHE_RSA | KeyExchange::DHE_DSS | KeyExchange::DH_ANON => {
                let (input, p) = DhParams::parse(input)?;
                (input, ServerKeyExchangeParams::Dh(p))
            }
            KeyExchange::ECDHE_ECDSA | KeyExchange::ECDHE_RSA | KeyExchange::ECDH_ANON => {
                let (input, p) = EcdhParams::parse(input)?;
                (input, ServerKeyExchangeParams::Ecdh(p))
            }
            _ => {
                // Left for the engine to reject with the right alert.
                let opaque = input.to_vec();
                return Ok((
                    &input[input.len()..],
                    ServerKeyExchange::new(ServerKeyExchangeParams::Opaque(opaque), None),
                ));
            }
        };

        let (input, signature) = if key_exchange.is_anonymous() {
            (input, None)
        } else {
            let (input, signed) = DigitallySigned::parse(input, version)?;
            (input, Some(signed))
        };

        Ok((input, ServerKeyExchange { params, signature }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.params.serialize(output);
        if let Some(signed) = &self.signature {
            signed.serialize(output);
        }
    }

    /// The encoded params, which is what the signature covers after the randoms.
    pub fn params_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.params.serialize(&mut out);
        out
    }
}

impl ServerKeyExchangeParams {
    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ServerKeyExchangeParams::Rsa(p) => {
                write_u16_prefixed(output, &p.modulus);
                write_u16_prefixed(output, &p.exponent);
            }
            ServerKeyExchangeParams::Dh(p) => {
                write_u16_prefixed(output, &p.p);
                write_u16_prefixed(output, &p.g);
                write_u16_prefixed(output, &p.ys);
            }
            ServerKeyExchangeParams::Ecdh(p) => {
                output.push(CurveType::NamedCurve.as_u8());
                p.named_curve.serialize(output);
                write_u8_prefixed(output, &p.public_key);
            }
            ServerKeyExchangeParams::Opaque(data) => output.extend_from_slice(data),
        }
    }
}

fn u16_vec(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (input, len) = be_u16(input)?;
    let (input, data) = take(len)(input)?;
    Ok((input, data.to_vec()))
}

impl RsaParams {
    fn parse(input: &[u8]) -> IResult<&[u8], RsaParams> {
        let (input, modulus) = u16_vec(input)?;
        let (input, exponent) = u16_vec(input)?;
        Ok((input, RsaParams { modulus, exponent }))
    }
}

impl DhParams {
    fn parse(input: &[u8]) -> IResult<&[u8], DhParams> {
        let (input, p) = u16_vec(input)?;
        let (input, g) = u16_vec(input)?;
        let (input, ys) = u16_vec(input)?;
        Ok((input, DhParams { p, g, ys }))
    }
}

impl EcdhParams {
    fn parse(input: &[u8]) -> IResult<&[u8], EcdhParams> {
        let (input, curve_type) = be_u8(input)?;
        // Explicit curves are not supported.
        if CurveType::from_u8(curve_type) != CurveType::NamedCurve {
            return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
        }
        let (input, named_curve) = NamedCurve::parse(input)?;
        let (input, len) = be_u8(input)?;
        let (input, public_key) = take(len)(input)?;
        Ok((
            input,
            EcdhParams {
                named_curve,
                public_key: public_key.to_vec(),
            },
        ))
    }
}
