use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::extensions::TypedExtension;
use super::{find_extension, Extension, ExtensionType, Random, SessionId};
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};
use crate::util::{expect_empty, many0, with_u16_length};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<CompressionMethod>,
    /// Empty means the extension block is omitted.
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn new(
        client_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cipher_suites: Vec<CipherSuite>,
    ) -> Self {
        ClientHello {
            client_version,
            random,
            session_id,
            cipher_suites,
            compression_methods: vec![CompressionMethod::Null],
            extensions: Vec::new(),
        }
    }

    pub fn add_extension<T: TypedExtension>(&mut self, ext: &T) {
        self.extensions.push(ext.to_extension());
    }

    pub fn extension(&self, t: ExtensionType) -> Option<&Extension> {
        find_extension(&self.extensions, t)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;

        let (input, suites_len) = be_u16(input)?;
        let (input, suites) = take(suites_len)(input)?;
        let (rest, cipher_suites) = many0(CipherSuite::parse)(suites)?;
        expect_empty(rest)?;

        let (input, comp_len) = be_u8(input)?;
        let (input, comps) = take(comp_len)(input)?;
        let compression_methods = comps.iter().map(|b| CompressionMethod::from_u8(*b)).collect();

        let (input, extensions) = if input.is_empty() {
            (input, Vec::new())
        } else {
            Extension::parse_block(input)?
        };

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);

        with_u16_length(output, |out| {
            for suite in &self.cipher_suites {
                suite.serialize(out);
            }
        });

        output.push(self.compression_methods.len() as u8);
        output.extend(self.compression_methods.iter().map(|c| c.as_u8()));

        if !self.extensions.is_empty() {
            Extension::serialize_block(&self.extensions, output);
        }
    }
}
