use nom::IResult;

use super::extensions::TypedExtension;
use super::{find_extension, Extension, ExtensionType, Random, SessionId};
use crate::types::{CipherSuite, CompressionMethod, ProtocolVersion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    /// `None` when the server omitted the extension block entirely.
    pub extensions: Option<Vec<Extension>>,
}

impl ServerHello {
    pub fn new(
        server_version: ProtocolVersion,
        random: Random,
        session_id: SessionId,
        cipher_suite: CipherSuite,
    ) -> Self {
        ServerHello {
            server_version,
            random,
            session_id,
            cipher_suite,
            compression_method: CompressionMethod::Null,
            extensions: None,
        }
    }

    pub fn with_extension<T: TypedExtension>(mut self, ext: &T) -> Self {
        self.extensions
            .get_or_insert_with(Vec::new)
            .push(ext.to_extension());
        self
    }

    pub fn extension(&self, t: ExtensionType) -> Option<&Extension> {
        self.extensions
            .as_deref()
            .and_then(|exts| find_extension(exts, t))
    }

    pub fn extensions(&self) -> &[Extension] {
        self.extensions.as_deref().unwrap_or(&[])
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;

        let (input, extensions) = if input.is_empty() {
            (input, None)
        } else {
            let (input, exts) = Extension::parse_block(input)?;
            (input, Some(exts))
        };

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cipher_suite.serialize(output);
        output.push(self.compression_method.as_u8());
        if let Some(exts) = &self.extensions {
            Extension::serialize_block(exts, output);
        }
    }
}
