use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::util::{expect_empty, many0, with_u16_length, write_u16_prefixed};

/// A raw hello extension. Typed views live in `extensions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub extension_type: ExtensionType,
    pub extension_data: Vec<u8>,
}

impl Extension {
    pub fn new(extension_type: ExtensionType, extension_data: Vec<u8>) -> Self {
        Extension {
            extension_type,
            extension_data,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Extension> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, extension_data) = take(extension_length)(input)?;

        Ok((
            input,
            Extension {
                extension_type,
                extension_data: extension_data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.extension_type.as_u16().to_be_bytes());
        write_u16_prefixed(output, &self.extension_data);
    }

    /// Parse the u16 length prefixed extension block of a hello message.
    pub fn parse_block(input: &[u8]) -> IResult<&[u8], Vec<Extension>> {
        let (input, len) = be_u16(input)?;
        let (input, block) = take(len)(input)?;
        let (rest, extensions) = many0(Extension::parse)(block)?;
        expect_empty(rest)?;
        Ok((input, extensions))
    }

    pub fn serialize_block(extensions: &[Extension], output: &mut Vec<u8>) {
        with_u16_length(output, |out| {
            for ext in extensions {
                ext.serialize(out);
            }
        });
    }
}

/// Look up an extension by type.
pub fn find_extension(extensions: &[Extension], t: ExtensionType) -> Option<&Extension> {
    extensions.iter().find(|e| e.extension_type == t)
}

wire_enum! {
    /// Hello extensions this client sends or recognizes.
    pub enum ExtensionType: u16, from_u16, as_u16, be_u16 {
        ServerName = 0x0000,
        MaxFragmentLength = 0x0001,
        StatusRequest = 0x0005,
        SupportedGroups = 0x000A,
        EcPointFormats = 0x000B,
        SignatureAlgorithms = 0x000D,
        Heartbeat = 0x000F,
        ApplicationLayerProtocolNegotiation = 0x0010,
        Padding = 0x0015,
        EncryptThenMac = 0x0016,
        ExtendedMasterSecret = 0x0017,
        SessionTicket = 0x0023,
        RenegotiationInfo = 0xFF01,
    }
}
