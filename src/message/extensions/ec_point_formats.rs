use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

use super::TypedExtension;
use crate::message::ExtensionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcPointFormat {
    Uncompressed,
    AnsiX962CompressedPrime,
    AnsiX962CompressedChar2,
    Unknown(u8),
}

impl EcPointFormat {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => EcPointFormat::Uncompressed,
            1 => EcPointFormat::AnsiX962CompressedPrime,
            2 => EcPointFormat::AnsiX962CompressedChar2,
            _ => EcPointFormat::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            EcPointFormat::Uncompressed => 0,
            EcPointFormat::AnsiX962CompressedPrime => 1,
            EcPointFormat::AnsiX962CompressedChar2 => 2,
            EcPointFormat::Unknown(value) => *value,
        }
    }
}

/// ec_point_formats (RFC 8422). We only ever offer uncompressed points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcPointFormatsExtension {
    pub formats: Vec<EcPointFormat>,
}

impl Default for EcPointFormatsExtension {
    fn default() -> Self {
        EcPointFormatsExtension {
            formats: vec![EcPointFormat::Uncompressed],
        }
    }
}

impl TypedExtension for EcPointFormatsExtension {
    const TYPE: ExtensionType = ExtensionType::EcPointFormats;

    fn parse_data(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, len) = be_u8(input)?;
        let (input, data) = take(len)(input)?;
        let formats = data.iter().map(|b| EcPointFormat::from_u8(*b)).collect();
        Ok((input, EcPointFormatsExtension { formats }))
    }

    fn serialize_data(&self, output: &mut Vec<u8>) {
        output.push(self.formats.len() as u8);
        output.extend(self.formats.iter().map(|f| f.as_u8()));
    }
}
