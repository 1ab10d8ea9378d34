use nom::bytes::complete::take;
use nom::number::complete::be_u8;
use nom::IResult;

use super::TypedExtension;
use crate::message::ExtensionType;
use crate::util::write_u8_prefixed;

/// renegotiation_info (RFC 5746).
///
/// Empty on an initial handshake. On renegotiation the client sends its
/// previous verify_data and the server answers with client then server
/// verify_data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenegotiationInfoExtension {
    pub renegotiated_connection: Vec<u8>,
}

impl RenegotiationInfoExtension {
    pub fn new(renegotiated_connection: Vec<u8>) -> Self {
        RenegotiationInfoExtension {
            renegotiated_connection,
        }
    }
}

impl TypedExtension for RenegotiationInfoExtension {
    const TYPE: ExtensionType = ExtensionType::RenegotiationInfo;

    fn parse_data(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, len) = be_u8(input)?;
        let (input, data) = take(len)(input)?;
        Ok((input, RenegotiationInfoExtension::new(data.to_vec())))
    }

    fn serialize_data(&self, output: &mut Vec<u8>) {
        write_u8_prefixed(output, &self.renegotiated_connection);
    }
}
