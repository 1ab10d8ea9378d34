use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::TypedExtension;
use crate::message::ExtensionType;
use crate::util::{expect_empty, with_u16_length, write_u16_prefixed};

const HOST_NAME: u8 = 0;

/// server_name (RFC 6066). Only host_name entries are kept.
///
/// A server acknowledges with an empty body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerNameExtension {
    pub host_names: Vec<String>,
}

impl ServerNameExtension {
    pub fn new(host_names: Vec<String>) -> Self {
        ServerNameExtension { host_names }
    }
}

impl TypedExtension for ServerNameExtension {
    const TYPE: ExtensionType = ExtensionType::ServerName;

    fn parse_data(input: &[u8]) -> IResult<&[u8], Self> {
        if input.is_empty() {
            return Ok((input, ServerNameExtension::default()));
        }
        let (input, list_len) = be_u16(input)?;
        let (input, mut list) = take(list_len)(input)?;
        let mut host_names = Vec::new();
        while !list.is_empty() {
            let (rest, name_type) = be_u8(list)?;
            let (rest, len) = be_u16(rest)?;
            let (rest, name) = take(len)(rest)?;
            if name_type == HOST_NAME {
                host_names.push(String::from_utf8_lossy(name).into_owned());
            }
            list = rest;
        }
        expect_empty(list)?;
        Ok((input, ServerNameExtension { host_names }))
    }

    fn serialize_data(&self, output: &mut Vec<u8>) {
        if self.host_names.is_empty() {
            return;
        }
        with_u16_length(output, |out| {
            for name in &self.host_names {
                out.push(HOST_NAME);
                write_u16_prefixed(out, name.as_bytes());
            }
        });
    }
}
