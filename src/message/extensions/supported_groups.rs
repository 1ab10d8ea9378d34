use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::TypedExtension;
use crate::message::ExtensionType;
use crate::types::NamedCurve;
use crate::util::{expect_empty, many0, with_u16_length};

/// supported_groups, formerly elliptic_curves (RFC 8422).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedGroupsExtension {
    pub groups: Vec<NamedCurve>,
}

impl SupportedGroupsExtension {
    pub fn new(groups: Vec<NamedCurve>) -> Self {
        SupportedGroupsExtension { groups }
    }
}

impl TypedExtension for SupportedGroupsExtension {
    const TYPE: ExtensionType = ExtensionType::SupportedGroups;

    fn parse_data(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, len) = be_u16(input)?;
        let (input, list) = take(len)(input)?;
        let (rest, groups) = many0(NamedCurve::parse)(list)?;
        expect_empty(rest)?;
        Ok((input, SupportedGroupsExtension { groups }))
    }

    fn serialize_data(&self, output: &mut Vec<u8>) {
        with_u16_length(output, |out| {
            for g in &self.groups {
                g.serialize(out);
            }
        });
    }
}
