//! Typed views over the raw [`Extension`] list of hello messages.

mod alpn;
mod ec_point_formats;
mod renegotiation_info;
mod server_name;
mod signature_algorithms;
mod supported_groups;

pub use alpn::AlpnExtension;
pub use ec_point_formats::{EcPointFormat, EcPointFormatsExtension};
pub use renegotiation_info::RenegotiationInfoExtension;
pub use server_name::ServerNameExtension;
pub use signature_algorithms::SignatureAlgorithmsExtension;
pub use supported_groups::SupportedGroupsExtension;

use nom::IResult;

use super::{Extension, ExtensionType};
use crate::util::expect_empty;
use crate::Error;

/// An extension with a known body layout.
pub trait TypedExtension: Sized {
    const TYPE: ExtensionType;

    fn parse_data(input: &[u8]) -> IResult<&[u8], Self>;

    fn serialize_data(&self, output: &mut Vec<u8>);

    fn to_extension(&self) -> Extension {
        let mut data = Vec::new();
        self.serialize_data(&mut data);
        Extension::new(Self::TYPE, data)
    }

    /// Decode the whole body of `ext`. Trailing bytes are an error.
    fn from_extension(ext: &Extension) -> Result<Self, Error> {
        debug_assert_eq!(ext.extension_type, Self::TYPE);
        let (rest, value) = Self::parse_data(&ext.extension_data)?;
        expect_empty(rest)?;
        Ok(value)
    }
}
