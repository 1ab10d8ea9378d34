use nom::error::{ErrorKind, ParseError};
use nom::{Err, IResult, InputLength, Parser};

/// Declares a wire enumeration. Values without a variant are kept in
/// `Unknown` so they can be echoed back or reported.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $repr:ty, $from:ident, $to:ident, $read:path {
            $($variant:ident = $value:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
            Unknown($repr),
        }

        impl $name {
            pub fn $from(value: $repr) -> Self {
                match value {
                    $($value => $name::$variant,)*
                    _ => $name::Unknown(value),
                }
            }

            pub fn $to(&self) -> $repr {
                match self {
                    $($name::$variant => $value,)*
                    $name::Unknown(value) => *value,
                }
            }

            pub fn parse(input: &[u8]) -> nom::IResult<&[u8], $name> {
                let (input, value) = $read(input)?;
                Ok((input, $name::$from(value)))
            }
        }
    };
}

/// Apply `f` until the input is exhausted or `f` fails softly.
///
/// Like `nom::multi::many0` but rejects parsers that do not consume.
#[inline(always)]
pub fn many0<I, O, E, F>(mut f: F) -> impl FnMut(I) -> IResult<I, Vec<O>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
{
    move |mut i: I| {
        let mut acc = Vec::new();
        loop {
            let len = i.input_len();
            if len == 0 {
                return Ok((i, acc));
            }
            match f.parse(i.clone()) {
                Err(Err::Error(_)) => return Ok((i, acc)),
                Err(e) => return Err(e),
                Ok((i1, o)) => {
                    // infinite loop check: the parser must always consume
                    if i1.input_len() == len {
                        return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many0)));
                    }

                    i = i1;
                    acc.push(o);
                }
            }
        }
    }
}

/// Fail unless `input` was fully consumed.
pub fn expect_empty(input: &[u8]) -> IResult<&[u8], ()> {
    if input.is_empty() {
        Ok((input, ()))
    } else {
        Err(Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::LengthValue,
        )))
    }
}

pub fn write_u8_prefixed(output: &mut Vec<u8>, data: &[u8]) {
    output.push(data.len() as u8);
    output.extend_from_slice(data);
}

pub fn write_u16_prefixed(output: &mut Vec<u8>, data: &[u8]) {
    output.extend_from_slice(&(data.len() as u16).to_be_bytes());
    output.extend_from_slice(data);
}

pub fn write_u24_prefixed(output: &mut Vec<u8>, data: &[u8]) {
    output.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
    output.extend_from_slice(data);
}

/// Serialize with `f` into a u16 length prefixed block.
pub fn with_u16_length(output: &mut Vec<u8>, f: impl FnOnce(&mut Vec<u8>)) {
    let start = output.len();
    output.extend_from_slice(&[0, 0]);
    f(output);
    let len = (output.len() - start - 2) as u16;
    output[start..start + 2].copy_from_slice(&len.to_be_bytes());
}
