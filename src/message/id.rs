use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::be_u8;
use nom::{Err, IResult};
use rand::Rng;

/// Maximum session id length (RFC 5246 section 7.4.1.2).
pub const MAX_SESSION_ID_LEN: usize = 32;

/// Opaque session identifier of 0 to 32 bytes, compared by byte equality.
#[derive(Clone, Copy)]
pub struct SessionId([u8; MAX_SESSION_ID_LEN], usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSessionIdLength(pub usize);

impl fmt::Display for InvalidSessionIdLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incorrect session id length: {} > {}",
            self.0, MAX_SESSION_ID_LEN
        )
    }
}

impl std::error::Error for InvalidSessionIdLength {}

impl SessionId {
    /// The empty id, sent when no session is offered.
    pub fn empty() -> Self {
        SessionId([0; MAX_SESSION_ID_LEN], 0)
    }

    pub fn try_new(data: &[u8]) -> Result<Self, InvalidSessionIdLength> {
        if data.len() > MAX_SESSION_ID_LEN {
            return Err(InvalidSessionIdLength(data.len()));
        }
        let mut array = [0; MAX_SESSION_ID_LEN];
        array[..data.len()].copy_from_slice(data);
        Ok(SessionId(array, data.len()))
    }

    /// A fresh random id of full length.
    pub fn random() -> Self {
        let mut t = rand::thread_rng();
        let mut arr = [0; MAX_SESSION_ID_LEN];
        t.fill(&mut arr[..]);
        SessionId(arr, MAX_SESSION_ID_LEN)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, len) = be_u8(input)?;
        if len as usize > MAX_SESSION_ID_LEN {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, data) = take(len as usize)(input)?;
        let mut array = [0; MAX_SESSION_ID_LEN];
        array[..data.len()].copy_from_slice(data);
        Ok((input, SessionId(array, data.len())))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.1 as u8);
        output.extend_from_slice(self);
    }
}

impl Default for SessionId {
    fn default() -> Self {
        SessionId::empty()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId(")?;
        for b in self.iter() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        self.deref() == other.deref()
    }
}

impl Eq for SessionId {}

impl Hash for SessionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.deref().hash(state)
    }
}

impl Deref for SessionId {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0[..self.1]
    }
}

impl<'a> TryFrom<&'a [u8]> for SessionId {
    type Error = InvalidSessionIdLength;

    fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}
