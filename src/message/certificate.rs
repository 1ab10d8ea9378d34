use nom::bytes::complete::take;
use nom::number::complete::be_u24;
use nom::IResult;

use crate::util::{expect_empty, write_u24_prefixed};

/// Certificate message: a DER chain, leaf first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Certificate {
    pub certificate_list: Vec<Vec<u8>>,
}

impl Certificate {
    pub fn new(certificate_list: Vec<Vec<u8>>) -> Self {
        Certificate { certificate_list }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Certificate> {
        let (input, total_len) = be_u24(input)?;
        let (input, mut list) = take(total_len as usize)(input)?;

        let mut certificate_list = Vec::new();
        while !list.is_empty() {
            let (rest, len) = be_u24(list)?;
            let (rest, der) = take(len as usize)(rest)?;
            certificate_list.push(der.to_vec());
            list = rest;
        }
        expect_empty(list)?;

        Ok((input, Certificate { certificate_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let total: usize = self.certificate_list.iter().map(|c| c.len() + 3).sum();
        output.extend_from_slice(&(total as u32).to_be_bytes()[1..]);
        for der in &self.certificate_list {
            write_u24_prefixed(output, der);
        }
    }
}
