use nom::IResult;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub fn new(verify_data: Vec<u8>) -> Self {
        Finished { verify_data }
    }

    /// The whole body is verify_data.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        Ok((&input[input.len()..], Finished::new(input.to_vec())))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.verify_data);
    }

    /// Constant time comparison against locally computed verify_data.
    pub fn verify(&self, expected: &[u8]) -> bool {
        self.verify_data.len() == expected.len() && bool::from(self.verify_data.ct_eq(expected))
    }
}
