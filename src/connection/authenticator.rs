use crate::crypto::{NullCipher, RecordCipher};
use crate::types::{ContentType, ProtocolVersion};

/// From here on the sequence number is about to wrap.
const SEQUENCE_OVERFLOW: u64 = 0xFFFF_FFFF_FFFF_FF00;

/// From here on fresh keys should be negotiated.
const SEQUENCE_HUGE: u64 = 0xFFFF_0000_0000_0000;

/// Protection state of one direction: the cipher and its sequence number.
#[derive(Debug)]
pub(crate) struct Authenticator {
    cipher: Box<dyn RecordCipher>,
    sequence_number: u64,
}

impl Authenticator {
    pub fn null() -> Self {
        Authenticator::new(Box::new(NullCipher))
    }

    pub fn new(cipher: Box<dyn RecordCipher>) -> Self {
        Authenticator {
            cipher,
            sequence_number: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.cipher.is_null()
    }

    pub fn is_cbc_mode(&self) -> bool {
        self.cipher.is_cbc_mode()
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    #[cfg(test)]
    pub fn set_sequence_number(&mut self, value: u64) {
        self.sequence_number = value;
    }

    /// A few more records would wrap the sequence number.
    pub fn seq_num_overflow(&self) -> bool {
        self.sequence_number >= SEQUENCE_OVERFLOW
    }

    /// The sequence number is large enough to ask for new keys.
    pub fn seq_num_is_huge(&self) -> bool {
        self.sequence_number >= SEQUENCE_HUGE
    }

    pub fn encrypt(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, String> {
        let seq = self.next_sequence_number()?;
        self.cipher.encrypt(seq, content_type, version, plaintext)
    }

    pub fn decrypt(
        &mut self,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<Vec<u8>, String> {
        let seq = self.next_sequence_number()?;
        self.cipher.decrypt(seq, content_type, version, fragment)
    }

    pub fn dispose(&mut self) {
        self.cipher.dispose();
    }

    fn next_sequence_number(&mut self) -> Result<u64, String> {
        let seq = self.sequence_number;
        self.sequence_number = seq
            .checked_add(1)
            .ok_or_else(|| "sequence number wrapped".to_string())?;
        Ok(seq)
    }
}
