use super::provider::{Digest, HashProvider};
use crate::types::HashAlgorithm;

/// Every handshake message of one handshake, in order, as sent on the wire.
///
/// The bytes are kept rather than a running hash since the hash is not known
/// until ServerHello, and CertificateVerify may need a different one.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, message: &[u8]) {
        self.messages.extend_from_slice(message);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Hash of everything so far. `HashAlgorithm::None` gives MD5 followed by SHA-1.
    pub fn digest(&self, hashes: &dyn HashProvider, hash: HashAlgorithm) -> Result<Digest, String> {
        let mut ctx = hashes.create_hash(hash)?;
        ctx.update(&self.messages);
        Ok(ctx.clone_and_finalize())
    }
}
