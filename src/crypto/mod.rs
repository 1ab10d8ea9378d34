//! Cryptographic collaborators of the handshake engine.
//!
//! The engine only talks to the traits in [`provider`]. A pure Rust
//! implementation is in [`rust_crypto`] and is the default.

mod prf;
pub mod provider;
pub mod rust_crypto;
mod transcript;

pub use provider::{ActiveKeyExchange, CryptoProvider, CryptoSafe, Digest, DhKeyExchange};
pub use provider::{HashContext, HashProvider, KeyProvider, KeyTransport, PrfProvider};
pub use provider::{PublicKeyInfo, RecordCipher, SecureRandom, SignatureVerifier, SigningKey};
pub use provider::{SupportedCipherSuite, SupportedKxGroup};

pub(crate) use prf::{extended_master_secret, key_block, master_secret, prf_hash, verify_data};
pub use prf::{MasterSecret, MASTER_SECRET_LEN, VERIFY_DATA_LEN};
pub(crate) use transcript::Transcript;

/// Record protection before the first ChangeCipherSpec.
#[derive(Debug, Default)]
pub struct NullCipher;

impl RecordCipher for NullCipher {
    fn encrypt(
        &mut self,
        _seq: u64,
        _content_type: crate::types::ContentType,
        _version: crate::types::ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, String> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(
        &mut self,
        _seq: u64,
        _content_type: crate::types::ContentType,
        _version: crate::types::ProtocolVersion,
        fragment: &[u8],
    ) -> Result<Vec<u8>, String> {
        Ok(fragment.to_vec())
    }

    fn is_null(&self) -> bool {
        true
    }
}
