//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The handshake engine never touches a cipher, hash or public key directly.
//! Everything goes through the components held by a [`CryptoProvider`]:
//!
//! - **Cipher suites** ([`SupportedCipherSuite`]): factory for [`RecordCipher`]
//! - **EC groups** ([`SupportedKxGroup`]): ephemeral and static ECDH
//! - **Finite field DH** ([`DhKeyExchange`]): DHE and DH_anon
//! - **Key transport** ([`KeyTransport`]): RSA encrypted premaster secrets
//! - **Signature verification** ([`SignatureVerifier`]): certificate keys
//! - **Key provider** ([`KeyProvider`]): client authentication keys
//! - **Secure random** ([`SecureRandom`])
//! - **Hashes** ([`HashProvider`]) and the **PRF** ([`PrfProvider`])
//!
//! Components are `&'static dyn Trait` references so a provider is cheap to
//! clone and share between connections.
//!
//! Where a trait takes a [`HashAlgorithm`], `HashAlgorithm::None` selects the
//! TLS 1.0/1.1 construction: the MD5/SHA-1 split PRF, and the MD5 plus SHA-1
//! signature digest.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

use once_cell::sync::OnceCell;
use tinyvec::ArrayVec;

use crate::types::{CipherSuite, ContentType, HashAlgorithm, NamedCurve, ProtocolVersion};
use crate::types::SignatureAlgorithm;

/// Marker trait for types that are safe to use in crypto provider components.
///
/// Automatically implemented for all types that satisfy the bounds.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

/// A finished digest. Large enough for SHA-512 and for MD5 plus SHA-1.
pub type Digest = ArrayVec<[u8; 64]>;

/// Protection for one direction of the record stream.
///
/// `seq` is the record sequence number, which feeds the MAC or the AEAD
/// nonce and additional data.
pub trait RecordCipher: Send + Debug {
    /// Protect a plaintext fragment.
    fn encrypt(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, String>;

    /// Remove protection from a fragment. Any failure is a bad record MAC.
    fn decrypt(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<Vec<u8>, String>;

    /// Whether this is the initial null protection.
    fn is_null(&self) -> bool {
        false
    }

    /// Whether this is a CBC mode block cipher.
    fn is_cbc_mode(&self) -> bool {
        false
    }

    /// Wipe key material. The cipher must not be used afterwards.
    fn dispose(&mut self) {}
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    fn update(&mut self, data: &[u8]);

    /// Finalize a copy of the context. The original can continue to be updated.
    fn clone_and_finalize(&self) -> Digest;
}

/// Signing key for client authentication.
pub trait SigningKey: CryptoSafe {
    /// Sign `data`, hashing it with `hash` first.
    fn sign(&mut self, data: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, String>;

    fn algorithm(&self) -> SignatureAlgorithm;
}

/// One side of a key agreement, created for a single handshake.
pub trait ActiveKeyExchange: CryptoSafe {
    /// Our public value as sent in ClientKeyExchange.
    fn pub_key(&self) -> &[u8];

    /// Complete the exchange with the peer's public value, returning the
    /// premaster secret.
    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String>;
}

/// Cipher suite support (factory for [`RecordCipher`]).
pub trait SupportedCipherSuite: CryptoSafe {
    fn suite(&self) -> CipherSuite;

    /// Create the cipher for one direction from its slice of the key block.
    fn create_cipher(
        &self,
        version: ProtocolVersion,
        mac_key: &[u8],
        enc_key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn RecordCipher>, String>;
}

/// Named elliptic curve group (factory for [`ActiveKeyExchange`]).
pub trait SupportedKxGroup: CryptoSafe {
    fn name(&self) -> NamedCurve;

    /// Generate an ephemeral key pair on this curve.
    fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// Finite field Diffie-Hellman over server supplied parameters.
pub trait DhKeyExchange: CryptoSafe {
    /// Generate a key pair in the group `(p, g)`, both big endian.
    fn start_exchange(&self, p: &[u8], g: &[u8]) -> Result<Box<dyn ActiveKeyExchange>, String>;
}

/// RSA key transport of the premaster secret.
pub trait KeyTransport: CryptoSafe {
    /// Encrypt under the RSA key of a DER certificate (PKCS#1 v1.5).
    fn encrypt_to_certificate(&self, cert_der: &[u8], data: &[u8]) -> Result<Vec<u8>, String>;

    /// Encrypt under an ephemeral RSA key given as modulus and exponent.
    fn encrypt_to_key(&self, modulus: &[u8], exponent: &[u8], data: &[u8])
        -> Result<Vec<u8>, String>;
}

/// What the engine needs to know about a certificate's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    pub algorithm: SignatureAlgorithm,
    /// Modulus size for RSA and DSA, field size for EC.
    pub bits: usize,
    /// Curve of an EC key.
    pub curve: Option<NamedCurve>,
    /// Raw subjectPublicKey bits, the SEC1 point for EC keys.
    pub public_key: Vec<u8>,
}

/// Signature verification against certificates.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify a signature on data using a DER-encoded X.509 certificate.
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        hash_alg: HashAlgorithm,
        sig_alg: SignatureAlgorithm,
    ) -> Result<(), String>;

    /// Describe the subject public key of a DER certificate.
    fn public_key_info(&self, cert_der: &[u8]) -> Result<PublicKeyInfo, String>;
}

/// Private key parser (factory for [`SigningKey`]).
pub trait KeyProvider: CryptoSafe {
    /// Parse and load a private key from DER/PEM bytes.
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for [`HashContext`]).
pub trait HashProvider: CryptoSafe {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String>;
}

/// The TLS PRF (RFC 2246 section 5, RFC 5246 section 5).
pub trait PrfProvider: CryptoSafe {
    /// PRF(secret, label, seed) truncated to `output_len`.
    fn prf(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        output_len: usize,
        hash: HashAlgorithm,
    ) -> Result<Vec<u8>, String>;
}

/// Cryptographic provider for the handshake engine and record protection.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Cipher suites with record protection and key exchange support.
    ///
    /// A suite missing here is never offered, even when configured.
    pub cipher_suites: &'static [&'static dyn SupportedCipherSuite],

    /// Supported EC groups, most preferred first.
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    pub dh: &'static dyn DhKeyExchange,

    pub key_transport: &'static dyn KeyTransport,

    pub signature_verification: &'static dyn SignatureVerifier,

    pub key_provider: &'static dyn KeyProvider,

    pub secure_random: &'static dyn SecureRandom,

    pub hash_provider: &'static dyn HashProvider,

    pub prf_provider: &'static dyn PrfProvider,
}

static DEFAULT: OnceCell<CryptoProvider> = OnceCell::new();

impl CryptoProvider {
    /// Install a process wide default provider.
    ///
    /// Returns the provider back if a default was already installed.
    pub fn install_default(provider: CryptoProvider) -> Result<(), CryptoProvider> {
        DEFAULT.set(provider)
    }

    /// The installed default provider, if any.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    /// Look up the factory for a suite.
    pub fn find_cipher_suite(&self, suite: CipherSuite) -> Option<&'static dyn SupportedCipherSuite> {
        self.cipher_suites.iter().copied().find(|s| s.suite() == suite)
    }

    pub fn find_kx_group(&self, curve: NamedCurve) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().copied().find(|g| g.name() == curve)
    }

    /// Whether both record protection and key exchange of `suite` are available.
    pub fn supports(&self, suite: CipherSuite) -> bool {
        suite.is_scsv() || self.find_cipher_suite(suite).is_some()
    }

    /// Fill a fresh vector with `len` random bytes.
    pub fn random_bytes(&self, len: usize) -> Result<Vec<u8>, String> {
        let mut out = vec![0; len];
        self.secure_random.fill(&mut out)?;
        Ok(out)
    }
}
