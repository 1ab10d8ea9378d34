//! Pure Rust cryptographic provider built on the RustCrypto crates.
//!
//! # Usage
//!
//! ```
//! use timpl::Config;
//! use timpl::crypto::rust_crypto;
//!
//! let config = Config::builder()
//!     .with_crypto_provider(rust_crypto::default_provider())
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! ```

mod cipher_suite;
mod dh;
mod hash;
mod hmac;
mod key_transport;
mod kx_group;
mod sign;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # Supported Cipher Suites
///
/// AES-GCM and AES-CBC suites with RSA, DHE_RSA, ECDHE, static ECDH and
/// anonymous key exchange. DSS, static finite field DH and RC4 suites are
/// recognised but have no implementation here.
///
/// # Key Exchange Groups
///
/// - `x25519`
/// - `secp256r1` (P-256)
/// - `secp384r1` (P-384)
/// - Finite field groups sent by the server, 512 to 8192 bits
///
/// # Signatures
///
/// RSA PKCS#1 v1.5 and ECDSA over P-256 and P-384, with MD5+SHA-1 for
/// TLS 1.0/1.1 and SHA-1 or SHA-2 for TLS 1.2.
///
/// # Key Formats
///
/// - PKCS#8 DER (RSA and EC)
/// - PKCS#1 DER (RSA) and SEC1 DER (EC)
/// - PEM encoded versions of the above
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: cipher_suite::ALL_CIPHER_SUITES,
        kx_groups: kx_group::ALL_KX_GROUPS,
        dh: &dh::DH,
        key_transport: &key_transport::KEY_TRANSPORT,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        key_provider: &sign::KEY_PROVIDER,
        secure_random: &key_transport::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        prf_provider: &hmac::PRF_PROVIDER,
    }
}
