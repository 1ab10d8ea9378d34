//! RSA key transport and the secure random source.

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};

use super::sign::certificate_rsa_key;
use crate::crypto::provider::{KeyTransport, SecureRandom};

/// PKCS#1 v1.5 encryption of the premaster secret.
#[derive(Debug)]
pub(super) struct RustCryptoKeyTransport;

impl KeyTransport for RustCryptoKeyTransport {
    fn encrypt_to_certificate(&self, cert_der: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
        let key = certificate_rsa_key(cert_der)?;
        key.encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
            .map_err(|e| format!("RSA encryption failed: {e}"))
    }

    fn encrypt_to_key(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, String> {
        let key = RsaPublicKey::new(
            BigUint::from_bytes_be(modulus),
            BigUint::from_bytes_be(exponent),
        )
        .map_err(|e| format!("Invalid RSA key: {e}"))?;
        key.encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
            .map_err(|e| format!("RSA encryption failed: {e}"))
    }
}

pub(super) static KEY_TRANSPORT: RustCryptoKeyTransport = RustCryptoKeyTransport;

/// Operating system randomness through `rand`.
#[derive(Debug)]
pub(super) struct RustCryptoSecureRandom;

impl SecureRandom for RustCryptoSecureRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), String> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| format!("Random generation failed: {e}"))
    }
}

pub(super) static SECURE_RANDOM: RustCryptoSecureRandom = RustCryptoSecureRandom;
