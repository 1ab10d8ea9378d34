//! TLS PRF and HMAC utilities using RustCrypto.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

use crate::crypto::provider::PrfProvider;
use crate::types::HashAlgorithm;

/// P_hash(secret, seed) from RFC 5246 section 5.
pub(super) fn p_hash<M: Mac + KeyInit + Clone>(
    secret: &[u8],
    full_seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, String> {
    let key = <M as KeyInit>::new_from_slice(secret)
        .map_err(|_| "Invalid HMAC key length".to_string())?;
    let mut out = Vec::with_capacity(output_len);

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = key.clone().chain_update(full_seed).finalize().into_bytes();

    while out.len() < output_len {
        // HMAC_hash(secret, A(i) + seed)
        let output = key
            .clone()
            .chain_update(&a)
            .chain_update(full_seed)
            .finalize()
            .into_bytes();

        let to_copy = (output_len - out.len()).min(output.len());
        out.extend_from_slice(&output[..to_copy]);

        // A(i+1) = HMAC_hash(secret, A(i))
        a = key.clone().chain_update(&a).finalize().into_bytes();
    }

    Ok(out)
}

/// HMAC over the concatenation of `parts`.
pub(super) fn hmac<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, String> {
    let mut mac =
        <M as KeyInit>::new_from_slice(key).map_err(|_| "Invalid HMAC key".to_string())?;
    for p in parts {
        mac.update(p);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// PRF provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoPrfProvider;

impl PrfProvider for RustCryptoPrfProvider {
    fn prf(
        &self,
        secret: &[u8],
        label: &str,
        seed: &[u8],
        output_len: usize,
        hash: HashAlgorithm,
    ) -> Result<Vec<u8>, String> {
        if !label.is_ascii() {
            return Err("PRF label must be ASCII".to_string());
        }
        let mut full_seed = Vec::with_capacity(label.len() + seed.len());
        full_seed.extend_from_slice(label.as_bytes());
        full_seed.extend_from_slice(seed);

        match hash {
            HashAlgorithm::None => {
                // TLS 1.0/1.1: P_MD5(S1) XOR P_SHA-1(S2), halves overlapping on odd length.
                let half = secret.len().div_ceil(2);
                let s1 = &secret[..half];
                let s2 = &secret[secret.len() - half..];
                let mut out = p_hash::<Hmac<Md5>>(s1, &full_seed, output_len)?;
                let sha = p_hash::<Hmac<Sha1>>(s2, &full_seed, output_len)?;
                for (o, s) in out.iter_mut().zip(sha) {
                    *o ^= s;
                }
                Ok(out)
            }
            HashAlgorithm::SHA256 => p_hash::<Hmac<Sha256>>(secret, &full_seed, output_len),
            HashAlgorithm::SHA384 => p_hash::<Hmac<Sha384>>(secret, &full_seed, output_len),
            _ => Err(format!("Unsupported PRF hash: {:?}", hash)),
        }
    }
}

/// Static instance of the PRF provider.
pub(super) static PRF_PROVIDER: RustCryptoPrfProvider = RustCryptoPrfProvider;
