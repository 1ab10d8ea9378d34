//! Hash implementations using RustCrypto.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha384, Sha512};

use crate::crypto::provider::{Digest, HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
#[derive(Debug, Clone)]
enum RustCryptoHashContext {
    /// MD5 and SHA-1 side by side, for TLS 1.0/1.1.
    Legacy(Md5, Sha1),
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

fn to_digest(bytes: &[u8]) -> Digest {
    let mut out = Digest::new();
    out.extend_from_slice(bytes);
    out
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Legacy(md5, sha1) => {
                md5.update(data);
                sha1.update(data);
            }
            RustCryptoHashContext::Md5(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha1(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha256(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha384(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha512(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self) -> Digest {
        match self.clone() {
            RustCryptoHashContext::Legacy(md5, sha1) => {
                let mut out = to_digest(&md5.finalize());
                out.extend_from_slice(&sha1.finalize());
                out
            }
            RustCryptoHashContext::Md5(ctx) => to_digest(&ctx.finalize()),
            RustCryptoHashContext::Sha1(ctx) => to_digest(&ctx.finalize()),
            RustCryptoHashContext::Sha256(ctx) => to_digest(&ctx.finalize()),
            RustCryptoHashContext::Sha384(ctx) => to_digest(&ctx.finalize()),
            RustCryptoHashContext::Sha512(ctx) => to_digest(&ctx.finalize()),
        }
    }
}

/// One shot digest, used by signing and verification.
pub(super) fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Result<Digest, String> {
    let mut ctx = new_context(algorithm)?;
    ctx.update(data);
    Ok(ctx.clone_and_finalize())
}

fn new_context(algorithm: HashAlgorithm) -> Result<RustCryptoHashContext, String> {
    Ok(match algorithm {
        HashAlgorithm::None => RustCryptoHashContext::Legacy(Md5::new(), Sha1::new()),
        HashAlgorithm::MD5 => RustCryptoHashContext::Md5(Md5::new()),
        HashAlgorithm::SHA1 => RustCryptoHashContext::Sha1(Sha1::new()),
        HashAlgorithm::SHA256 => RustCryptoHashContext::Sha256(Sha256::new()),
        HashAlgorithm::SHA384 => RustCryptoHashContext::Sha384(Sha384::new()),
        HashAlgorithm::SHA512 => RustCryptoHashContext::Sha512(Sha512::new()),
        _ => return Err(format!("Unsupported hash algorithm: {:?}", algorithm)),
    })
}

/// Hash provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn HashContext>, String> {
        Ok(Box::new(new_context(algorithm)?))
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;
