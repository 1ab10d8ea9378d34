//! Finite field Diffie-Hellman using num-bigint.

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::crypto::provider::{ActiveKeyExchange, DhKeyExchange};

/// Smallest modulus accepted from a server.
const MIN_PRIME_BITS: u64 = 512;
/// Largest modulus we are willing to compute with.
const MAX_PRIME_BITS: u64 = 8192;

struct FfdhKeyExchange {
    p: BigUint,
    x: BigUint,
    public_key: Vec<u8>,
}

impl std::fmt::Debug for FfdhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfdhKeyExchange")
            .field("bits", &self.p.bits())
            .finish_non_exhaustive()
    }
}

impl ActiveKeyExchange for FfdhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        &self.public_key
    }

    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String> {
        let y = BigUint::from_bytes_be(peer_pub);
        let one = BigUint::from(1u8);
        // 1 < Ys < p - 1
        if y <= one || y >= &self.p - &one {
            return Err("Invalid DH public value".to_string());
        }
        let z = Zeroizing::new(y.modpow(&self.x, &self.p).to_bytes_be());
        // RFC 5246 8.1.2: leading zero bytes are stripped, which to_bytes_be does.
        Ok(z.to_vec())
    }
}

#[derive(Debug)]
pub(super) struct RustCryptoDh;

impl DhKeyExchange for RustCryptoDh {
    fn start_exchange(&self, p: &[u8], g: &[u8]) -> Result<Box<dyn ActiveKeyExchange>, String> {
        let p = BigUint::from_bytes_be(p);
        let g = BigUint::from_bytes_be(g);
        let bits = p.bits();
        if !(MIN_PRIME_BITS..=MAX_PRIME_BITS).contains(&bits) {
            return Err(format!("Unsupported DH prime size: {} bits", bits));
        }
        let one = BigUint::from(1u8);
        if g <= one || g >= &p - &one {
            return Err("Invalid DH generator".to_string());
        }

        let two = BigUint::from(2u8);
        let x = OsRng.gen_biguint_range(&two, &(&p - &one));
        let public_key = g.modpow(&x, &p).to_bytes_be();
        Ok(Box::new(FfdhKeyExchange { p, x, public_key }))
    }
}

pub(super) static DH: RustCryptoDh = RustCryptoDh;
