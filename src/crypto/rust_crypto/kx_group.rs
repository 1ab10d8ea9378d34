//! Key exchange group implementations using RustCrypto.

use p256::{ecdh::EphemeralSecret, PublicKey as P256PublicKey};
use p384::{ecdh::EphemeralSecret as P384EphemeralSecret, PublicKey as P384PublicKey};
use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret as X25519Secret, PublicKey as X25519PublicKey};

use crate::crypto::provider::{ActiveKeyExchange, SupportedKxGroup};
use crate::types::NamedCurve;

/// ECDH key exchange, ephemeral on our side.
///
/// Against a static server key the peer value is the point from the
/// certificate instead of ServerKeyExchange.
enum EcdhKeyExchange {
    P256 {
        secret: EphemeralSecret,
        public_key: Vec<u8>,
    },
    P384 {
        secret: P384EphemeralSecret,
        public_key: Vec<u8>,
    },
    X25519 {
        secret: X25519Secret,
        public_key: Vec<u8>,
    },
}

impl std::fmt::Debug for EcdhKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, public_key) = match self {
            EcdhKeyExchange::P256 { public_key, .. } => ("EcdhKeyExchange::P256", public_key),
            EcdhKeyExchange::P384 { public_key, .. } => ("EcdhKeyExchange::P384", public_key),
            EcdhKeyExchange::X25519 { public_key, .. } => ("EcdhKeyExchange::X25519", public_key),
        };
        f.debug_struct(name)
            .field("public_key_len", &public_key.len())
            .finish_non_exhaustive()
    }
}

impl EcdhKeyExchange {
    fn new(curve: NamedCurve) -> Result<Self, String> {
        match curve {
            NamedCurve::Secp256r1 => {
                let secret = EphemeralSecret::random(&mut OsRng);
                let public_key = P256PublicKey::from(&secret).to_sec1_bytes().to_vec();
                Ok(EcdhKeyExchange::P256 { secret, public_key })
            }
            NamedCurve::Secp384r1 => {
                let secret = P384EphemeralSecret::random(&mut OsRng);
                let public_key = P384PublicKey::from(&secret).to_sec1_bytes().to_vec();
                Ok(EcdhKeyExchange::P384 { secret, public_key })
            }
            NamedCurve::X25519 => {
                let secret = X25519Secret::random_from_rng(OsRng);
                let public_key = X25519PublicKey::from(&secret).as_bytes().to_vec();
                Ok(EcdhKeyExchange::X25519 { secret, public_key })
            }
            _ => Err(format!("Unsupported curve: {:?}", curve)),
        }
    }
}

impl ActiveKeyExchange for EcdhKeyExchange {
    fn pub_key(&self) -> &[u8] {
        match self {
            EcdhKeyExchange::P256 { public_key, .. } => public_key,
            EcdhKeyExchange::P384 { public_key, .. } => public_key,
            EcdhKeyExchange::X25519 { public_key, .. } => public_key,
        }
    }

    fn complete(self: Box<Self>, peer_pub: &[u8]) -> Result<Vec<u8>, String> {
        match *self {
            EcdhKeyExchange::P256 { secret, .. } => {
                let peer_key = P256PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared = secret.diffie_hellman(&peer_key);
                Ok(shared.raw_secret_bytes().to_vec())
            }
            EcdhKeyExchange::P384 { secret, .. } => {
                let peer_key = P384PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared = secret.diffie_hellman(&peer_key);
                Ok(shared.raw_secret_bytes().to_vec())
            }
            EcdhKeyExchange::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_pub
                    .try_into()
                    .map_err(|_| "Invalid X25519 public key".to_string())?;
                let shared = secret.diffie_hellman(&X25519PublicKey::from(peer));
                if !shared.was_contributory() {
                    return Err("X25519 shared secret is all zero".to_string());
                }
                Ok(shared.as_bytes().to_vec())
            }
        }
    }
}

macro_rules! kx_group {
    ($ty:ident, $curve:ident) => {
        #[derive(Debug)]
        struct $ty;

        impl SupportedKxGroup for $ty {
            fn name(&self) -> NamedCurve {
                NamedCurve::$curve
            }

            fn start_exchange(&self) -> Result<Box<dyn ActiveKeyExchange>, String> {
                Ok(Box::new(EcdhKeyExchange::new(NamedCurve::$curve)?))
            }
        }
    };
}

kx_group!(X25519, X25519);
kx_group!(P256, Secp256r1);
kx_group!(P384, Secp384r1);

static KX_GROUP_X25519: X25519 = X25519;
static KX_GROUP_P256: P256 = P256;
static KX_GROUP_P384: P384 = P384;

/// All supported key exchange groups, most preferred first.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[&KX_GROUP_X25519, &KX_GROUP_P256, &KX_GROUP_P384];
