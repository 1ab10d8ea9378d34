//! Key derivation for TLS 1.0 to 1.2 on top of the provider PRF.

use zeroize::Zeroizing;

use super::provider::PrfProvider;
use crate::types::{CipherSuite, HashAlgorithm, ProtocolVersion};

pub const MASTER_SECRET_LEN: usize = 48;

pub const VERIFY_DATA_LEN: usize = 12;

pub type MasterSecret = Zeroizing<[u8; MASTER_SECRET_LEN]>;

/// PRF hash in use for `version`. Before TLS 1.2 this is the MD5/SHA-1 split.
pub fn prf_hash(version: ProtocolVersion, suite: CipherSuite) -> HashAlgorithm {
    if version.is_tls12() {
        suite.prf_hash()
    } else {
        HashAlgorithm::None
    }
}

fn to_master_secret(out: Vec<u8>) -> Result<MasterSecret, String> {
    let out = Zeroizing::new(out);
    if out.len() != MASTER_SECRET_LEN {
        return Err(format!("PRF returned {} bytes", out.len()));
    }
    let mut ms = Zeroizing::new([0u8; MASTER_SECRET_LEN]);
    ms.copy_from_slice(&out);
    Ok(ms)
}

/// master_secret = PRF(pre_master_secret, "master secret", client_random + server_random)
pub fn master_secret(
    prf: &dyn PrfProvider,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    hash: HashAlgorithm,
) -> Result<MasterSecret, String> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);
    let out = prf.prf(
        pre_master_secret,
        "master secret",
        &seed,
        MASTER_SECRET_LEN,
        hash,
    )?;
    to_master_secret(out)
}

/// Extended Master Secret (RFC 7627)
///
/// master_secret = PRF(pre_master_secret, "extended master secret", session_hash)
pub fn extended_master_secret(
    prf: &dyn PrfProvider,
    pre_master_secret: &[u8],
    session_hash: &[u8],
    hash: HashAlgorithm,
) -> Result<MasterSecret, String> {
    let out = prf.prf(
        pre_master_secret,
        "extended master secret",
        session_hash,
        MASTER_SECRET_LEN,
        hash,
    )?;
    to_master_secret(out)
}

/// Record keys for both directions, sliced from the key block.
pub struct KeyBlock {
    bytes: Zeroizing<Vec<u8>>,
    mac_len: usize,
    key_len: usize,
    iv_len: usize,
}

impl KeyBlock {
    fn part(&self, index: usize, len: usize) -> &[u8] {
        let start = match index {
            0 => 0,
            1 => self.mac_len,
            2 => 2 * self.mac_len,
            3 => 2 * self.mac_len + self.key_len,
            4 => 2 * (self.mac_len + self.key_len),
            _ => 2 * (self.mac_len + self.key_len) + self.iv_len,
        };
        &self.bytes[start..start + len]
    }

    pub fn client_mac_key(&self) -> &[u8] {
        self.part(0, self.mac_len)
    }

    pub fn server_mac_key(&self) -> &[u8] {
        self.part(1, self.mac_len)
    }

    pub fn client_key(&self) -> &[u8] {
        self.part(2, self.key_len)
    }

    pub fn server_key(&self) -> &[u8] {
        self.part(3, self.key_len)
    }

    pub fn client_iv(&self) -> &[u8] {
        self.part(4, self.iv_len)
    }

    pub fn server_iv(&self) -> &[u8] {
        self.part(5, self.iv_len)
    }
}

/// key_block = PRF(master_secret, "key expansion", server_random + client_random)
pub fn key_block(
    prf: &dyn PrfProvider,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    suite: CipherSuite,
    hash: HashAlgorithm,
) -> Result<KeyBlock, String> {
    let (mac_len, key_len, iv_len) = suite.key_lengths();
    let total = 2 * (mac_len + key_len + iv_len);

    // Note the reversed order compared to the master secret.
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);

    let bytes = Zeroizing::new(prf.prf(master_secret, "key expansion", &seed, total, hash)?);
    if bytes.len() != total {
        return Err(format!("PRF returned {} bytes", bytes.len()));
    }

    Ok(KeyBlock {
        bytes,
        mac_len,
        key_len,
        iv_len,
    })
}

/// verify_data = PRF(master_secret, finished_label, Hash(handshake_messages))
pub fn verify_data(
    prf: &dyn PrfProvider,
    master_secret: &[u8],
    client: bool,
    handshake_hash: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, String> {
    let label = if client {
        "client finished"
    } else {
        "server finished"
    };
    prf.prf(master_secret, label, handshake_hash, VERIFY_DATA_LEN, hash)
}
