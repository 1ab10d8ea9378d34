//! Record protection for the supported cipher suites using RustCrypto.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit as BlockKeyInit};
use aes_gcm::aes::{Aes128, Aes256, Block};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key, Nonce};
use hmac::Hmac;
use md5::Md5;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::hmac::hmac;
use crate::crypto::provider::{RecordCipher, SupportedCipherSuite};
use crate::types::{BulkCipher, CipherSuite, ContentType, MacAlgorithm, ProtocolVersion};

const GCM_EXPLICIT_NONCE_LEN: usize = 8;
const GCM_TAG_LEN: usize = 16;
const AES_BLOCK_LEN: usize = 16;

/// seq_num + type + version + length, shared by the MAC and AEAD additional data.
fn pseudo_header(
    seq: u64,
    content_type: ContentType,
    version: ProtocolVersion,
    len: usize,
) -> [u8; 13] {
    let mut out = [0u8; 13];
    out[..8].copy_from_slice(&seq.to_be_bytes());
    out[8] = content_type.as_u8();
    out[9..11].copy_from_slice(&version.as_u16().to_be_bytes());
    out[11..].copy_from_slice(&(len as u16).to_be_bytes());
    out
}

enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// AES-GCM record protection (RFC 5288).
struct GcmRecordCipher {
    aead: AesGcm,
    salt: [u8; 4],
}

impl std::fmt::Debug for GcmRecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.aead {
            AesGcm::Aes128(_) => f.debug_tuple("GcmRecordCipher::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("GcmRecordCipher::Aes256").finish(),
        }
    }
}

impl GcmRecordCipher {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self, String> {
        let aead = match key.len() {
            16 => AesGcm::Aes128(Box::new(Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key)))),
            32 => AesGcm::Aes256(Box::new(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))),
            _ => return Err(format!("Invalid key size for AES-GCM: {}", key.len())),
        };
        let salt: [u8; 4] = iv
            .try_into()
            .map_err(|_| format!("Invalid implicit nonce length: {}", iv.len()))?;
        Ok(GcmRecordCipher { aead, salt })
    }

    fn nonce(&self, explicit: &[u8]) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&self.salt);
        nonce[4..].copy_from_slice(explicit);
        nonce
    }
}

impl RecordCipher for GcmRecordCipher {
    fn encrypt(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, String> {
        // The sequence number doubles as the explicit nonce.
        let explicit = seq.to_be_bytes();
        let nonce = self.nonce(&explicit);
        let aad = pseudo_header(seq, content_type, version, plaintext.len());

        let mut out = Vec::with_capacity(GCM_EXPLICIT_NONCE_LEN + plaintext.len() + GCM_TAG_LEN);
        out.extend_from_slice(&explicit);
        let mut body = plaintext.to_vec();
        let nonce = Nonce::from_slice(&nonce);
        match &self.aead {
            AesGcm::Aes128(c) => c.encrypt_in_place(nonce, &aad, &mut body),
            AesGcm::Aes256(c) => c.encrypt_in_place(nonce, &aad, &mut body),
        }
        .map_err(|_| "AES-GCM encryption failed".to_string())?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decrypt(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<Vec<u8>, String> {
        if fragment.len() < GCM_EXPLICIT_NONCE_LEN + GCM_TAG_LEN {
            return Err(format!("Ciphertext too short: {}", fragment.len()));
        }
        let (explicit, ciphertext) = fragment.split_at(GCM_EXPLICIT_NONCE_LEN);
        let nonce = self.nonce(explicit);
        let plain_len = ciphertext.len() - GCM_TAG_LEN;
        let aad = pseudo_header(seq, content_type, version, plain_len);

        let mut body = ciphertext.to_vec();
        let nonce = Nonce::from_slice(&nonce);
        match &self.aead {
            AesGcm::Aes128(c) => c.decrypt_in_place(nonce, &aad, &mut body),
            AesGcm::Aes256(c) => c.decrypt_in_place(nonce, &aad, &mut body),
        }
        .map_err(|_| "AES-GCM decryption failed".to_string())?;
        Ok(body)
    }

    fn dispose(&mut self) {
        self.salt = [0; 4];
    }
}

enum AesBlock {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl AesBlock {
    fn encrypt(&self, block: &mut Block) {
        match self {
            AesBlock::Aes128(c) => c.encrypt_block(block),
            AesBlock::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt(&self, block: &mut Block) {
        match self {
            AesBlock::Aes128(c) => c.decrypt_block(block),
            AesBlock::Aes256(c) => c.decrypt_block(block),
        }
    }
}

/// AES-CBC with HMAC, MAC-then-encrypt (RFC 5246 section 6.2.3.2).
///
/// TLS 1.0 chains the IV across records. Later versions send an explicit
/// random IV with every record.
struct CbcRecordCipher {
    block: AesBlock,
    mac: MacAlgorithm,
    mac_key: Zeroizing<Vec<u8>>,
    /// Chained IV for TLS 1.0, `None` when explicit.
    chained_iv: Option<[u8; AES_BLOCK_LEN]>,
}

impl std::fmt::Debug for CbcRecordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CbcRecordCipher")
            .field("mac", &self.mac)
            .field("chained_iv", &self.chained_iv.is_some())
            .finish_non_exhaustive()
    }
}

impl CbcRecordCipher {
    fn new(
        version: ProtocolVersion,
        mac: MacAlgorithm,
        mac_key: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self, String> {
        let block = match key.len() {
            16 => AesBlock::Aes128(Box::new(
                <Aes128 as BlockKeyInit>::new_from_slice(key).map_err(|_| "Invalid AES key")?,
            )),
            32 => AesBlock::Aes256(Box::new(
                <Aes256 as BlockKeyInit>::new_from_slice(key).map_err(|_| "Invalid AES key")?,
            )),
            _ => return Err(format!("Invalid key size for AES-CBC: {}", key.len())),
        };
        let chained_iv = if version <= ProtocolVersion::TLS1_0 {
            let iv: [u8; AES_BLOCK_LEN] = iv
                .try_into()
                .map_err(|_| format!("Invalid IV length: {}", iv.len()))?;
            Some(iv)
        } else {
            None
        };
        Ok(CbcRecordCipher {
            block,
            mac,
            mac_key: Zeroizing::new(mac_key.to_vec()),
            chained_iv,
        })
    }

    fn compute_mac(&self, header: &[u8; 13], data: &[u8]) -> Result<Vec<u8>, String> {
        match self.mac {
            MacAlgorithm::Md5 => hmac::<Hmac<Md5>>(&self.mac_key, &[header, data]),
            MacAlgorithm::Sha1 => hmac::<Hmac<Sha1>>(&self.mac_key, &[header, data]),
            MacAlgorithm::Sha256 => hmac::<Hmac<Sha256>>(&self.mac_key, &[header, data]),
            _ => Err(format!("Unsupported record MAC: {:?}", self.mac)),
        }
    }
}

impl RecordCipher for CbcRecordCipher {
    fn encrypt(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, String> {
        let header = pseudo_header(seq, content_type, version, plaintext.len());
        let mac = self.compute_mac(&header, plaintext)?;

        let mut data = Vec::with_capacity(plaintext.len() + mac.len() + AES_BLOCK_LEN);
        data.extend_from_slice(plaintext);
        data.extend_from_slice(&mac);
        let pad = AES_BLOCK_LEN - 1 - (data.len() % AES_BLOCK_LEN);
        data.extend(std::iter::repeat(pad as u8).take(pad + 1));

        let mut out = Vec::with_capacity(AES_BLOCK_LEN + data.len());
        let mut iv = match self.chained_iv {
            Some(iv) => iv,
            None => {
                let mut iv = [0u8; AES_BLOCK_LEN];
                OsRng.fill_bytes(&mut iv);
                out.extend_from_slice(&iv);
                iv
            }
        };

        for chunk in data.chunks(AES_BLOCK_LEN) {
            let mut block = Block::default();
            for (b, (p, v)) in block.iter_mut().zip(chunk.iter().zip(iv.iter())) {
                *b = p ^ v;
            }
            self.block.encrypt(&mut block);
            iv.copy_from_slice(&block);
            out.extend_from_slice(&block);
        }

        if self.chained_iv.is_some() {
            self.chained_iv = Some(iv);
        }
        Ok(out)
    }

    fn decrypt(
        &mut self,
        seq: u64,
        content_type: ContentType,
        version: ProtocolVersion,
        fragment: &[u8],
    ) -> Result<Vec<u8>, String> {
        let mac_len = self.mac.key_len();
        let (mut iv, ciphertext) = match self.chained_iv {
            Some(iv) => (iv, fragment),
            None => {
                if fragment.len() < AES_BLOCK_LEN {
                    return Err("Record shorter than its IV".to_string());
                }
                let (iv, rest) = fragment.split_at(AES_BLOCK_LEN);
                let mut arr = [0u8; AES_BLOCK_LEN];
                arr.copy_from_slice(iv);
                (arr, rest)
            }
        };

        if ciphertext.is_empty()
            || ciphertext.len() % AES_BLOCK_LEN != 0
            || ciphertext.len() < mac_len + 1
        {
            return Err(format!("Bad CBC record length: {}", ciphertext.len()));
        }

        let mut data = Vec::with_capacity(ciphertext.len());
        for chunk in ciphertext.chunks(AES_BLOCK_LEN) {
            let mut block = Block::clone_from_slice(chunk);
            self.block.decrypt(&mut block);
            for (b, v) in block.iter_mut().zip(iv.iter()) {
                *b ^= v;
            }
            iv.copy_from_slice(chunk);
            data.extend_from_slice(&block);
        }
        if self.chained_iv.is_some() {
            self.chained_iv = Some(iv);
        }

        // Check padding and MAC without revealing which one failed.
        let pad = data[data.len() - 1] as usize;
        let mut good = (pad + 1 + mac_len <= data.len()) as u8;
        let pad = if good == 1 { pad } else { 0 };
        for b in &data[data.len() - 1 - pad..] {
            good &= b.ct_eq(&(pad as u8)).unwrap_u8();
        }

        let plain_len = data.len() - 1 - pad - mac_len;
        let header = pseudo_header(seq, content_type, version, plain_len);
        let expected = self.compute_mac(&header, &data[..plain_len])?;
        good &= expected
            .ct_eq(&data[plain_len..plain_len + mac_len])
            .unwrap_u8();

        if good != 1 {
            return Err("Bad record MAC".to_string());
        }

        data.truncate(plain_len);
        Ok(data)
    }

    fn is_cbc_mode(&self) -> bool {
        true
    }

    fn dispose(&mut self) {
        self.mac_key.iter_mut().for_each(|b| *b = 0);
        self.chained_iv = None;
    }
}

/// A cipher suite whose record protection and key exchange we implement.
#[derive(Debug)]
struct RustCryptoSuite(CipherSuite);

impl SupportedCipherSuite for RustCryptoSuite {
    fn suite(&self) -> CipherSuite {
        self.0
    }

    fn create_cipher(
        &self,
        version: ProtocolVersion,
        mac_key: &[u8],
        enc_key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn RecordCipher>, String> {
        let bulk = self.0.bulk_cipher().ok_or("Unknown cipher suite")?;
        let mac = self.0.mac().ok_or("Unknown cipher suite")?;
        match bulk {
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => {
                Ok(Box::new(GcmRecordCipher::new(enc_key, iv)?))
            }
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => Ok(Box::new(CbcRecordCipher::new(
                version, mac, mac_key, enc_key, iv,
            )?)),
            _ => Err(format!("Unsupported bulk cipher: {:?}", bulk)),
        }
    }
}

macro_rules! supported_suites {
    ($($name:ident => $suite:ident,)*) => {
        $(static $name: RustCryptoSuite = RustCryptoSuite(CipherSuite::$suite);)*

        /// All supported cipher suites, in default preference order.
        pub(super) static ALL_CIPHER_SUITES: &[&dyn SupportedCipherSuite] = &[$(&$name),*];
    };
}

// Neither DSA nor static finite field DH are implemented, so the DSS and
// DH_RSA suites are missing. So is RC4.
supported_suites! {
    ECDHE_ECDSA_AES128_GCM => TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    ECDHE_ECDSA_AES256_GCM => TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    ECDHE_RSA_AES128_GCM => TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    ECDHE_RSA_AES256_GCM => TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    DHE_RSA_AES128_GCM => TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,
    ECDHE_ECDSA_AES128_CBC => TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    ECDHE_RSA_AES128_CBC => TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    DHE_RSA_AES128_CBC => TLS_DHE_RSA_WITH_AES_128_CBC_SHA,
    RSA_AES128_GCM => TLS_RSA_WITH_AES_128_GCM_SHA256,
    RSA_AES256_GCM => TLS_RSA_WITH_AES_256_GCM_SHA384,
    RSA_AES128_CBC => TLS_RSA_WITH_AES_128_CBC_SHA,
    RSA_AES256_CBC => TLS_RSA_WITH_AES_256_CBC_SHA,
    ECDH_ECDSA_AES128_GCM => TLS_ECDH_ECDSA_WITH_AES_128_GCM_SHA256,
    ECDH_RSA_AES128_GCM => TLS_ECDH_RSA_WITH_AES_128_GCM_SHA256,
    DH_ANON_AES128_GCM => TLS_DH_anon_WITH_AES_128_GCM_SHA256,
    DH_ANON_AES128_CBC => TLS_DH_anon_WITH_AES_128_CBC_SHA,
    ECDH_ANON_AES128_CBC => TLS_ECDH_anon_WITH_AES_128_CBC_SHA,
}
