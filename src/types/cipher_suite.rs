use std::fmt;

use nom::number::complete::be_u16;
use nom::IResult;

use super::{HashAlgorithm, ProtocolVersion};

/// Key exchange algorithm of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum KeyExchange {
    RSA,
    RSA_EXPORT,
    DHE_RSA,
    DHE_DSS,
    DH_ANON,
    DH_RSA,
    DH_DSS,
    ECDHE_ECDSA,
    ECDHE_RSA,
    ECDH_ECDSA,
    ECDH_RSA,
    ECDH_ANON,
    /// The renegotiation signalling value, not a real exchange.
    SCSV,
}

impl KeyExchange {
    /// Anonymous exchanges never authenticate the server.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, KeyExchange::DH_ANON | KeyExchange::ECDH_ANON)
    }

    /// Whether the exchange needs the elliptic curve extensions in ClientHello.
    pub fn is_ec(&self) -> bool {
        matches!(
            self,
            KeyExchange::ECDHE_ECDSA
                | KeyExchange::ECDHE_RSA
                | KeyExchange::ECDH_ECDSA
                | KeyExchange::ECDH_RSA
                | KeyExchange::ECDH_ANON
        )
    }

    /// Static key agreement using the key embedded in the server certificate.
    pub fn is_static_dh(&self) -> bool {
        matches!(
            self,
            KeyExchange::DH_RSA | KeyExchange::DH_DSS | KeyExchange::ECDH_ECDSA | KeyExchange::ECDH_RSA
        )
    }

    /// Authentication type string used when asking for trust decisions.
    pub fn auth_type(&self) -> &'static str {
        match self {
            KeyExchange::RSA => "RSA",
            KeyExchange::RSA_EXPORT => "RSA_EXPORT",
            KeyExchange::DHE_RSA => "DHE_RSA",
            KeyExchange::DHE_DSS => "DHE_DSS",
            KeyExchange::DH_ANON => "DH_anon",
            KeyExchange::DH_RSA => "DH_RSA",
            KeyExchange::DH_DSS => "DH_DSS",
            KeyExchange::ECDHE_ECDSA => "ECDHE_ECDSA",
            KeyExchange::ECDHE_RSA => "ECDHE_RSA",
            KeyExchange::ECDH_ECDSA => "ECDH_ECDSA",
            KeyExchange::ECDH_RSA => "ECDH_RSA",
            KeyExchange::ECDH_ANON => "ECDH_anon",
            KeyExchange::SCSV => "SCSV",
        }
    }
}

/// Symmetric record protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkCipher {
    Null,
    Rc4_40,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
}

impl BulkCipher {
    pub fn key_len(&self) -> usize {
        match self {
            BulkCipher::Null => 0,
            BulkCipher::Rc4_40 => 5,
            BulkCipher::Aes128Cbc | BulkCipher::Aes128Gcm => 16,
            BulkCipher::Aes256Cbc | BulkCipher::Aes256Gcm => 32,
        }
    }

    /// Length of the IV taken from the key block.
    ///
    /// For AEAD this is the implicit part of the nonce.
    pub fn fixed_iv_len(&self) -> usize {
        match self {
            BulkCipher::Null | BulkCipher::Rc4_40 => 0,
            BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc => 16,
            BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm => 4,
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(self, BulkCipher::Aes128Gcm | BulkCipher::Aes256Gcm)
    }

    pub fn is_cbc(&self) -> bool {
        matches!(self, BulkCipher::Aes128Cbc | BulkCipher::Aes256Cbc)
    }
}

/// Record MAC of non-AEAD suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    Null,
    /// Integrity is provided by the AEAD cipher.
    Aead,
    Md5,
    Sha1,
    Sha256,
}

impl MacAlgorithm {
    pub fn key_len(&self) -> usize {
        match self {
            MacAlgorithm::Null | MacAlgorithm::Aead => 0,
            MacAlgorithm::Md5 => 16,
            MacAlgorithm::Sha1 => 20,
            MacAlgorithm::Sha256 => 32,
        }
    }
}

macro_rules! cipher_suites {
    ($($name:ident = $code:expr => ($kx:ident, $bulk:ident, $mac:ident, $prf:ident, $min:ident, $max:ident);)*) => {
        /// Cipher suites known to the handshake engine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(non_camel_case_types)]
        pub enum CipherSuite {
            $($name,)*
            Unknown(u16),
        }

        impl CipherSuite {
            pub fn from_u16(value: u16) -> Self {
                match value {
                    $($code => CipherSuite::$name,)*
                    _ => CipherSuite::Unknown(value),
                }
            }

            pub fn as_u16(&self) -> u16 {
                match self {
                    $(CipherSuite::$name => $code,)*
                    CipherSuite::Unknown(value) => *value,
                }
            }

            /// All known suites, in declaration order.
            pub fn all() -> &'static [CipherSuite] {
                &[$(CipherSuite::$name,)*]
            }

            fn attributes(&self) -> Option<SuiteAttributes> {
                match self {
                    $(CipherSuite::$name => Some(SuiteAttributes {
                        key_exchange: KeyExchange::$kx,
                        bulk_cipher: BulkCipher::$bulk,
                        mac: MacAlgorithm::$mac,
                        prf_hash: HashAlgorithm::$prf,
                        min_version: ProtocolVersion::$min,
                        max_version: ProtocolVersion::$max,
                    }),)*
                    CipherSuite::Unknown(_) => None,
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy)]
struct SuiteAttributes {
    key_exchange: KeyExchange,
    bulk_cipher: BulkCipher,
    mac: MacAlgorithm,
    prf_hash: HashAlgorithm,
    min_version: ProtocolVersion,
    max_version: ProtocolVersion,
}

cipher_suites! {
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 = 0xC02B => (ECDHE_ECDSA, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 = 0xC02C => (ECDHE_ECDSA, Aes256Gcm, Aead, SHA384, TLS1_2, TLS1_2);
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 = 0xC02F => (ECDHE_RSA, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 = 0xC030 => (ECDHE_RSA, Aes256Gcm, Aead, SHA384, TLS1_2, TLS1_2);
    TLS_DHE_RSA_WITH_AES_128_GCM_SHA256 = 0x009E => (DHE_RSA, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_DHE_DSS_WITH_AES_128_GCM_SHA256 = 0x00A2 => (DHE_DSS, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA = 0xC009 => (ECDHE_ECDSA, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2);
    TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA = 0xC013 => (ECDHE_RSA, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2);
    TLS_DHE_RSA_WITH_AES_128_CBC_SHA = 0x0033 => (DHE_RSA, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2);
    TLS_RSA_WITH_AES_128_GCM_SHA256 = 0x009C => (RSA, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_RSA_WITH_AES_256_GCM_SHA384 = 0x009D => (RSA, Aes256Gcm, Aead, SHA384, TLS1_2, TLS1_2);
    TLS_RSA_WITH_AES_128_CBC_SHA = 0x002F => (RSA, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2);
    TLS_RSA_WITH_AES_256_CBC_SHA = 0x0035 => (RSA, Aes256Cbc, Sha1, SHA256, TLS1_0, TLS1_2);
    TLS_ECDH_ECDSA_WITH_AES_128_GCM_SHA256 = 0xC02D => (ECDH_ECDSA, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_ECDH_RSA_WITH_AES_128_GCM_SHA256 = 0xC031 => (ECDH_RSA, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_DH_RSA_WITH_AES_128_GCM_SHA256 = 0x00A0 => (DH_RSA, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_DH_DSS_WITH_AES_128_GCM_SHA256 = 0x00A4 => (DH_DSS, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_DH_anon_WITH_AES_128_GCM_SHA256 = 0x00A6 => (DH_ANON, Aes128Gcm, Aead, SHA256, TLS1_2, TLS1_2);
    TLS_DH_anon_WITH_AES_128_CBC_SHA = 0x0034 => (DH_ANON, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2);
    TLS_ECDH_anon_WITH_AES_128_CBC_SHA = 0xC018 => (ECDH_ANON, Aes128Cbc, Sha1, SHA256, TLS1_0, TLS1_2);
    TLS_RSA_EXPORT_WITH_RC4_40_MD5 = 0x0003 => (RSA_EXPORT, Rc4_40, Md5, SHA256, TLS1_0, TLS1_0);
    TLS_EMPTY_RENEGOTIATION_INFO_SCSV = 0x00FF => (SCSV, Null, Null, SHA256, TLS1_0, TLS1_2);
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl CipherSuite {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }

    /// Key exchange algorithm, `None` for unknown suites.
    pub fn key_exchange(&self) -> Option<KeyExchange> {
        self.attributes().map(|a| a.key_exchange)
    }

    pub fn bulk_cipher(&self) -> Option<BulkCipher> {
        self.attributes().map(|a| a.bulk_cipher)
    }

    pub fn mac(&self) -> Option<MacAlgorithm> {
        self.attributes().map(|a| a.mac)
    }

    /// PRF hash for TLS 1.2. Earlier versions always use MD5 and SHA-1.
    pub fn prf_hash(&self) -> HashAlgorithm {
        self.attributes()
            .map(|a| a.prf_hash)
            .unwrap_or(HashAlgorithm::SHA256)
    }

    /// Whether the suite can be negotiated under `version`.
    pub fn supports_version(&self, version: ProtocolVersion) -> bool {
        let Some(a) = self.attributes() else {
            return false;
        };
        a.min_version <= version && version <= a.max_version
    }

    /// Lengths of (mac key, encryption key, fixed iv) taken from the key block.
    pub fn key_lengths(&self) -> (usize, usize, usize) {
        match self.attributes() {
            Some(a) => (
                a.mac.key_len(),
                a.bulk_cipher.key_len(),
                a.bulk_cipher.fixed_iv_len(),
            ),
            None => (0, 0, 0),
        }
    }

    pub fn is_scsv(&self) -> bool {
        *self == CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV
    }

    /// Suites enabled when the configuration does not say otherwise.
    ///
    /// Anonymous, export and static DH suites must be enabled explicitly.
    pub fn defaults() -> Vec<CipherSuite> {
        CipherSuite::all()
            .iter()
            .copied()
            .filter(|s| {
                let Some(kx) = s.key_exchange() else {
                    return false;
                };
                !kx.is_anonymous()
                    && !matches!(
                        kx,
                        KeyExchange::RSA_EXPORT
                            | KeyExchange::DH_RSA
                            | KeyExchange::DH_DSS
                            | KeyExchange::DHE_DSS
                            | KeyExchange::SCSV
                    )
            })
            .chain(Some(CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV))
            .collect()
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherSuite::Unknown(v) => write!(f, "Unknown(0x{:04x})", v),
            _ => write!(f, "{:?}", self),
        }
    }
}
