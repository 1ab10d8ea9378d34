//! Algorithm constraints shared by the handshake engine and trust evaluation.

use crate::crypto::PublicKeyInfo;
use crate::types::{CipherSuite, HashAlgorithm, NamedCurve, SignatureAlgorithm};
use crate::types::SignatureAndHashAlgorithm;

/// Immutable set of algorithm restrictions.
///
/// Built once with the `disable_*` and `min_*` methods and then only queried.
///
/// ```
/// use timpl::AlgorithmConstraints;
/// use timpl::types::NamedCurve;
///
/// let c = AlgorithmConstraints::default()
///     .disable_curve(NamedCurve::Secp384r1)
///     .min_dh_bits(2048);
///
/// assert!(!c.permits_curve(NamedCurve::Secp384r1));
/// assert!(!c.permits_dh_bits(1024));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmConstraints {
    disabled_suites: Vec<CipherSuite>,
    disabled_curves: Vec<NamedCurve>,
    disabled_signatures: Vec<SignatureAndHashAlgorithm>,
    disabled_hashes: Vec<HashAlgorithm>,
    min_rsa_bits: usize,
    min_dh_bits: usize,
    min_ec_bits: usize,
}

impl Default for AlgorithmConstraints {
    /// MD5 signatures are disabled. RSA and DH need 1024 bits, EC 256.
    fn default() -> Self {
        AlgorithmConstraints {
            disabled_suites: Vec::new(),
            disabled_curves: Vec::new(),
            disabled_signatures: Vec::new(),
            disabled_hashes: vec![HashAlgorithm::MD5],
            min_rsa_bits: 1024,
            min_dh_bits: 1024,
            min_ec_bits: 256,
        }
    }
}

impl AlgorithmConstraints {
    /// Constraints that permit everything.
    pub fn permissive() -> Self {
        AlgorithmConstraints {
            disabled_suites: Vec::new(),
            disabled_curves: Vec::new(),
            disabled_signatures: Vec::new(),
            disabled_hashes: Vec::new(),
            min_rsa_bits: 0,
            min_dh_bits: 0,
            min_ec_bits: 0,
        }
    }

    pub fn disable_suite(mut self, suite: CipherSuite) -> Self {
        self.disabled_suites.push(suite);
        self
    }

    pub fn disable_curve(mut self, curve: NamedCurve) -> Self {
        self.disabled_curves.push(curve);
        self
    }

    pub fn disable_signature(mut self, alg: SignatureAndHashAlgorithm) -> Self {
        self.disabled_signatures.push(alg);
        self
    }

    /// Disable a hash for signatures, whatever the signature algorithm.
    pub fn disable_signature_hash(mut self, hash: HashAlgorithm) -> Self {
        self.disabled_hashes.push(hash);
        self
    }

    pub fn min_rsa_bits(mut self, bits: usize) -> Self {
        self.min_rsa_bits = bits;
        self
    }

    pub fn min_dh_bits(mut self, bits: usize) -> Self {
        self.min_dh_bits = bits;
        self
    }

    pub fn min_ec_bits(mut self, bits: usize) -> Self {
        self.min_ec_bits = bits;
        self
    }

    pub fn permits_suite(&self, suite: CipherSuite) -> bool {
        !self.disabled_suites.contains(&suite)
    }

    pub fn permits_curve(&self, curve: NamedCurve) -> bool {
        !self.disabled_curves.contains(&curve)
    }

    pub fn permits_signature(&self, alg: SignatureAndHashAlgorithm) -> bool {
        !self.disabled_signatures.contains(&alg) && !self.disabled_hashes.contains(&alg.hash)
    }

    pub fn permits_rsa_bits(&self, bits: usize) -> bool {
        bits >= self.min_rsa_bits
    }

    pub fn permits_dh_bits(&self, bits: usize) -> bool {
        bits >= self.min_dh_bits
    }

    /// Check a certificate key.
    pub fn permits_key(&self, key: &PublicKeyInfo) -> bool {
        match key.algorithm {
            SignatureAlgorithm::RSA => self.permits_rsa_bits(key.bits),
            SignatureAlgorithm::DSA => self.permits_dh_bits(key.bits),
            SignatureAlgorithm::ECDSA => {
                key.bits >= self.min_ec_bits && key.curve.map_or(true, |c| self.permits_curve(c))
            }
            _ => false,
        }
    }
}
