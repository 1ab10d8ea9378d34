//! Signing, verification and key loading using RustCrypto.

use std::str;

use der::{Decode, Encode};
use p256::ecdsa::{
    Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey,
};
use p384::ecdsa::{
    Signature as P384Signature, SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey,
};
use pkcs8::DecodePrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use spki::{ObjectIdentifier, SubjectPublicKeyInfoOwned};
use x509_cert::Certificate as X509Certificate;

use super::hash::digest;
use crate::crypto::provider::{KeyProvider, PublicKeyInfo, SignatureVerifier, SigningKey};
use crate::types::{HashAlgorithm, NamedCurve, SignatureAlgorithm};

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const OID_P521: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// PKCS#1 v1.5 padding for a TLS signature hash.
///
/// TLS 1.0/1.1 sign the bare MD5 and SHA-1 concatenation without a
/// DigestInfo prefix.
fn pkcs1_padding(hash: HashAlgorithm) -> Result<Pkcs1v15Sign, String> {
    Ok(match hash {
        HashAlgorithm::None => Pkcs1v15Sign::new_unprefixed(),
        HashAlgorithm::SHA1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlgorithm::SHA256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::SHA384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::SHA512 => Pkcs1v15Sign::new::<Sha512>(),
        _ => return Err(format!("Unsupported RSA signature hash: {:?}", hash)),
    })
}

/// ECDSA signs SHA-1 where the legacy construction asks for MD5 plus SHA-1.
fn ecdsa_hash(hash: HashAlgorithm) -> HashAlgorithm {
    match hash {
        HashAlgorithm::None => HashAlgorithm::SHA1,
        h => h,
    }
}

/// Client authentication key.
enum PrivateKey {
    Rsa(Box<RsaPrivateKey>),
    P256(P256SigningKey),
    P384(P384SigningKey),
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrivateKey::Rsa(k) => f
                .debug_struct("PrivateKey::Rsa")
                .field("bits", &k.n().bits())
                .finish_non_exhaustive(),
            PrivateKey::P256(_) => f.debug_tuple("PrivateKey::P256").finish(),
            PrivateKey::P384(_) => f.debug_tuple("PrivateKey::P384").finish(),
        }
    }
}

impl SigningKey for PrivateKey {
    fn sign(&mut self, data: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>, String> {
        match self {
            PrivateKey::Rsa(key) => {
                let hashed = digest(hash, data)?;
                key.sign(pkcs1_padding(hash)?, &hashed)
                    .map_err(|e| format!("RSA signing failed: {e}"))
            }
            PrivateKey::P256(key) => {
                let hashed = digest(ecdsa_hash(hash), data)?;
                let sig: P256Signature = key
                    .sign_prehash(&hashed)
                    .map_err(|_| "ECDSA signing failed".to_string())?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
            PrivateKey::P384(key) => {
                let hashed = digest(ecdsa_hash(hash), data)?;
                let sig: P384Signature = key
                    .sign_prehash(&hashed)
                    .map_err(|_| "ECDSA signing failed".to_string())?;
                Ok(sig.to_der().as_bytes().to_vec())
            }
        }
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            PrivateKey::Rsa(_) => SignatureAlgorithm::RSA,
            PrivateKey::P256(_) | PrivateKey::P384(_) => SignatureAlgorithm::ECDSA,
        }
    }
}

/// Key provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoKeyProvider;

impl KeyProvider for RustCryptoKeyProvider {
    fn load_private_key(&self, key_der: &[u8]) -> Result<Box<dyn SigningKey>, String> {
        // PKCS#8 first, it covers every key type.
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(PrivateKey::Rsa(Box::new(key))));
        }
        if let Ok(key) = P256SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(PrivateKey::P256(key)));
        }
        if let Ok(key) = P384SigningKey::from_pkcs8_der(key_der) {
            return Ok(Box::new(PrivateKey::P384(key)));
        }

        // Traditional OpenSSL formats.
        if let Ok(key) = RsaPrivateKey::from_pkcs1_der(key_der) {
            return Ok(Box::new(PrivateKey::Rsa(Box::new(key))));
        }
        if let Ok(ec_key) = sec1::EcPrivateKey::try_from(key_der) {
            // Without parameters the scalar length tells the curve.
            let curve = match &ec_key.parameters {
                Some(sec1::EcParameters::NamedCurve(oid)) => Some(*oid),
                None if ec_key.private_key.len() == 32 => Some(OID_P256),
                None if ec_key.private_key.len() == 48 => Some(OID_P384),
                None => None,
            };
            match curve {
                Some(oid) if oid == OID_P256 => {
                    let key = p256::SecretKey::from_sec1_der(key_der)
                        .map_err(|e| format!("Invalid P-256 key: {e}"))?;
                    return Ok(Box::new(PrivateKey::P256(key.into())));
                }
                Some(oid) if oid == OID_P384 => {
                    let key = p384::SecretKey::from_sec1_der(key_der)
                        .map_err(|e| format!("Invalid P-384 key: {e}"))?;
                    return Ok(Box::new(PrivateKey::P384(key.into())));
                }
                other => return Err(format!("Unsupported EC private key curve: {:?}", other)),
            }
        }

        if let Ok(pem_str) = str::from_utf8(key_der) {
            if pem_str.contains("-----BEGIN") {
                let (label, der) = der::pem::decode_vec(key_der)
                    .map_err(|e| format!("Invalid PEM: {e}"))?;
                trace!("Loading {} from PEM", label);
                return self.load_private_key(&der);
            }
        }

        Err("Failed to parse private key in any supported format".to_string())
    }
}

/// SubjectPublicKeyInfo of a DER certificate.
fn subject_public_key_info(cert_der: &[u8]) -> Result<SubjectPublicKeyInfoOwned, String> {
    let cert = X509Certificate::from_der(cert_der)
        .map_err(|e| format!("Failed to parse certificate: {e}"))?;
    Ok(cert.tbs_certificate.subject_public_key_info)
}

pub(super) fn certificate_rsa_key(cert_der: &[u8]) -> Result<RsaPublicKey, String> {
    let spki = subject_public_key_info(cert_der)?;
    if spki.algorithm.oid != OID_RSA_ENCRYPTION {
        return Err(format!("Not an RSA key: {}", spki.algorithm.oid));
    }
    let spki_der = spki
        .to_der()
        .map_err(|e| format!("Failed to encode public key: {e}"))?;
    RsaPublicKey::from_public_key_der(&spki_der).map_err(|e| format!("Invalid RSA public key: {e}"))
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        cert_der: &[u8],
        data: &[u8],
        signature: &[u8],
        hash_alg: HashAlgorithm,
        sig_alg: SignatureAlgorithm,
    ) -> Result<(), String> {
        let info = self.public_key_info(cert_der)?;
        if info.algorithm != sig_alg {
            return Err(format!(
                "Signature algorithm {:?} does not match {:?} key",
                sig_alg, info.algorithm
            ));
        }

        match sig_alg {
            SignatureAlgorithm::RSA => {
                let key = certificate_rsa_key(cert_der)?;
                let hashed = digest(hash_alg, data)?;
                key.verify(pkcs1_padding(hash_alg)?, &hashed, signature)
                    .map_err(|_| format!("RSA signature verification failed for {:?}", hash_alg))
            }
            SignatureAlgorithm::ECDSA => {
                let hashed = digest(ecdsa_hash(hash_alg), data)?;
                match info.curve {
                    Some(NamedCurve::Secp256r1) => {
                        let key = P256VerifyingKey::from_sec1_bytes(&info.public_key)
                            .map_err(|_| "Invalid P-256 public key".to_string())?;
                        let sig = P256Signature::from_der(signature)
                            .map_err(|_| "Invalid signature format".to_string())?;
                        key.verify_prehash(&hashed, &sig)
                    }
                    Some(NamedCurve::Secp384r1) => {
                        let key = P384VerifyingKey::from_sec1_bytes(&info.public_key)
                            .map_err(|_| "Invalid P-384 public key".to_string())?;
                        let sig = P384Signature::from_der(signature)
                            .map_err(|_| "Invalid signature format".to_string())?;
                        key.verify_prehash(&hashed, &sig)
                    }
                    other => return Err(format!("Unsupported EC curve: {:?}", other)),
                }
                .map_err(|_| format!("ECDSA signature verification failed for {:?}", hash_alg))
            }
            _ => Err(format!("Unsupported signature algorithm: {:?}", sig_alg)),
        }
    }

    fn public_key_info(&self, cert_der: &[u8]) -> Result<PublicKeyInfo, String> {
        let spki = subject_public_key_info(cert_der)?;
        let public_key = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| "Invalid subject_public_key bitstring".to_string())?
            .to_vec();

        match spki.algorithm.oid {
            OID_RSA_ENCRYPTION => {
                let key = certificate_rsa_key(cert_der)?;
                Ok(PublicKeyInfo {
                    algorithm: SignatureAlgorithm::RSA,
                    bits: key.n().bits(),
                    curve: None,
                    public_key,
                })
            }
            OID_EC_PUBLIC_KEY => {
                let curve_oid: ObjectIdentifier = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or("Missing EC curve parameter in certificate")?
                    .decode_as()
                    .map_err(|_| "Invalid EC curve parameter in certificate".to_string())?;
                let (curve, bits) = match curve_oid {
                    OID_P256 => (NamedCurve::Secp256r1, 256),
                    OID_P384 => (NamedCurve::Secp384r1, 384),
                    OID_P521 => (NamedCurve::Secp521r1, 521),
                    _ => return Err(format!("Unsupported EC curve: {}", curve_oid)),
                };
                Ok(PublicKeyInfo {
                    algorithm: SignatureAlgorithm::ECDSA,
                    bits,
                    curve: Some(curve),
                    public_key,
                })
            }
            OID_DSA => Ok(PublicKeyInfo {
                algorithm: SignatureAlgorithm::DSA,
                // The subject key is y, roughly the size of p.
                bits: public_key.len().saturating_sub(4) * 8,
                curve: None,
                public_key,
            }),
            oid => Err(format!("Unsupported public key algorithm: {}", oid)),
        }
    }
}

pub(super) static KEY_PROVIDER: RustCryptoKeyProvider = RustCryptoKeyProvider;
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;
