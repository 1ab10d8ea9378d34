//! Certificate chain validation and endpoint identification.
//!
//! Path building is not done here. A [`CertValidator`] gets the chain as
//! sent by the server and either accepts it, returning the trusted chain, or
//! rejects it. [`TrustEvaluator`] adds the host name check on top.

mod identity;

pub use identity::{check_identity, identities_equivalent};

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use der::{Decode, Encode};
use spki::ObjectIdentifier;
use x509_cert::Certificate;

use crate::constraints::AlgorithmConstraints;
use crate::crypto::CryptoProvider;
use crate::types::{HashAlgorithm, SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::Error;
use crate::AlertDescription;

/// Decides whether a server chain is trusted.
pub trait CertValidator: Send + Sync + fmt::Debug {
    /// Validate `chain` (leaf first) for a key exchange `auth_type`, such as
    /// "ECDHE_RSA". Returns the trusted chain, which may end in an anchor
    /// that was not sent.
    fn validate(
        &self,
        chain: &[Vec<u8>],
        auth_type: &str,
        constraints: &AlgorithmConstraints,
        provider: &CryptoProvider,
    ) -> Result<Vec<Vec<u8>>, String>;
}

/// Validates chains against a fixed set of trust anchors.
///
/// Each certificate must be within its validity period and signed by the
/// next. The last one sent must be an anchor or be signed by one. Keys and
/// signature algorithms are checked against the constraints.
#[derive(Debug, Clone, Default)]
pub struct AnchoredValidator {
    anchors: Vec<Vec<u8>>,
}

impl AnchoredValidator {
    /// Anchors are DER encoded certificates.
    pub fn new(anchors: Vec<Vec<u8>>) -> Self {
        AnchoredValidator { anchors }
    }

    pub fn add_anchor(&mut self, der: Vec<u8>) {
        self.anchors.push(der);
    }

    fn validate_at(
        &self,
        chain: &[Vec<u8>],
        auth_type: &str,
        constraints: &AlgorithmConstraints,
        provider: &CryptoProvider,
        now: SystemTime,
    ) -> Result<Vec<Vec<u8>>, String> {
        if chain.is_empty() {
            return Err("Empty certificate chain".into());
        }
        let now = now
            .duration_since(UNIX_EPOCH)
            .map_err(|_| "System time before epoch".to_string())?;

        let verifier = provider.signature_verification;
        let leaf_key = verifier.public_key_info(&chain[0])?;
        if !key_matches_auth_type(leaf_key.algorithm, auth_type) {
            return Err(format!(
                "{:?} key cannot be used for {}",
                leaf_key.algorithm, auth_type
            ));
        }

        let mut trusted = Vec::with_capacity(chain.len() + 1);
        for (i, der) in chain.iter().enumerate() {
            let cert = parse(der)?;
            check_validity(&cert, now)?;

            let key = verifier.public_key_info(der)?;
            if !constraints.permits_key(&key) {
                return Err(format!("Certificate key {:?} {} bits is not permitted", key.algorithm, key.bits));
            }
            trusted.push(der.clone());

            if self.anchors.iter().any(|a| a == der) {
                return Ok(trusted);
            }

            if let Some(issuer) = chain.get(i + 1) {
                verify_issued_by(&cert, issuer, constraints, provider)?;
                continue;
            }

            for anchor in &self.anchors {
                let Ok(anchor_cert) = parse(anchor) else {
                    continue;
                };
                if anchor_cert.tbs_certificate.subject != cert.tbs_certificate.issuer {
                    continue;
                }
                if verify_issued_by(&cert, anchor, constraints, provider).is_ok() {
                    trusted.push(anchor.clone());
                    return Ok(trusted);
                }
            }
        }

        Err("No trusted certificate found".into())
    }
}

impl CertValidator for AnchoredValidator {
    fn validate(
        &self,
        chain: &[Vec<u8>],
        auth_type: &str,
        constraints: &AlgorithmConstraints,
        provider: &CryptoProvider,
    ) -> Result<Vec<Vec<u8>>, String> {
        self.validate_at(chain, auth_type, constraints, provider, SystemTime::now())
    }
}

fn parse(der: &[u8]) -> Result<Certificate, String> {
    Certificate::from_der(der).map_err(|e| format!("Failed to parse certificate: {e}"))
}

fn check_validity(cert: &Certificate, now: std::time::Duration) -> Result<(), String> {
    let validity = &cert.tbs_certificate.validity;
    if now < validity.not_before.to_unix_duration() {
        return Err("Certificate is not yet valid".into());
    }
    if now > validity.not_after.to_unix_duration() {
        return Err("Certificate has expired".into());
    }
    Ok(())
}

fn key_matches_auth_type(key: SignatureAlgorithm, auth_type: &str) -> bool {
    match auth_type {
        "RSA" | "RSA_EXPORT" | "DHE_RSA" | "ECDHE_RSA" | "DH_RSA" => key == SignatureAlgorithm::RSA,
        "DHE_DSS" | "DH_DSS" => key == SignatureAlgorithm::DSA,
        "ECDHE_ECDSA" | "ECDH_ECDSA" | "ECDH_RSA" => key == SignatureAlgorithm::ECDSA,
        _ => true,
    }
}

fn verify_issued_by(
    cert: &Certificate,
    issuer_der: &[u8],
    constraints: &AlgorithmConstraints,
    provider: &CryptoProvider,
) -> Result<(), String> {
    let issuer = parse(issuer_der)?;
    if issuer.tbs_certificate.subject != cert.tbs_certificate.issuer {
        return Err("Certificate chain is not in issuer order".into());
    }

    let alg = signature_algorithm(&cert.signature_algorithm.oid)?;
    if !constraints.permits_signature(alg) {
        return Err(format!("Signature algorithm {:?} is not permitted", alg));
    }

    let tbs = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| format!("Failed to encode certificate: {e}"))?;
    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| "Invalid certificate signature bitstring".to_string())?;

    provider
        .signature_verification
        .verify_signature(issuer_der, &tbs, signature, alg.hash, alg.signature)
}

fn signature_algorithm(oid: &ObjectIdentifier) -> Result<SignatureAndHashAlgorithm, String> {
    let (hash, signature) = match oid.to_string().as_str() {
        "1.2.840.113549.1.1.4" => (HashAlgorithm::MD5, SignatureAlgorithm::RSA),
        "1.2.840.113549.1.1.5" => (HashAlgorithm::SHA1, SignatureAlgorithm::RSA),
        "1.2.840.113549.1.1.11" => (HashAlgorithm::SHA256, SignatureAlgorithm::RSA),
        "1.2.840.113549.1.1.12" => (HashAlgorithm::SHA384, SignatureAlgorithm::RSA),
        "1.2.840.113549.1.1.13" => (HashAlgorithm::SHA512, SignatureAlgorithm::RSA),
        "1.2.840.10045.4.1" => (HashAlgorithm::SHA1, SignatureAlgorithm::ECDSA),
        "1.2.840.10045.4.3.2" => (HashAlgorithm::SHA256, SignatureAlgorithm::ECDSA),
        "1.2.840.10045.4.3.3" => (HashAlgorithm::SHA384, SignatureAlgorithm::ECDSA),
        "1.2.840.10045.4.3.4" => (HashAlgorithm::SHA512, SignatureAlgorithm::ECDSA),
        other => return Err(format!("Unsupported certificate signature algorithm {}", other)),
    };
    Ok(SignatureAndHashAlgorithm::new(hash, signature))
}

/// Trust decision for a server chain: identity first, then the chain.
///
/// Cloned into a [`DelegatedTask`](crate::DelegatedTask) when trust checks
/// run off the handshake thread, so everything it holds is owned.
#[derive(Debug, Clone)]
pub struct TrustEvaluator {
    validator: Arc<dyn CertValidator>,
    constraints: AlgorithmConstraints,
    identification_algorithm: Option<String>,
    provider: CryptoProvider,
}

impl TrustEvaluator {
    pub fn new(
        validator: Arc<dyn CertValidator>,
        constraints: AlgorithmConstraints,
        identification_algorithm: Option<String>,
        provider: CryptoProvider,
    ) -> Self {
        TrustEvaluator {
            validator,
            constraints,
            identification_algorithm,
            provider,
        }
    }

    /// Check `chain` for a server reached as `peer_host`.
    ///
    /// With an identification algorithm set, the leaf is checked against the
    /// first SNI name. If that fails and the SNI name differs from
    /// `peer_host`, the check is retried against `peer_host`. Any failure is
    /// a fatal certificate_unknown.
    pub fn evaluate(
        &self,
        chain: &[Vec<u8>],
        auth_type: &str,
        server_names: &[String],
        peer_host: Option<&str>,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let Some(leaf) = chain.first() else {
            return Err(Error::trust(
                AlertDescription::BadCertificate,
                "Empty server certificate chain",
            ));
        };

        if let Some(alg) = self.identification_algorithm.as_deref().filter(|a| !a.is_empty()) {
            self.check_endpoint(leaf, alg, server_names, peer_host)
                .map_err(|e| Error::trust(AlertDescription::CertificateUnknown, e))?;
        }

        self.validator
            .validate(chain, auth_type, &self.constraints, &self.provider)
            .map_err(|e| Error::trust(AlertDescription::CertificateUnknown, e))
    }

    fn check_endpoint(
        &self,
        leaf: &[u8],
        algorithm: &str,
        server_names: &[String],
        peer_host: Option<&str>,
    ) -> Result<(), String> {
        if let Some(sni) = server_names.first() {
            match check_identity(sni, leaf, algorithm) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if peer_host.map_or(true, |p| p.eq_ignore_ascii_case(sni)) {
                        return Err(e);
                    }
                    debug!("SNI identity check failed ({}), trying peer host", e);
                }
            }
        }

        let host = peer_host.ok_or_else(|| "No host name to check identity against".to_string())?;
        check_identity(host, leaf, algorithm)
    }
}
