//! Server certificate, CertificateRequest and client authentication.

use super::context::HandshakeContext;
use super::key_exchange::{server_key_exchange_requirement, ServerKeyExchangeRequirement};
use super::state::State;
use crate::config::Config;
use crate::crypto::SigningKey;
use crate::message::{Certificate, CertificateRequest, CertificateVerify, DigitallySigned};
use crate::trust::{identities_equivalent, TrustEvaluator};
use crate::types::{HashAlgorithm, KeyExchange, SignatureAlgorithm, SignatureAndHashAlgorithm};
use crate::{AlertDescription, Error};

/// First checks on a server chain, before the trust decision.
///
/// Records the chain and its leaf key, and returns the state after it.
pub(crate) fn process_certificate(
    config: &Config,
    ctx: &mut HandshakeContext,
    certificate: Certificate,
) -> Result<State, Error> {
    let chain = certificate.certificate_list;
    let Some(leaf) = chain.first() else {
        return Err(Error::trust(
            AlertDescription::BadCertificate,
            "empty certificate chain",
        ));
    };

    // A resumed initial handshake may not be followed by a full handshake
    // with somebody else's certificate.
    if let Some(reserved) = &ctx.reserved_server_certs {
        let identity = config.identification_algorithm().filter(|a| !a.is_empty());
        if !ctx.session.extended_master_secret
            && identity.is_none()
            && !reserved
                .first()
                .map_or(false, |prev| identities_equivalent(leaf, prev))
        {
            return Err(Error::trust(
                AlertDescription::BadCertificate,
                "server certificate change is restricted during renegotiation",
            ));
        }
    }

    let key = config
        .crypto_provider()
        .signature_verification
        .public_key_info(leaf)
        .map_err(|e| Error::trust(AlertDescription::UnsupportedCertificate, e))?;

    let kx = ctx
        .key_exchange_algorithm()
        .ok_or_else(|| Error::InternalError("No key exchange negotiated".into()))?;
    let rsa_bits = (key.algorithm == SignatureAlgorithm::RSA).then_some(key.bits);

    ctx.peer_key = Some(key);
    ctx.session.peer_certificates = chain;

    Ok(match server_key_exchange_requirement(kx, rsa_bits) {
        ServerKeyExchangeRequirement::Required => State::AwaitServerKeyExchange,
        ServerKeyExchangeRequirement::Forbidden => State::AwaitCertificateRequest,
    })
}

/// The auth type a trust decision is made for.
pub(crate) fn auth_type(kx: KeyExchange) -> &'static str {
    // The ephemeral key, if any, comes after the certificate. Until then
    // an export suite is plain RSA.
    if kx == KeyExchange::RSA_EXPORT {
        KeyExchange::RSA.auth_type()
    } else {
        kx.auth_type()
    }
}

pub(crate) fn trust_evaluator(config: &Config) -> TrustEvaluator {
    TrustEvaluator::new(
        config.cert_validator().clone(),
        config.algorithm_constraints().clone(),
        config.identification_algorithm().map(str::to_string),
        config.crypto_provider().clone(),
    )
}

pub(crate) fn process_certificate_request(
    config: &Config,
    ctx: &mut HandshakeContext,
    request: CertificateRequest,
) -> Result<(), Error> {
    let kx = ctx
        .key_exchange_algorithm()
        .ok_or_else(|| Error::InternalError("No key exchange negotiated".into()))?;
    if kx.is_anonymous() {
        return Err(Error::policy(
            AlertDescription::HandshakeFailure,
            "Client authentication requested for anonymous cipher suite.",
        ));
    }

    if ctx.version().is_tls12() {
        if request.supported_signature_algorithms.is_empty() {
            return Err(Error::fatal(
                AlertDescription::HandshakeFailure,
                "No peer supported signature algorithms",
            ));
        }
        let common: Vec<SignatureAndHashAlgorithm> = request
            .supported_signature_algorithms
            .iter()
            .copied()
            .filter(|a| {
                SignatureAndHashAlgorithm::supported().contains(a)
                    && config.algorithm_constraints().permits_signature(*a)
            })
            .collect();
        if common.is_empty() {
            return Err(Error::policy(
                AlertDescription::HandshakeFailure,
                "No supported signature and hash algorithm in common",
            ));
        }
        ctx.peer_signature_algorithms = common;
    }

    ctx.cert_request = Some(request);
    Ok(())
}

/// Choose the client chain for a CertificateRequest.
///
/// Returns the Certificate to send and the key to sign CertificateVerify
/// with. Without a suitable certificate the chain is empty.
pub(crate) fn client_certificate(
    config: &Config,
    ctx: &mut HandshakeContext,
) -> Result<(Certificate, Option<Box<dyn SigningKey>>), Error> {
    let Some(request) = &ctx.cert_request else {
        return Err(Error::InternalError("No certificate requested".into()));
    };

    let requested: Vec<SignatureAlgorithm> = request
        .certificate_types
        .iter()
        .filter_map(|t| t.signature_algorithm())
        .collect();

    if let Some(cert) = config.client_certificate() {
        let key = cert.signing_key(config.crypto_provider())?;
        if requested.contains(&key.algorithm()) {
            ctx.session.local_certificates = cert.chain().to_vec();
            return Ok((Certificate::new(cert.chain().to_vec()), Some(key)));
        }
        debug!(
            "Client key {:?} does not match requested types {:?}",
            key.algorithm(),
            requested
        );
    }

    warn!("No suitable certificate found, continuing without client authentication");
    Ok((Certificate::new(Vec::new()), None))
}

/// Sign everything up to ClientKeyExchange.
pub(crate) fn certificate_verify(
    ctx: &HandshakeContext,
    key: &mut dyn SigningKey,
) -> Result<CertificateVerify, Error> {
    let algorithm = if ctx.version().is_tls12() {
        let alg = ctx
            .peer_signature_algorithms
            .iter()
            .copied()
            .find(|a| a.signature == key.algorithm() && a.hash != HashAlgorithm::None)
            .ok_or_else(|| {
                Error::policy(
                    AlertDescription::HandshakeFailure,
                    "No supported signature algorithm",
                )
            })?;
        Some(alg)
    } else {
        None
    };

    let hash = algorithm.map(|a| a.hash).unwrap_or(HashAlgorithm::None);
    let signature = key.sign(ctx.transcript.bytes(), hash).map_err(|e| {
        debug!("CertificateVerify signing: {}", e);
        Error::crypto(
            AlertDescription::HandshakeFailure,
            "Error signing certificate verify",
        )
    })?;

    Ok(CertificateVerify::new(DigitallySigned::new(algorithm, signature)))
}
