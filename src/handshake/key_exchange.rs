//! Key exchange dependent parts of the handshake.
//!
//! | Exchange                       | ServerKeyExchange | Premaster                      |
//! |--------------------------------|-------------------|--------------------------------|
//! | RSA, RSA_EXPORT (key <= 512)   | forbidden         | random, RSA encrypted          |
//! | RSA_EXPORT (key > 512)         | required          | random, encrypted to temp key  |
//! | DHE_*, DH_anon                 | required          | DH agreement                   |
//! | ECDHE_*, ECDH_anon             | required          | ECDH agreement                 |
//! | DH_RSA, DH_DSS, ECDH_RSA/ECDSA | forbidden         | agreement with the cert key    |

use num_bigint::BigUint;
use zeroize::Zeroizing;

use super::context::HandshakeContext;
use crate::config::Config;
use crate::message::{ClientKeyExchange, ServerKeyExchange, ServerKeyExchangeParams};
use crate::types::{HashAlgorithm, KeyExchange, SignatureAlgorithm};
use crate::{AlertDescription, Error};

/// Largest RSA key that may be used directly by an export suite.
const EXPORT_RSA_BITS: usize = 512;

/// Length of the RSA premaster secret.
const RSA_PREMASTER_LEN: usize = 48;

/// Whether the server must or must not send ServerKeyExchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServerKeyExchangeRequirement {
    Required,
    Forbidden,
}

/// Decide ServerKeyExchange for `kx`, given the RSA size of the server
/// certificate key where there is one.
pub(crate) fn server_key_exchange_requirement(
    kx: KeyExchange,
    cert_rsa_bits: Option<usize>,
) -> ServerKeyExchangeRequirement {
    use ServerKeyExchangeRequirement::*;
    match kx {
        KeyExchange::RSA_EXPORT => match cert_rsa_bits {
            Some(bits) if bits <= EXPORT_RSA_BITS => Forbidden,
            _ => Required,
        },
        KeyExchange::DHE_RSA
        | KeyExchange::DHE_DSS
        | KeyExchange::DH_ANON
        | KeyExchange::ECDHE_ECDSA
        | KeyExchange::ECDHE_RSA
        | KeyExchange::ECDH_ANON => Required,
        KeyExchange::RSA
        | KeyExchange::DH_RSA
        | KeyExchange::DH_DSS
        | KeyExchange::ECDH_ECDSA
        | KeyExchange::ECDH_RSA
        | KeyExchange::SCSV => Forbidden,
    }
}

/// Verify and absorb ServerKeyExchange.
pub(crate) fn process_server_key_exchange(
    config: &Config,
    ctx: &mut HandshakeContext,
    ske: ServerKeyExchange,
) -> Result<(), Error> {
    let kx = ctx
        .key_exchange_algorithm()
        .ok_or_else(|| Error::InternalError("No key exchange negotiated".into()))?;

    if !kx.is_anonymous() {
        verify_signature(config, ctx, &ske)?;
    }

    let constraints = config.algorithm_constraints();
    let provider = config.crypto_provider();

    match ske.params {
        ServerKeyExchangeParams::Rsa(params) => {
            let bits = bit_len(&params.modulus);
            if !constraints.permits_rsa_bits(bits) {
                return Err(Error::policy(
                    AlertDescription::HandshakeFailure,
                    "RSA ServerKeyExchange does not comply to algorithm constraints",
                ));
            }
            ctx.ephemeral_rsa = Some(params);
        }
        ServerKeyExchangeParams::Dh(params) => {
            if !constraints.permits_dh_bits(bit_len(&params.p)) {
                return Err(Error::policy(
                    AlertDescription::HandshakeFailure,
                    "DH ServerKeyExchange does not comply to algorithm constraints",
                ));
            }
            check_dh_public(&params.p, &params.ys)?;
            let exchange = provider
                .dh
                .start_exchange(&params.p, &params.g)
                .map_err(|e| Error::crypto(AlertDescription::IllegalParameter, e))?;
            ctx.key_exchange = Some(exchange);
            ctx.server_public = params.ys;
        }
        ServerKeyExchangeParams::Ecdh(params) => {
            let curve = params.named_curve;
            if !constraints.permits_curve(curve) {
                return Err(Error::policy(
                    AlertDescription::HandshakeFailure,
                    "ECDH ServerKeyExchange does not comply to algorithm constraints",
                ));
            }
            let group = provider.find_kx_group(curve).ok_or_else(|| {
                Error::policy(
                    AlertDescription::HandshakeFailure,
                    format!("Unsupported curve {:?}", curve),
                )
            })?;
            let exchange = group
                .start_exchange()
                .map_err(|e| Error::InternalError(format!("Key generation failed: {e}")))?;
            ctx.key_exchange = Some(exchange);
            ctx.server_public = params.public_key;
        }
        ServerKeyExchangeParams::Opaque(_) => {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!(
                    "Protocol violation: server sent a server key exchange message for key exchange {}",
                    kx.auth_type()
                ),
            ));
        }
    }

    Ok(())
}

fn verify_signature(
    config: &Config,
    ctx: &HandshakeContext,
    ske: &ServerKeyExchange,
) -> Result<(), Error> {
    let peer_key = ctx.peer_key()?;
    let leaf = ctx.leaf_certificate()?;

    let Some(signed) = &ske.signature else {
        return Err(Error::fatal(
            AlertDescription::DecodeError,
            "ServerKeyExchange is missing its signature",
        ));
    };

    let hash = match signed.algorithm {
        Some(alg) => {
            if !ctx.offered_signature_algorithms.contains(&alg) {
                return Err(Error::fatal(
                    AlertDescription::IllegalParameter,
                    format!("Unsupported signature algorithm {}", alg),
                ));
            }
            if alg.signature != peer_key.algorithm {
                return Err(Error::fatal(
                    AlertDescription::IllegalParameter,
                    format!("Signature algorithm {} does not match the certificate key", alg),
                ));
            }
            alg.hash
        }
        // MD5 plus SHA-1 for RSA, SHA-1 for ECDSA.
        None => HashAlgorithm::None,
    };

    if peer_key.algorithm == SignatureAlgorithm::Anonymous {
        return Err(Error::InternalError("Certificate key cannot sign".into()));
    }

    let mut data = Vec::with_capacity(64 + 256);
    data.extend_from_slice(&ctx.client_random);
    data.extend_from_slice(&ctx.server_random);
    data.extend_from_slice(&ske.params_bytes());

    config
        .crypto_provider()
        .signature_verification
        .verify_signature(leaf, &data, &signed.signature, hash, peer_key.algorithm)
        .map_err(|e| {
            debug!("ServerKeyExchange signature: {}", e);
            Error::crypto(AlertDescription::HandshakeFailure, "server key exchange invalid")
        })
}

/// Reject public values 0, 1 and p-1, and anything not below p.
fn check_dh_public(p: &[u8], ys: &[u8]) -> Result<(), Error> {
    let p = BigUint::from_bytes_be(p);
    let y = BigUint::from_bytes_be(ys);
    let one = BigUint::from(1u8);
    if y <= one || p <= one || y >= &p - &one {
        return Err(Error::fatal(
            AlertDescription::IllegalParameter,
            "Invalid DH public value",
        ));
    }
    Ok(())
}

fn bit_len(big_endian: &[u8]) -> usize {
    BigUint::from_bytes_be(big_endian).bits() as usize
}

/// Build ClientKeyExchange and compute the premaster secret.
pub(crate) fn client_key_exchange(
    config: &Config,
    ctx: &mut HandshakeContext,
) -> Result<(ClientKeyExchange, Zeroizing<Vec<u8>>), Error> {
    let kx = ctx
        .key_exchange_algorithm()
        .ok_or_else(|| Error::InternalError("No key exchange negotiated".into()))?;
    let provider = config.crypto_provider();

    match kx {
        KeyExchange::RSA | KeyExchange::RSA_EXPORT => {
            if ctx.peer_key()?.algorithm != SignatureAlgorithm::RSA {
                return Err(Error::fatal(
                    AlertDescription::HandshakeFailure,
                    "Server certificate does not include an RSA key",
                ));
            }

            // The version is the one offered, which lets the server detect
            // a rollback.
            let mut premaster = Zeroizing::new(vec![0u8; RSA_PREMASTER_LEN]);
            premaster[..2].copy_from_slice(&ctx.max_version.as_u16().to_be_bytes());
            provider
                .secure_random
                .fill(&mut premaster[2..])
                .map_err(Error::InternalError)?;

            let encrypted = match (&ctx.ephemeral_rsa, kx) {
                (Some(params), KeyExchange::RSA_EXPORT) => provider
                    .key_transport
                    .encrypt_to_key(&params.modulus, &params.exponent, &premaster),
                _ => provider
                    .key_transport
                    .encrypt_to_certificate(ctx.leaf_certificate()?, &premaster),
            }
            .map_err(|e| Error::crypto(AlertDescription::HandshakeFailure, e))?;

            Ok((ClientKeyExchange::Rsa(encrypted), premaster))
        }
        KeyExchange::DHE_RSA | KeyExchange::DHE_DSS | KeyExchange::DH_ANON => {
            let exchange = ctx.key_exchange.take().ok_or_else(|| {
                Error::fatal(
                    AlertDescription::UnexpectedMessage,
                    "Server did not send a DH Server Key Exchange message",
                )
            })?;
            let public = exchange.pub_key().to_vec();
            let premaster = exchange
                .complete(&ctx.server_public)
                .map_err(|e| Error::crypto(AlertDescription::IllegalParameter, e))?;
            Ok((ClientKeyExchange::Dh(public), Zeroizing::new(premaster)))
        }
        KeyExchange::ECDHE_RSA | KeyExchange::ECDHE_ECDSA | KeyExchange::ECDH_ANON => {
            let exchange = ctx.key_exchange.take().ok_or_else(|| {
                Error::fatal(
                    AlertDescription::UnexpectedMessage,
                    "Server did not send a ECDH Server Key Exchange message",
                )
            })?;
            let public = exchange.pub_key().to_vec();
            let premaster = exchange
                .complete(&ctx.server_public)
                .map_err(|e| Error::crypto(AlertDescription::IllegalParameter, e))?;
            Ok((ClientKeyExchange::Ecdh(public), Zeroizing::new(premaster)))
        }
        KeyExchange::ECDH_RSA | KeyExchange::ECDH_ECDSA => {
            let peer_key = ctx.peer_key()?;
            let curve = match (peer_key.algorithm, peer_key.curve) {
                (SignatureAlgorithm::ECDSA, Some(curve)) => curve,
                _ => {
                    return Err(Error::fatal(
                        AlertDescription::HandshakeFailure,
                        "Server certificate does not include an EC key",
                    ))
                }
            };
            if !config.algorithm_constraints().permits_curve(curve) {
                return Err(Error::policy(
                    AlertDescription::HandshakeFailure,
                    format!("Certificate curve {:?} is not permitted", curve),
                ));
            }
            let group = provider.find_kx_group(curve).ok_or_else(|| {
                Error::policy(
                    AlertDescription::HandshakeFailure,
                    format!("Unsupported curve {:?}", curve),
                )
            })?;
            let exchange = group
                .start_exchange()
                .map_err(|e| Error::InternalError(format!("Key generation failed: {e}")))?;
            let public = exchange.pub_key().to_vec();
            let premaster = exchange
                .complete(&peer_key.public_key)
                .map_err(|e| Error::crypto(AlertDescription::IllegalParameter, e))?;
            Ok((ClientKeyExchange::Ecdh(public), Zeroizing::new(premaster)))
        }
        KeyExchange::DH_RSA | KeyExchange::DH_DSS | KeyExchange::SCSV => Err(Error::InternalError(
            format!("Unsupported key exchange: {}", kx.auth_type()),
        )),
    }
}
