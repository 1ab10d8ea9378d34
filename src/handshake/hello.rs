//! ClientHello construction, the resumption decision and ServerHello checks.

use std::sync::Arc;
use std::time::SystemTime;

use subtle::ConstantTimeEq;

use super::context::HandshakeContext;
use super::Carryover;
use crate::config::Config;
use crate::message::extensions::{
    AlpnExtension, EcPointFormatsExtension, RenegotiationInfoExtension, ServerNameExtension,
    SignatureAlgorithmsExtension, SupportedGroupsExtension, TypedExtension,
};
use crate::message::{ClientHello, Extension, ExtensionType, Random, ServerHello, SessionId};
use crate::session::{Session, SessionCache};
use crate::types::{CipherSuite, CompressionMethod, SignatureAndHashAlgorithm};
use crate::{AlertDescription, Error};

/// Server extensions a client understands.
const UNDERSTOOD_EXTENSIONS: &[ExtensionType] = &[
    ExtensionType::ServerName,
    ExtensionType::SupportedGroups,
    ExtensionType::EcPointFormats,
    ExtensionType::ApplicationLayerProtocolNegotiation,
    ExtensionType::RenegotiationInfo,
    ExtensionType::ExtendedMasterSecret,
];

/// Pick the cached session to offer, if any.
///
/// Also returns the server chain that a renegotiation must keep, which is
/// captured even when the session itself can no longer be offered.
pub(crate) fn choose_session(
    config: &Config,
    cache: &SessionCache,
    peer_host: Option<&str>,
    peer_port: u16,
) -> (Option<Arc<Session>>, Option<Vec<Vec<u8>>>) {
    let Some(session) = peer_host.and_then(|h| cache.get_by_host(h, peer_port)) else {
        return (None, None);
    };
    debug!("Found session for {}:{}: {:?}", peer_host.unwrap_or(""), peer_port, session);

    let reserved = if !config.allow_unsafe_server_cert_change() && session.is_session_resumption() {
        Some(session.peer_certificates().to_vec()).filter(|c| !c.is_empty())
    } else {
        None
    };

    if !session.is_rejoinable() {
        return (None, reserved);
    }

    if !config.is_negotiable(session.cipher_suite()) {
        debug!("Can't resume, unavailable cipher {}", session.cipher_suite());
        return (None, reserved);
    }

    if !config.protocol_versions().contains(&session.protocol_version()) {
        debug!("Can't resume, protocol disabled {}", session.protocol_version());
        return (None, reserved);
    }

    if config.use_extended_master_secret() && !session.uses_extended_master_secret() {
        if !config.allow_legacy_resumption() {
            debug!("Can't resume, session did not use extended master secret");
            return (None, reserved);
        }
        // Without endpoint identification only extended master secret
        // protects against a changed server certificate.
        let identity = config.identification_algorithm().filter(|a| !a.is_empty());
        if !config.allow_unsafe_server_cert_change() && identity.is_none() {
            debug!("Can't resume legacy session without endpoint identification");
            return (None, reserved);
        }
    }

    if let Some(requested) = config.identification_algorithm() {
        let cached = session.identification_algorithm().unwrap_or("");
        if !requested.eq_ignore_ascii_case(cached) {
            debug!(
                "Can't resume, identification algorithm does not match, requested: {}, cached: {}",
                requested, cached
            );
            return (None, reserved);
        }
    }

    (Some(session), reserved)
}

/// Build the ClientHello for a new attempt.
pub(crate) fn client_hello(
    config: &Config,
    conn: &Carryover,
    ctx: &mut HandshakeContext,
    random: Random,
) -> Result<ClientHello, Error> {
    let candidate = ctx.candidate.clone();
    let max_version = ctx.max_version;

    let mut suites: Vec<CipherSuite> = config
        .cipher_suites()
        .iter()
        .copied()
        .filter(|s| {
            s.is_scsv()
                || (config.is_negotiable(*s)
                    && config
                        .protocol_versions()
                        .iter()
                        .any(|v| *v <= max_version && s.supports_version(*v)))
        })
        .collect();

    if !config.enable_new_session() {
        let Some(session) = &candidate else {
            return Err(Error::policy(
                AlertDescription::HandshakeFailure,
                "No existing session to resume",
            ));
        };
        let had_scsv = suites.iter().any(|s| s.is_scsv());
        suites = vec![session.cipher_suite()];
        if !conn.secure_renegotiation && had_scsv {
            suites.push(CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV);
        }
    }

    // The extension carries the indication from now on.
    if conn.secure_renegotiation {
        suites.retain(|s| !s.is_scsv());
    }

    if !suites.iter().any(|s| !s.is_scsv()) {
        return Err(Error::policy(
            AlertDescription::HandshakeFailure,
            "No negotiable cipher suite",
        ));
    }

    let session_id = candidate.as_ref().map(|s| s.id()).unwrap_or_else(SessionId::empty);
    let mut hello = ClientHello::new(max_version, random, session_id, suites.clone());

    let uses_ec = suites
        .iter()
        .filter_map(|s| s.key_exchange())
        .any(|kx| kx.is_ec());
    if uses_ec {
        let groups: Vec<_> = config
            .crypto_provider()
            .kx_groups
            .iter()
            .map(|g| g.name())
            .filter(|c| config.algorithm_constraints().permits_curve(*c))
            .collect();
        if !groups.is_empty() {
            hello.add_extension(&SupportedGroupsExtension::new(groups));
            hello.add_extension(&EcPointFormatsExtension::default());
        }
    }

    if max_version.is_tls12() {
        let algorithms: Vec<SignatureAndHashAlgorithm> = SignatureAndHashAlgorithm::supported()
            .iter()
            .copied()
            .filter(|a| config.algorithm_constraints().permits_signature(*a))
            .collect();
        if algorithms.is_empty() {
            return Err(Error::policy(
                AlertDescription::HandshakeFailure,
                "No supported signature algorithm",
            ));
        }
        hello.add_extension(&SignatureAlgorithmsExtension::new(algorithms.clone()));
        ctx.offered_signature_algorithms = algorithms;
    }

    if config.use_extended_master_secret()
        && candidate.as_ref().map_or(true, |s| s.uses_extended_master_secret())
    {
        hello
            .extensions
            .push(Extension::new(ExtensionType::ExtendedMasterSecret, Vec::new()));
        ctx.requested_ems = true;
    }

    ctx.requested_server_names = match &candidate {
        Some(session) => session.requested_server_names().to_vec(),
        None => config.server_names().to_vec(),
    };
    if !ctx.requested_server_names.is_empty() {
        hello.add_extension(&ServerNameExtension::new(ctx.requested_server_names.clone()));
    }

    if !config.alpn_protocols().is_empty() {
        hello.add_extension(&AlpnExtension::new(config.alpn_protocols()));
        ctx.alpn_offered = true;
    }

    if conn.secure_renegotiation || !suites.iter().any(|s| s.is_scsv()) {
        hello.add_extension(&RenegotiationInfoExtension::new(conn.client_verify_data.clone()));
    }

    ctx.offered_suites = suites;
    Ok(hello)
}

/// Check ServerHello and settle version, suite and resumption.
pub(crate) fn process_server_hello(
    config: &Config,
    conn: &mut Carryover,
    ctx: &mut HandshakeContext,
    hello: ServerHello,
) -> Result<(), Error> {
    let version = hello.server_version;
    if !config.protocol_versions().contains(&version) || version > ctx.max_version {
        return Err(Error::policy(
            AlertDescription::HandshakeFailure,
            format!(
                "Server chose {}, but that protocol version is not enabled or not supported by the client.",
                version
            ),
        ));
    }
    ctx.version = Some(version);

    check_renegotiation_info(config, conn, ctx, &hello)?;

    ctx.server_random = hello.random.to_bytes();

    let suite = hello.cipher_suite;
    if !ctx.offered_suites.contains(&suite)
        || !config.is_negotiable(suite)
        || !suite.supports_version(version)
    {
        return Err(Error::policy(
            AlertDescription::IllegalParameter,
            format!("Server selected improper ciphersuite {}", suite),
        ));
    }

    if hello.compression_method != CompressionMethod::Null {
        return Err(Error::fatal(
            AlertDescription::IllegalParameter,
            format!("compression type not supported, {:?}", hello.compression_method),
        ));
    }

    if let Some(candidate) = ctx.candidate.clone() {
        if !hello.session_id.is_empty() && candidate.id() == hello.session_id {
            if candidate.cipher_suite() != suite {
                return Err(Error::fatal(
                    AlertDescription::UnexpectedMessage,
                    "Server returned wrong cipher suite for session",
                ));
            }
            if candidate.protocol_version() != version {
                return Err(Error::fatal(
                    AlertDescription::UnexpectedMessage,
                    "Server resumed session with wrong protocol version",
                ));
            }
            ctx.resuming = true;
        } else {
            if !ctx.renegotiation {
                candidate.invalidate();
            }
            ctx.candidate = None;
            if !config.enable_new_session() {
                return Err(Error::policy(
                    AlertDescription::HandshakeFailure,
                    "New session creation is disabled",
                ));
            }
        }
    }

    let ems = check_extended_master_secret(config, ctx, &hello)?;
    let alpn = check_alpn(config, ctx, &hello)?;

    if ctx.resuming {
        if let Some(candidate) = &ctx.candidate {
            if !ctx.renegotiation {
                candidate.set_session_resumption(true);
            }
            debug!("Server resumed {:?}", candidate);
        }
        ctx.session.cipher_suite = Some(suite);
        ctx.session.version = Some(version);
        return Ok(());
    }

    for ext in hello.extensions() {
        if !UNDERSTOOD_EXTENSIONS.contains(&ext.extension_type) {
            return Err(Error::fatal(
                AlertDescription::UnsupportedExtension,
                format!("Server sent an unsupported extension: {:?}", ext.extension_type),
            ));
        }
    }

    let session = &mut ctx.session;
    session.id = hello.session_id;
    session.cipher_suite = Some(suite);
    session.version = Some(version);
    session.peer_host = conn.peer_host.clone();
    session.peer_port = conn.peer_port;
    session.requested_server_names = ctx.requested_server_names.clone();
    session.extended_master_secret = ems;
    session.alpn_protocol = alpn;
    session.identification_algorithm = config.identification_algorithm().map(str::to_string);

    debug!("Negotiated {} with {}", suite, version);
    Ok(())
}

fn check_renegotiation_info(
    config: &Config,
    conn: &mut Carryover,
    ctx: &HandshakeContext,
    hello: &ServerHello,
) -> Result<(), Error> {
    let ext = hello.extension(ExtensionType::RenegotiationInfo);

    match ext {
        Some(ext) => {
            let info = RenegotiationInfoExtension::from_extension(ext)?;
            if !ctx.renegotiation {
                if !info.renegotiated_connection.is_empty() {
                    return Err(Error::fatal(
                        AlertDescription::HandshakeFailure,
                        "The renegotiation_info field is not empty",
                    ));
                }
                conn.secure_renegotiation = true;
            } else {
                if !conn.secure_renegotiation {
                    return Err(Error::fatal(
                        AlertDescription::HandshakeFailure,
                        "Unexpected renegotiation indication extension",
                    ));
                }
                let mut expected = conn.client_verify_data.clone();
                expected.extend_from_slice(&conn.server_verify_data);
                let received = &info.renegotiated_connection;
                if received.len() != expected.len() || !bool::from(received.ct_eq(&expected)) {
                    return Err(Error::fatal(
                        AlertDescription::HandshakeFailure,
                        "Incorrect verify data in ServerHello renegotiation_info message",
                    ));
                }
            }
        }
        None => {
            if !ctx.renegotiation {
                if !config.allow_legacy_hello_messages() {
                    return Err(Error::fatal(
                        AlertDescription::HandshakeFailure,
                        "Failed to negotiate the use of secure renegotiation",
                    ));
                }
                conn.secure_renegotiation = false;
                warn!("Warning: No renegotiation indication extension in ServerHello");
            } else if conn.secure_renegotiation {
                return Err(Error::fatal(
                    AlertDescription::HandshakeFailure,
                    "No renegotiation indication extension",
                ));
            }
        }
    }

    Ok(())
}

fn check_extended_master_secret(
    config: &Config,
    ctx: &HandshakeContext,
    hello: &ServerHello,
) -> Result<bool, Error> {
    let present = hello.extension(ExtensionType::ExtendedMasterSecret).is_some();
    let resumed = ctx.candidate.as_ref().filter(|_| ctx.resuming);

    if present {
        if !config.use_extended_master_secret() || !ctx.requested_ems {
            return Err(Error::fatal(
                AlertDescription::UnsupportedExtension,
                "Server sent the extended_master_secret extension improperly",
            ));
        }
        if resumed.map_or(false, |s| !s.uses_extended_master_secret()) {
            return Err(Error::fatal(
                AlertDescription::UnsupportedExtension,
                "Server sent an unexpected extended_master_secret extension on session resumption",
            ));
        }
        return Ok(true);
    }

    if config.use_extended_master_secret() && !config.allow_legacy_master_secret() {
        return Err(Error::policy(
            AlertDescription::HandshakeFailure,
            "Extended Master Secret extension is required",
        ));
    }

    if let Some(session) = resumed {
        if session.uses_extended_master_secret() {
            return Err(Error::fatal(
                AlertDescription::HandshakeFailure,
                "Missing Extended Master Secret extension on session resumption",
            ));
        } else if config.use_extended_master_secret() && !config.allow_legacy_resumption() {
            return Err(Error::policy(
                AlertDescription::HandshakeFailure,
                "Extended Master Secret extension is required",
            ));
        }
    }

    Ok(false)
}

fn check_alpn(
    config: &Config,
    ctx: &HandshakeContext,
    hello: &ServerHello,
) -> Result<Option<Vec<u8>>, Error> {
    let Some(ext) = hello.extension(ExtensionType::ApplicationLayerProtocolNegotiation) else {
        return Ok(None);
    };

    if !ctx.alpn_offered {
        return Err(Error::fatal(
            AlertDescription::UnsupportedExtension,
            "Server sent ALPN extension when not requested by client",
        ));
    }

    let alpn = AlpnExtension::from_extension(ext)?;
    match alpn.protocols.as_slice() {
        [p] if !p.is_empty() => {
            if !config.alpn_protocols().contains(p) {
                return Err(Error::fatal(
                    AlertDescription::HandshakeFailure,
                    format!(
                        "Server has selected an application protocol name which was not offered by the client: {}",
                        String::from_utf8_lossy(p)
                    ),
                ));
            }
            Ok(Some(p.clone()))
        }
        _ => Err(Error::fatal(
            AlertDescription::HandshakeFailure,
            "Incorrect data in ServerHello ALPN message",
        )),
    }
}

/// A fresh client random.
pub(crate) fn random() -> Random {
    Random::new(SystemTime::now())
}
