use std::sync::Arc;

use crate::crypto::{ActiveKeyExchange, PublicKeyInfo, RecordCipher, Transcript};
use crate::message::{CertificateRequest, RsaParams};
use crate::session::{PendingSession, Session};
use crate::types::{CipherSuite, KeyExchange, ProtocolVersion, SignatureAndHashAlgorithm};
use crate::{AlertDescription, Error};

/// Everything one handshake attempt accumulates.
///
/// Created by kickstart and dropped when the handshake completes or fails.
/// Nothing in here outlives the attempt except what is frozen into the
/// [`Session`].
pub(crate) struct HandshakeContext {
    /// Whether an earlier handshake completed on the connection.
    pub renegotiation: bool,

    pub client_random: [u8; 32],
    pub server_random: [u8; 32],

    /// Highest version offered in ClientHello.
    pub max_version: ProtocolVersion,
    /// The version chosen by the server, once known.
    pub version: Option<ProtocolVersion>,

    /// Suites sent in ClientHello, including the signalling suite.
    pub offered_suites: Vec<CipherSuite>,
    /// Signature algorithms sent in ClientHello.
    pub offered_signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    pub requested_server_names: Vec<String>,
    pub requested_ems: bool,
    pub alpn_offered: bool,

    pub transcript: Transcript,

    /// Session offered for resumption.
    pub candidate: Option<Arc<Session>>,
    /// Whether the server accepted the candidate.
    pub resuming: bool,
    /// Server chain of a resumed initial handshake. A renegotiation may not
    /// swap it for a different identity.
    pub reserved_server_certs: Option<Vec<Vec<u8>>>,

    /// The new session, filled in as the full handshake goes.
    pub session: PendingSession,

    pub peer_key: Option<PublicKeyInfo>,
    /// Ephemeral RSA key of RSA_EXPORT.
    pub ephemeral_rsa: Option<RsaParams>,
    /// Our half of an ephemeral exchange, consumed by ClientKeyExchange.
    pub key_exchange: Option<Box<dyn ActiveKeyExchange>>,
    /// The server's ephemeral public value.
    pub server_public: Vec<u8>,

    pub cert_request: Option<CertificateRequest>,
    /// CertificateRequest algorithms that local policy also allows.
    pub peer_signature_algorithms: Vec<SignatureAndHashAlgorithm>,

    /// Pending ciphers, installed at the ChangeCipherSpec of each direction.
    pub read_cipher: Option<Box<dyn RecordCipher>>,
    pub write_cipher: Option<Box<dyn RecordCipher>>,
}

impl HandshakeContext {
    pub fn new(renegotiation: bool, client_random: [u8; 32], max_version: ProtocolVersion) -> Self {
        HandshakeContext {
            renegotiation,
            client_random,
            server_random: [0; 32],
            max_version,
            version: None,
            offered_suites: Vec::new(),
            offered_signature_algorithms: Vec::new(),
            requested_server_names: Vec::new(),
            requested_ems: false,
            alpn_offered: false,
            transcript: Transcript::new(),
            candidate: None,
            resuming: false,
            reserved_server_certs: None,
            session: PendingSession::default(),
            peer_key: None,
            ephemeral_rsa: None,
            key_exchange: None,
            server_public: Vec::new(),
            cert_request: None,
            peer_signature_algorithms: Vec::new(),
            read_cipher: None,
            write_cipher: None,
        }
    }

    /// Version to encode and parse with. The offered maximum until
    /// ServerHello settles it.
    pub fn version(&self) -> ProtocolVersion {
        self.version.unwrap_or(self.max_version)
    }

    pub fn suite(&self) -> Result<CipherSuite, Error> {
        self.session
            .cipher_suite
            .ok_or_else(|| Error::InternalError("No cipher suite negotiated".into()))
    }

    pub fn key_exchange_algorithm(&self) -> Option<KeyExchange> {
        self.session.cipher_suite.and_then(|s| s.key_exchange())
    }

    pub fn master_secret(&self) -> Result<&[u8], Error> {
        if self.resuming {
            if let Some(candidate) = &self.candidate {
                return Ok(&candidate.master_secret()[..]);
            }
        }
        self.session
            .master_secret
            .as_ref()
            .map(|ms| &ms[..])
            .ok_or_else(|| Error::InternalError("Master secret not yet derived".into()))
    }

    pub fn leaf_certificate(&self) -> Result<&[u8], Error> {
        self.session
            .peer_certificates
            .first()
            .map(|c| &c[..])
            .ok_or_else(|| {
                Error::fatal(
                    AlertDescription::UnexpectedMessage,
                    "Server did not send certificate message",
                )
            })
    }

    pub fn peer_key(&self) -> Result<&PublicKeyInfo, Error> {
        self.peer_key.as_ref().ok_or_else(|| {
            Error::fatal(
                AlertDescription::UnexpectedMessage,
                "Server did not send certificate message",
            )
        })
    }

    /// Wipe secrets the context still holds.
    pub fn dispose(&mut self) {
        for cipher in [self.read_cipher.as_mut(), self.write_cipher.as_mut()]
            .into_iter()
            .flatten()
        {
            cipher.dispose();
        }
        self.read_cipher = None;
        self.write_cipher = None;
        self.key_exchange = None;
        self.session.master_secret = None;
    }
}
