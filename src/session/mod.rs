//! Negotiated sessions and the cache used to resume them.

mod cache;

pub use cache::SessionCache;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use der::Decode;

use crate::crypto::{MasterSecret, MASTER_SECRET_LEN};
use crate::message::SessionId;
use crate::types::{CipherSuite, ProtocolVersion};

/// The outcome of a completed full handshake.
///
/// Suite, version and master secret never change once a session exists.
/// Only the access time and the flags are mutable, which is why a session is
/// shared as `Arc<Session>` between connections and the [`SessionCache`].
pub struct Session {
    id: SessionId,
    cipher_suite: CipherSuite,
    version: ProtocolVersion,
    master_secret: MasterSecret,
    peer_certificates: Vec<Vec<u8>>,
    local_certificates: Vec<Vec<u8>>,
    peer_host: Option<String>,
    peer_port: u16,
    requested_server_names: Vec<String>,
    extended_master_secret: bool,
    alpn_protocol: Option<Vec<u8>>,
    identification_algorithm: Option<String>,
    creation_time: SystemTime,
    last_accessed_ms: AtomicU64,
    rejoinable: AtomicBool,
    is_session_resumption: AtomicBool,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn master_secret(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.master_secret
    }

    /// Server chain, leaf first. Empty for anonymous suites.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    /// Client chain sent to the server, if any.
    pub fn local_certificates(&self) -> &[Vec<u8>] {
        &self.local_certificates
    }

    /// Subject of the leaf certificate as an RFC 4514 string.
    pub fn peer_principal(&self) -> Option<String> {
        let leaf = self.peer_certificates.first()?;
        let cert = x509_cert::Certificate::from_der(leaf).ok()?;
        Some(cert.tbs_certificate.subject.to_string())
    }

    pub fn peer_host(&self) -> Option<&str> {
        self.peer_host.as_deref()
    }

    pub fn peer_port(&self) -> u16 {
        self.peer_port
    }

    /// SNI host names sent when the session was created.
    pub fn requested_server_names(&self) -> &[String] {
        &self.requested_server_names
    }

    /// Whether the master secret was derived with RFC 7627.
    pub fn uses_extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.alpn_protocol.as_deref()
    }

    /// Endpoint identification algorithm in force when the session was made.
    pub fn identification_algorithm(&self) -> Option<&str> {
        self.identification_algorithm.as_deref()
    }

    pub fn creation_time(&self) -> SystemTime {
        self.creation_time
    }

    pub fn last_accessed_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.last_accessed_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn touch(&self, now: SystemTime) {
        self.last_accessed_ms
            .store(millis_since_epoch(now), Ordering::Relaxed);
    }

    /// Whether the session may be offered for resumption.
    pub fn is_rejoinable(&self) -> bool {
        self.rejoinable.load(Ordering::Acquire)
    }

    /// Make the session non resumable. Calling this more than once has no
    /// further effect.
    pub fn invalidate(&self) {
        if self.rejoinable.swap(false, Ordering::AcqRel) {
            debug!("Invalidated session {}", self.id);
        }
    }

    /// Whether this session was resumed by the initial handshake of a
    /// connection. Used to guard against certificate changes on a later
    /// renegotiation.
    pub fn is_session_resumption(&self) -> bool {
        self.is_session_resumption.load(Ordering::Acquire)
    }

    pub(crate) fn set_session_resumption(&self, value: bool) {
        self.is_session_resumption.store(value, Ordering::Release);
    }

    pub(crate) fn is_expired(&self, timeout: Duration, now: SystemTime) -> bool {
        if timeout.is_zero() {
            return false;
        }
        // A deadline past the end of time never comes.
        self.creation_time
            .checked_add(timeout)
            .map_or(false, |deadline| deadline <= now)
    }

    /// The host:port key under which the session is cached.
    pub(crate) fn host_key(&self) -> Option<String> {
        self.peer_host
            .as_deref()
            .map(|host| host_port_key(host, self.peer_port))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("cipher_suite", &self.cipher_suite)
            .field("version", &self.version)
            .field("peer_host", &self.peer_host)
            .field("peer_port", &self.peer_port)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("rejoinable", &self.is_rejoinable())
            .finish_non_exhaustive()
    }
}

pub(crate) fn host_port_key(host: &str, port: u16) -> String {
    format!("{}:{}", host, port).to_lowercase()
}

fn millis_since_epoch(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A session being negotiated.
///
/// Filled in as the handshake progresses and frozen into a [`Session`]
/// exactly once, when the server Finished has been verified.
#[derive(Default)]
pub(crate) struct PendingSession {
    pub id: SessionId,
    pub cipher_suite: Option<CipherSuite>,
    pub version: Option<ProtocolVersion>,
    pub master_secret: Option<MasterSecret>,
    pub peer_certificates: Vec<Vec<u8>>,
    pub local_certificates: Vec<Vec<u8>>,
    pub peer_host: Option<String>,
    pub peer_port: u16,
    pub requested_server_names: Vec<String>,
    pub extended_master_secret: bool,
    pub alpn_protocol: Option<Vec<u8>>,
    pub identification_algorithm: Option<String>,
}

impl PendingSession {
    pub fn freeze(self, now: SystemTime) -> Result<Session, String> {
        let (Some(cipher_suite), Some(version), Some(master_secret)) =
            (self.cipher_suite, self.version, self.master_secret)
        else {
            return Err("Session is missing negotiated parameters".into());
        };
        let ms = millis_since_epoch(now);
        Ok(Session {
            id: self.id,
            cipher_suite,
            version,
            master_secret,
            peer_certificates: self.peer_certificates,
            local_certificates: self.local_certificates,
            peer_host: self.peer_host,
            peer_port: self.peer_port,
            requested_server_names: self.requested_server_names,
            extended_master_secret: self.extended_master_secret,
            alpn_protocol: self.alpn_protocol,
            identification_algorithm: self.identification_algorithm,
            creation_time: now,
            last_accessed_ms: AtomicU64::new(ms),
            // An empty id can never be offered again.
            rejoinable: AtomicBool::new(!self.id.is_empty()),
            is_session_resumption: AtomicBool::new(false),
        })
    }
}
