use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::constraints::AlgorithmConstraints;
use crate::crypto::{rust_crypto, CryptoProvider, SigningKey};
use crate::event::{NoopObserver, Observer};
use crate::trust::{AnchoredValidator, CertValidator};
use crate::types::{CipherSuite, ProtocolVersion};
use crate::Error;

/// Default number of sessions kept by a [`SessionCache`](crate::SessionCache).
pub const DEFAULT_SESSION_CACHE_SIZE: usize = 20480;

/// Default session lifetime.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(86400);

/// Client authentication mode.
///
/// Only a server acts on this. A client answers whatever CertificateRequest
/// it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    #[default]
    None,
    Requested,
    Required,
}

/// Certificate chain and private key used to answer a CertificateRequest.
#[derive(Clone)]
pub struct ClientCertificate {
    chain: Vec<Vec<u8>>,
    private_key: Zeroizing<Vec<u8>>,
}

impl ClientCertificate {
    /// Leaf first DER chain and the key in any format the provider's
    /// [`KeyProvider`](crate::crypto::KeyProvider) understands.
    pub fn new(chain: Vec<Vec<u8>>, private_key: Vec<u8>) -> Self {
        ClientCertificate {
            chain,
            private_key: Zeroizing::new(private_key),
        }
    }

    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    /// Load a fresh signing key. Each handshake gets its own.
    pub(crate) fn signing_key(&self, provider: &CryptoProvider) -> Result<Box<dyn SigningKey>, Error> {
        provider
            .key_provider
            .load_private_key(&self.private_key)
            .map_err(Error::ConfigError)
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Client configuration.
#[derive(Clone)]
pub struct Config {
    protocol_versions: Vec<ProtocolVersion>,
    cipher_suites: Vec<CipherSuite>,
    prefer_local_cipher_suites: bool,
    client_auth: ClientAuth,
    session_cache_size: usize,
    session_timeout: Duration,
    identification_algorithm: Option<String>,
    algorithm_constraints: AlgorithmConstraints,
    server_names: Vec<String>,
    alpn_protocols: Vec<Vec<u8>>,
    use_extended_master_secret: bool,
    allow_legacy_master_secret: bool,
    allow_legacy_resumption: bool,
    allow_unsafe_renegotiation: bool,
    allow_unsafe_server_cert_change: bool,
    allow_legacy_hello_messages: bool,
    enable_new_session: bool,
    client_certificate: Option<ClientCertificate>,
    delegate_trust_checks: bool,
    cert_validator: Arc<dyn CertValidator>,
    observer: Arc<dyn Observer>,
    crypto_provider: CryptoProvider,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            protocol_versions: ProtocolVersion::all().to_vec(),
            cipher_suites: CipherSuite::defaults(),
            prefer_local_cipher_suites: false,
            client_auth: ClientAuth::None,
            session_cache_size: DEFAULT_SESSION_CACHE_SIZE,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            identification_algorithm: None,
            algorithm_constraints: AlgorithmConstraints::default(),
            server_names: Vec::new(),
            alpn_protocols: Vec::new(),
            use_extended_master_secret: true,
            allow_legacy_master_secret: true,
            allow_legacy_resumption: true,
            allow_unsafe_renegotiation: false,
            allow_unsafe_server_cert_change: false,
            allow_legacy_hello_messages: true,
            enable_new_session: true,
            client_certificate: None,
            delegate_trust_checks: false,
            cert_validator: None,
            observer: None,
            crypto_provider: None,
        }
    }

    /// Enabled protocol versions, newest first.
    #[inline(always)]
    pub fn protocol_versions(&self) -> &[ProtocolVersion] {
        &self.protocol_versions
    }

    /// Newest enabled protocol version.
    pub fn max_protocol_version(&self) -> ProtocolVersion {
        self.protocol_versions
            .iter()
            .copied()
            .max()
            .unwrap_or(ProtocolVersion::TLS1_2)
    }

    /// Oldest enabled protocol version. Used for the record version of
    /// the first ClientHello.
    pub fn min_protocol_version(&self) -> ProtocolVersion {
        self.protocol_versions
            .iter()
            .copied()
            .min()
            .unwrap_or(ProtocolVersion::TLS1_0)
    }

    /// Enabled cipher suites in preference order.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Whether local suite order wins over the peer's.
    ///
    /// Kept so a configuration shared with a server reads the same. A client
    /// always offers [`cipher_suites`](Self::cipher_suites) in the order
    /// given and the server picks, so no client code path reads this.
    #[inline(always)]
    pub fn prefer_local_cipher_suites(&self) -> bool {
        self.prefer_local_cipher_suites
    }

    /// Client authentication mode of a server sharing this configuration.
    ///
    /// Not read by the client. Whether a certificate is sent depends only on
    /// the server's CertificateRequest and
    /// [`client_certificate`](Self::client_certificate).
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// Capacity for session caches built with
    /// [`SessionCache::from_config`](crate::SessionCache::from_config).
    #[inline(always)]
    pub fn session_cache_size(&self) -> usize {
        self.session_cache_size
    }

    #[inline(always)]
    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Endpoint identification algorithm ("HTTPS", "LDAP" or "LDAPS").
    #[inline(always)]
    pub fn identification_algorithm(&self) -> Option<&str> {
        self.identification_algorithm.as_deref()
    }

    #[inline(always)]
    pub fn algorithm_constraints(&self) -> &AlgorithmConstraints {
        &self.algorithm_constraints
    }

    /// Host names sent in the server_name extension.
    #[inline(always)]
    pub fn server_names(&self) -> &[String] {
        &self.server_names
    }

    /// Protocols offered with ALPN, most preferred first.
    #[inline(always)]
    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn_protocols
    }

    /// Whether to offer Extended Master Secret (RFC 7627).
    #[inline(always)]
    pub fn use_extended_master_secret(&self) -> bool {
        self.use_extended_master_secret
    }

    /// Whether a full handshake without Extended Master Secret is acceptable.
    #[inline(always)]
    pub fn allow_legacy_master_secret(&self) -> bool {
        self.allow_legacy_master_secret
    }

    /// Whether a session without Extended Master Secret may be resumed.
    #[inline(always)]
    pub fn allow_legacy_resumption(&self) -> bool {
        self.allow_legacy_resumption
    }

    /// Whether to renegotiate with a peer without RFC 5746 support.
    #[inline(always)]
    pub fn allow_unsafe_renegotiation(&self) -> bool {
        self.allow_unsafe_renegotiation
    }

    /// Whether the server certificate may change during renegotiation.
    #[inline(always)]
    pub fn allow_unsafe_server_cert_change(&self) -> bool {
        self.allow_unsafe_server_cert_change
    }

    /// Whether to talk to a server that does not send renegotiation_info.
    #[inline(always)]
    pub fn allow_legacy_hello_messages(&self) -> bool {
        self.allow_legacy_hello_messages
    }

    /// Whether a full handshake is allowed when resumption is refused.
    #[inline(always)]
    pub fn enable_new_session(&self) -> bool {
        self.enable_new_session
    }

    #[inline(always)]
    pub fn client_certificate(&self) -> Option<&ClientCertificate> {
        self.client_certificate.as_ref()
    }

    /// Whether certificate trust checks are handed to the caller as a
    /// [`DelegatedTask`](crate::DelegatedTask).
    #[inline(always)]
    pub fn delegate_trust_checks(&self) -> bool {
        self.delegate_trust_checks
    }

    #[inline(always)]
    pub fn cert_validator(&self) -> &Arc<dyn CertValidator> {
        &self.cert_validator
    }

    #[inline(always)]
    pub fn observer(&self) -> &dyn Observer {
        &*self.observer
    }

    /// Cryptographic provider.
    ///
    /// Provides all cryptographic operations (ciphers, key exchange, signing, etc.).
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Enabled suites that can be negotiated at `version`.
    ///
    /// The signalling suite is not included.
    pub(crate) fn negotiable_suites(&self, version: ProtocolVersion) -> Vec<CipherSuite> {
        self.cipher_suites
            .iter()
            .copied()
            .filter(|s| self.is_negotiable(*s) && s.supports_version(version))
            .collect()
    }

    /// Whether a suite is enabled, implemented and permitted.
    pub(crate) fn is_negotiable(&self, suite: CipherSuite) -> bool {
        !suite.is_scsv()
            && self.cipher_suites.contains(&suite)
            && self.crypto_provider.supports(suite)
            && self.algorithm_constraints.permits_suite(suite)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("protocol_versions", &self.protocol_versions)
            .field("cipher_suites", &self.cipher_suites)
            .field("identification_algorithm", &self.identification_algorithm)
            .field("server_names", &self.server_names)
            .finish_non_exhaustive()
    }
}

/// Builder for the client configuration.
pub struct ConfigBuilder {
    protocol_versions: Vec<ProtocolVersion>,
    cipher_suites: Vec<CipherSuite>,
    prefer_local_cipher_suites: bool,
    client_auth: ClientAuth,
    session_cache_size: usize,
    session_timeout: Duration,
    identification_algorithm: Option<String>,
    algorithm_constraints: AlgorithmConstraints,
    server_names: Vec<String>,
    alpn_protocols: Vec<Vec<u8>>,
    use_extended_master_secret: bool,
    allow_legacy_master_secret: bool,
    allow_legacy_resumption: bool,
    allow_unsafe_renegotiation: bool,
    allow_unsafe_server_cert_change: bool,
    allow_legacy_hello_messages: bool,
    enable_new_session: bool,
    client_certificate: Option<ClientCertificate>,
    delegate_trust_checks: bool,
    cert_validator: Option<Arc<dyn CertValidator>>,
    observer: Option<Arc<dyn Observer>>,
    crypto_provider: Option<CryptoProvider>,
}

impl ConfigBuilder {
    /// Set the enabled protocol versions.
    ///
    /// Defaults to TLS 1.2, 1.1 and 1.0.
    pub fn protocol_versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.protocol_versions = versions.to_vec();
        self
    }

    /// Set the enabled cipher suites in preference order.
    ///
    /// Include `TLS_EMPTY_RENEGOTIATION_INFO_SCSV` to signal secure
    /// renegotiation support on the initial handshake.
    /// Defaults to [`CipherSuite::defaults`].
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    /// Server side setting, not read by the client. Defaults to false.
    pub fn prefer_local_cipher_suites(mut self, prefer: bool) -> Self {
        self.prefer_local_cipher_suites = prefer;
        self
    }

    /// Server side setting, not read by the client. Defaults to
    /// [`ClientAuth::None`].
    pub fn client_auth(mut self, auth: ClientAuth) -> Self {
        self.client_auth = auth;
        self
    }

    /// Defaults to 20480. Zero means unbounded.
    pub fn session_cache_size(mut self, size: usize) -> Self {
        self.session_cache_size = size;
        self
    }

    /// Defaults to 24 hours. Zero means sessions never expire.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the endpoint identification algorithm.
    ///
    /// Defaults to none, which skips host name checks.
    pub fn identification_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.identification_algorithm = Some(algorithm.into());
        self
    }

    /// Defaults to [`AlgorithmConstraints::default`].
    pub fn algorithm_constraints(mut self, constraints: AlgorithmConstraints) -> Self {
        self.algorithm_constraints = constraints;
        self
    }

    /// Set the SNI host names.
    ///
    /// Defaults to none.
    pub fn server_names(mut self, names: &[&str]) -> Self {
        self.server_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Set the ALPN protocols.
    ///
    /// Defaults to none, which omits the extension.
    pub fn alpn_protocols(mut self, protocols: &[&[u8]]) -> Self {
        self.alpn_protocols = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }

    /// Defaults to true.
    pub fn use_extended_master_secret(mut self, enabled: bool) -> Self {
        self.use_extended_master_secret = enabled;
        self
    }

    /// Defaults to true.
    pub fn allow_legacy_master_secret(mut self, allow: bool) -> Self {
        self.allow_legacy_master_secret = allow;
        self
    }

    /// Defaults to true.
    pub fn allow_legacy_resumption(mut self, allow: bool) -> Self {
        self.allow_legacy_resumption = allow;
        self
    }

    /// Defaults to false.
    pub fn allow_unsafe_renegotiation(mut self, allow: bool) -> Self {
        self.allow_unsafe_renegotiation = allow;
        self
    }

    /// Defaults to false.
    pub fn allow_unsafe_server_cert_change(mut self, allow: bool) -> Self {
        self.allow_unsafe_server_cert_change = allow;
        self
    }

    /// Defaults to true.
    pub fn allow_legacy_hello_messages(mut self, allow: bool) -> Self {
        self.allow_legacy_hello_messages = allow;
        self
    }

    /// Defaults to true.
    pub fn enable_new_session(mut self, enabled: bool) -> Self {
        self.enable_new_session = enabled;
        self
    }

    /// Defaults to none, which answers CertificateRequest with an empty chain.
    pub fn client_certificate(mut self, cert: ClientCertificate) -> Self {
        self.client_certificate = Some(cert);
        self
    }

    /// Defaults to false.
    pub fn delegate_trust_checks(mut self, delegate: bool) -> Self {
        self.delegate_trust_checks = delegate;
        self
    }

    /// Set the certificate chain validator.
    ///
    /// Defaults to an [`AnchoredValidator`] without anchors, which trusts
    /// nothing.
    pub fn cert_validator(mut self, validator: Arc<dyn CertValidator>) -> Self {
        self.cert_validator = Some(validator);
        self
    }

    /// Defaults to [`NoopObserver`].
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Set a custom crypto provider.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Build the configuration.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. [`rust_crypto::default_provider`]
    ///
    /// Returns `Error::ConfigError` when no protocol version is enabled, no
    /// enabled suite can be negotiated, or the client key does not load.
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(rust_crypto::default_provider);

        if self.protocol_versions.is_empty() {
            return Err(Error::ConfigError("No protocol version enabled".into()));
        }
        if let Some(v) = self
            .protocol_versions
            .iter()
            .find(|v| matches!(v, ProtocolVersion::Unknown(_)))
        {
            return Err(Error::ConfigError(format!("Unsupported protocol version {}", v)));
        }

        let config = Config {
            protocol_versions: self.protocol_versions,
            cipher_suites: self.cipher_suites,
            prefer_local_cipher_suites: self.prefer_local_cipher_suites,
            client_auth: self.client_auth,
            session_cache_size: self.session_cache_size,
            session_timeout: self.session_timeout,
            identification_algorithm: self.identification_algorithm,
            algorithm_constraints: self.algorithm_constraints,
            server_names: self.server_names,
            alpn_protocols: self.alpn_protocols,
            use_extended_master_secret: self.use_extended_master_secret,
            allow_legacy_master_secret: self.allow_legacy_master_secret,
            allow_legacy_resumption: self.allow_legacy_resumption,
            allow_unsafe_renegotiation: self.allow_unsafe_renegotiation,
            allow_unsafe_server_cert_change: self.allow_unsafe_server_cert_change,
            allow_legacy_hello_messages: self.allow_legacy_hello_messages,
            enable_new_session: self.enable_new_session,
            client_certificate: self.client_certificate,
            delegate_trust_checks: self.delegate_trust_checks,
            cert_validator: self
                .cert_validator
                .unwrap_or_else(|| Arc::new(AnchoredValidator::new(Vec::new()))),
            observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            crypto_provider,
        };

        let negotiable = config
            .protocol_versions
            .iter()
            .any(|v| !config.negotiable_suites(*v).is_empty());
        if !negotiable {
            return Err(Error::ConfigError("No negotiable cipher suite".into()));
        }

        if let Some(cert) = &config.client_certificate {
            if cert.chain.is_empty() {
                return Err(Error::ConfigError("Empty client certificate chain".into()));
            }
            cert.signing_key(&config.crypto_provider)?;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
