//! Shared helpers for the TLS 1.2 integration tests: certificates, an event
//! recorder and a scripted in-memory server.

#![allow(unused)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

use timpl::crypto::rust_crypto;
use timpl::crypto::{ActiveKeyExchange, CryptoProvider, RecordCipher};
use timpl::message::extensions::{RenegotiationInfoExtension, TypedExtension};
use timpl::message::{
    Body, Certificate, CertificateRequest, ClientHello, ClientKeyExchange, DigitallySigned,
    EcdhParams, Extension, ExtensionType, Finished, Handshake, MessageType, ParseContext, Random,
    Record, ServerHello, ServerKeyExchange, ServerKeyExchangeParams, SessionId, DhParams,
};
use timpl::types::{
    CipherSuite, ClientCertificateType, ContentType, HashAlgorithm, KeyExchange, NamedCurve,
    ProtocolVersion, SignatureAndHashAlgorithm,
};
use timpl::{
    Alert, AlertDescription, AlertLevel, AnchoredValidator, Config, ConfigBuilder, Connection,
    Error, Event, Observer,
};

pub const HOST: &str = "example.com";
pub const PORT: u16 = 443;

/// RFC 2409 Oakley group 2.
const DH_PRIME_1024: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
                             29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
                             EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
                             E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
                             EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381\
                             FFFFFFFFFFFFFFFF";

/// 2048 bit so that ring, which rcgen signs with, accepts it.
const RSA_KEY_PEM: &str = include_str!("rsa2048.pem");

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn hex(s: &str) -> Vec<u8> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

/// A self signed certificate and its PKCS#8 key.
#[derive(Clone)]
pub struct TestCert {
    pub der: Vec<u8>,
    pub key: Vec<u8>,
}

pub fn ecdsa_cert(name: &str) -> TestCert {
    let cert = rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap();
    TestCert {
        der: cert.serialize_der().unwrap(),
        key: cert.serialize_private_key_der(),
    }
}

pub fn rsa_cert(name: &str) -> TestCert {
    let key_pair = rcgen::KeyPair::from_pem(RSA_KEY_PEM).unwrap();
    let mut params = rcgen::CertificateParams::new(vec![name.to_string()]);
    params.alg = &rcgen::PKCS_RSA_SHA256;
    params.key_pair = Some(key_pair);
    let cert = rcgen::Certificate::from_params(params).unwrap();
    TestCert {
        der: cert.serialize_der().unwrap(),
        key: cert.serialize_private_key_der(),
    }
}

/// A P-256 certificate issued by an RSA CA, as static ECDH_RSA needs.
///
/// Returns the leaf and the CA, which is the one to trust.
pub fn ecdh_rsa_cert(name: &str) -> (TestCert, TestCert) {
    let mut ca_params = rcgen::CertificateParams::new(Vec::new());
    ca_params.alg = &rcgen::PKCS_RSA_SHA256;
    ca_params.key_pair = Some(rcgen::KeyPair::from_pem(RSA_KEY_PEM).unwrap());
    ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(rcgen::DnType::CommonName, "Test RSA CA");
    ca_params.distinguished_name = dn;
    let ca = rcgen::Certificate::from_params(ca_params).unwrap();

    let leaf = rcgen::Certificate::from_params(rcgen::CertificateParams::new(vec![
        name.to_string(),
    ]))
    .unwrap();

    (
        TestCert {
            der: leaf.serialize_der_with_signer(&ca).unwrap(),
            key: leaf.serialize_private_key_der(),
        },
        TestCert {
            der: ca.serialize_der().unwrap(),
            key: ca.serialize_private_key_der(),
        },
    )
}

/// Client config trusting exactly `anchors`.
pub fn client_config(anchors: &[&TestCert]) -> ConfigBuilder {
    let anchors = anchors.iter().map(|c| c.der.clone()).collect();
    Config::builder()
        .server_names(&[HOST])
        .cert_validator(Arc::new(AnchoredValidator::new(anchors)))
}

/// Observer that keeps every event.
#[derive(Default)]
pub struct Events(Mutex<Vec<Event>>);

impl Observer for Events {
    fn on_event(&self, event: &Event) {
        self.0.lock().unwrap().push(event.clone());
    }
}

impl Events {
    pub fn all(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| f(e)).count()
    }
}

/// How the scripted server behaves.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub version: ProtocolVersion,
    pub suite: CipherSuite,
    /// Answer with renegotiation_info when the client signals support.
    pub secure_renegotiation: bool,
    /// Honor extended_master_secret when the client asks for it.
    pub extended_master_secret: bool,
    /// Resume sessions the client offers.
    pub resumption: bool,
    pub request_client_certificate: bool,
    /// Flip a bit in the ServerKeyExchange signature.
    pub tamper_key_exchange_signature: bool,
    /// Send ServerKeyExchange even when the suite has none.
    pub force_server_key_exchange: bool,
    /// Leave out ServerKeyExchange even when the suite needs one.
    pub skip_server_key_exchange: bool,
    /// Answer a renegotiation with the wrong verify data.
    pub bad_renegotiation_info: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            version: ProtocolVersion::TLS1_2,
            suite: CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            secure_renegotiation: true,
            extended_master_secret: true,
            resumption: true,
            request_client_certificate: false,
            tamper_key_exchange_signature: false,
            force_server_key_exchange: false,
            skip_server_key_exchange: false,
            bad_renegotiation_info: false,
        }
    }
}

/// Sessions a server knows, by id: master secret and extended master secret.
pub type ServerSessions = Arc<Mutex<HashMap<SessionId, (Vec<u8>, bool)>>>;

/// Record protection of one direction.
#[derive(Default)]
struct Protection {
    cipher: Option<Box<dyn RecordCipher>>,
    seq: u64,
}

impl Protection {
    fn set(&mut self, cipher: Box<dyn RecordCipher>) {
        self.cipher = Some(cipher);
        self.seq = 0;
    }

    fn seal(&mut self, ct: ContentType, version: ProtocolVersion, data: &[u8]) -> Vec<u8> {
        match &mut self.cipher {
            None => data.to_vec(),
            Some(cipher) => {
                let seq = self.seq;
                self.seq += 1;
                cipher.encrypt(seq, ct, version, data).unwrap()
            }
        }
    }

    fn open(&mut self, ct: ContentType, version: ProtocolVersion, data: &[u8]) -> Vec<u8> {
        match &mut self.cipher {
            None => data.to_vec(),
            Some(cipher) => {
                let seq = self.seq;
                self.seq += 1;
                cipher.decrypt(seq, ct, version, data).unwrap()
            }
        }
    }
}

/// One handshake on the server side.
struct ServerHandshake {
    transcript: Vec<u8>,
    client_random: [u8; 32],
    server_random: [u8; 32],
    session_id: SessionId,
    resumed: bool,
    ems: bool,
    kx: Option<Box<dyn ActiveKeyExchange>>,
    master: Vec<u8>,
    client_certificate: Option<Vec<u8>>,
}

/// A TLS 1.0 - 1.2 server that follows a script instead of a state machine.
///
/// Built from the same message codecs and crypto provider as the client, so
/// it checks the client against an independent view of the key schedule.
pub struct TestServer {
    provider: CryptoProvider,
    cert: TestCert,
    pub options: ServerOptions,
    sessions: ServerSessions,

    hs: Option<ServerHandshake>,
    read: Protection,
    write: Protection,
    pending_read: Option<Box<dyn RecordCipher>>,
    pending_write: Option<Box<dyn RecordCipher>>,

    secure: bool,
    client_verify_data: Vec<u8>,
    server_verify_data: Vec<u8>,

    handshake_bytes: Vec<u8>,
    out: Vec<Vec<u8>>,

    /// Handshake messages from the client, across all handshakes.
    pub received: Vec<MessageType>,
    pub application_data: Vec<Vec<u8>>,
    pub alerts: Vec<Alert>,
    /// Client chains seen in Certificate messages.
    pub client_certificates: Vec<Vec<Vec<u8>>>,
    /// Master secret of the last handshake.
    pub master_secret: Vec<u8>,
    /// Completed handshakes.
    pub completed: usize,
}

impl TestServer {
    pub fn new(cert: TestCert, options: ServerOptions) -> Self {
        TestServer {
            provider: rust_crypto::default_provider(),
            cert,
            options,
            sessions: ServerSessions::default(),
            hs: None,
            read: Protection::default(),
            write: Protection::default(),
            pending_read: None,
            pending_write: None,
            secure: false,
            client_verify_data: Vec::new(),
            server_verify_data: Vec::new(),
            handshake_bytes: Vec::new(),
            out: Vec::new(),
            received: Vec::new(),
            application_data: Vec::new(),
            alerts: Vec::new(),
            client_certificates: Vec::new(),
            master_secret: Vec::new(),
            completed: 0,
        }
    }

    /// Share the session store with another server, like a server farm.
    pub fn sharing_sessions(mut self, other: &TestServer) -> Self {
        self.sessions = other.sessions.clone();
        self
    }

    pub fn sessions(&self) -> ServerSessions {
        self.sessions.clone()
    }

    pub fn set_certificate(&mut self, cert: TestCert) {
        self.cert = cert;
    }

    /// Records for the client.
    pub fn take_output(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.out)
    }

    pub fn hello_request(&mut self) {
        let bytes = Handshake::new(Body::HelloRequest).to_bytes(self.options.version);
        self.write_record(ContentType::Handshake, &bytes);
    }

    pub fn send_application_data(&mut self, data: &[u8]) {
        self.write_record(ContentType::ApplicationData, data);
    }

    pub fn send_alert(&mut self, level: AlertLevel, description: AlertDescription) {
        let mut body = Vec::new();
        Alert::new(level, description).serialize(&mut body);
        self.write_record(ContentType::Alert, &body);
    }

    /// Send a raw record, unprotected by anything but the current cipher.
    pub fn send_record(&mut self, content_type: ContentType, data: &[u8]) {
        self.write_record(content_type, data);
    }

    /// Take one record from the client.
    pub fn receive(&mut self, bytes: &[u8]) {
        let (rest, record) = Record::parse(bytes).unwrap();
        assert!(rest.is_empty(), "one record at a time");

        match record.content_type {
            ContentType::ChangeCipherSpec => {
                let body = self
                    .read
                    .open(record.content_type, record.version, &record.fragment);
                assert_eq!(body, [1]);
                let cipher = self.pending_read.take().expect("ChangeCipherSpec before keys");
                self.read.set(cipher);
            }
            ContentType::Alert => {
                let body = self
                    .read
                    .open(record.content_type, record.version, &record.fragment);
                let (_, alert) = Alert::parse(&body).unwrap();
                self.alerts.push(alert);
            }
            ContentType::ApplicationData => {
                let body = self
                    .read
                    .open(record.content_type, record.version, &record.fragment);
                self.application_data.push(body);
            }
            ContentType::Handshake => {
                let body = self
                    .read
                    .open(record.content_type, record.version, &record.fragment);
                self.handshake_bytes.extend_from_slice(&body);
                self.process_handshake_bytes();
            }
            ContentType::Unknown(t) => panic!("unknown record type {}", t),
        }
    }

    fn process_handshake_bytes(&mut self) {
        loop {
            if self.handshake_bytes.len() < 4 {
                return;
            }
            let (_, (_, len)) = Handshake::parse_header(&self.handshake_bytes).unwrap();
            if self.handshake_bytes.len() < 4 + len {
                return;
            }
            let message: Vec<u8> = self.handshake_bytes.drain(..4 + len).collect();
            self.process_message(&message);
        }
    }

    fn process_message(&mut self, bytes: &[u8]) {
        let ctx = ParseContext {
            version: self.options.version,
            key_exchange: self.options.suite.key_exchange(),
        };
        let (_, message) = Handshake::parse(bytes, &ctx).unwrap();
        self.received.push(message.msg_type);

        match message.body {
            Body::ClientHello(hello) => self.client_hello(hello, bytes),
            Body::Certificate(cert) => {
                self.hs().transcript.extend_from_slice(bytes);
                self.hs().client_certificate = cert.certificate_list.first().cloned();
                self.client_certificates.push(cert.certificate_list);
            }
            Body::ClientKeyExchange(cke) => {
                self.hs().transcript.extend_from_slice(bytes);
                self.client_key_exchange(cke);
            }
            Body::CertificateVerify(verify) => {
                let hs = self.hs.as_ref().unwrap();
                let cert = hs.client_certificate.as_ref().expect("no client certificate");
                let hash = verify
                    .signed
                    .algorithm
                    .map(|a| a.hash)
                    .unwrap_or(HashAlgorithm::None);
                let algorithm = self
                    .provider
                    .signature_verification
                    .public_key_info(cert)
                    .unwrap()
                    .algorithm;
                self.provider
                    .signature_verification
                    .verify_signature(cert, &hs.transcript, &verify.signed.signature, hash, algorithm)
                    .expect("CertificateVerify does not verify");
                self.hs().transcript.extend_from_slice(bytes);
            }
            Body::Finished(finished) => self.client_finished(finished, bytes),
            other => panic!("server got {:?}", other),
        }
    }

    fn client_hello(&mut self, hello: ClientHello, bytes: &[u8]) {
        let renegotiation = self.completed > 0;
        let signals_secure = hello.extension(ExtensionType::RenegotiationInfo).is_some()
            || hello.cipher_suites.iter().any(|s| s.is_scsv());
        if !renegotiation {
            self.secure = self.options.secure_renegotiation && signals_secure;
        }
        assert!(
            hello.cipher_suites.contains(&self.options.suite),
            "client did not offer {}",
            self.options.suite
        );

        let offered = (!hello.session_id.is_empty() && self.options.resumption)
            .then(|| self.sessions.lock().unwrap().get(&hello.session_id).cloned())
            .flatten();
        let wants_ems = hello.extension(ExtensionType::ExtendedMasterSecret).is_some();

        let random = Random::new(SystemTime::now());
        let (session_id, resumed, ems, master) = match offered {
            Some((master, ems)) => (hello.session_id, true, ems, master),
            None => (
                SessionId::random(),
                false,
                wants_ems && self.options.extended_master_secret,
                Vec::new(),
            ),
        };

        self.hs = Some(ServerHandshake {
            transcript: bytes.to_vec(),
            client_random: hello.random.to_bytes(),
            server_random: random.to_bytes(),
            session_id,
            resumed,
            ems,
            kx: None,
            master,
            client_certificate: None,
        });

        let mut server_hello = ServerHello::new(self.options.version, random, session_id, self.options.suite);
        if self.secure {
            let mut info = self.client_verify_data.clone();
            info.extend_from_slice(&self.server_verify_data);
            if self.options.bad_renegotiation_info && renegotiation {
                info[0] ^= 0xff;
            }
            server_hello = server_hello.with_extension(&RenegotiationInfoExtension::new(info));
        }
        if ems {
            server_hello
                .extensions
                .get_or_insert_with(Vec::new)
                .push(Extension::new(ExtensionType::ExtendedMasterSecret, Vec::new()));
        }
        self.send_handshake(Body::ServerHello(server_hello));

        if resumed {
            self.derive_keys();
            self.send_change_cipher_spec_and_finished();
            return;
        }

        let kx = self.options.suite.key_exchange().unwrap();
        if !kx.is_anonymous() {
            let chain = vec![self.cert.der.clone()];
            self.send_handshake(Body::Certificate(Certificate::new(chain)));
        }
        if let Some(ske) = self.server_key_exchange(kx) {
            self.send_handshake(Body::ServerKeyExchange(ske));
        }
        if self.options.request_client_certificate {
            let request = CertificateRequest {
                certificate_types: vec![
                    ClientCertificateType::ECDSA_SIGN,
                    ClientCertificateType::RSA_SIGN,
                ],
                supported_signature_algorithms: SignatureAndHashAlgorithm::supported().to_vec(),
                certificate_authorities: Vec::new(),
            };
            self.send_handshake(Body::CertificateRequest(request));
        }
        self.send_handshake(Body::ServerHelloDone);
    }

    fn server_key_exchange(&mut self, kx: KeyExchange) -> Option<ServerKeyExchange> {
        if self.options.skip_server_key_exchange {
            return None;
        }
        let params = match kx {
            KeyExchange::DHE_RSA | KeyExchange::DH_ANON => {
                let p = hex(DH_PRIME_1024);
                let exchange = self.provider.dh.start_exchange(&p, &[2]).unwrap();
                let ys = exchange.pub_key().to_vec();
                self.hs().kx = Some(exchange);
                ServerKeyExchangeParams::Dh(DhParams { p, g: vec![2], ys })
            }
            KeyExchange::ECDHE_ECDSA | KeyExchange::ECDHE_RSA | KeyExchange::ECDH_ANON => {
                let group = self.provider.find_kx_group(NamedCurve::Secp256r1).unwrap();
                let exchange = group.start_exchange().unwrap();
                let public_key = exchange.pub_key().to_vec();
                self.hs().kx = Some(exchange);
                ServerKeyExchangeParams::Ecdh(EcdhParams {
                    named_curve: NamedCurve::Secp256r1,
                    public_key,
                })
            }
            _ if self.options.force_server_key_exchange => {
                return Some(ServerKeyExchange::new(
                    ServerKeyExchangeParams::Opaque(vec![0, 1, 0]),
                    None,
                ));
            }
            _ => return None,
        };

        if kx.is_anonymous() {
            return Some(ServerKeyExchange::new(params, None));
        }

        let mut ske = ServerKeyExchange::new(params, None);
        let hs = self.hs.as_ref().unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&hs.client_random);
        data.extend_from_slice(&hs.server_random);
        data.extend_from_slice(&ske.params_bytes());

        let mut key = self.provider.key_provider.load_private_key(&self.cert.key).unwrap();
        let (algorithm, hash) = if self.options.version.is_tls12() {
            let alg = SignatureAndHashAlgorithm::new(HashAlgorithm::SHA256, key.algorithm());
            (Some(alg), HashAlgorithm::SHA256)
        } else {
            (None, HashAlgorithm::None)
        };
        let mut signature = key.sign(&data, hash).unwrap();
        if self.options.tamper_key_exchange_signature {
            let last = signature.len() - 1;
            signature[last] ^= 0x01;
        }
        ske.signature = Some(DigitallySigned::new(algorithm, signature));
        Some(ske)
    }

    fn client_key_exchange(&mut self, cke: ClientKeyExchange) {
        let premaster = match cke {
            ClientKeyExchange::Rsa(encrypted) => {
                let key = RsaPrivateKey::from_pkcs8_der(&self.cert.key).unwrap();
                let premaster = key.decrypt(Pkcs1v15Encrypt, &encrypted).unwrap();
                assert_eq!(premaster.len(), 48);
                premaster
            }
            ClientKeyExchange::Dh(public) | ClientKeyExchange::Ecdh(public) => {
                let exchange = self.hs().kx.take();
                match exchange {
                    Some(exchange) => exchange.complete(&public).unwrap(),
                    // Static ECDH with the certificate key.
                    None => {
                        let secret = p256::SecretKey::from_pkcs8_der(&self.cert.key).unwrap();
                        let client = p256::PublicKey::from_sec1_bytes(&public).unwrap();
                        let shared = p256::ecdh::diffie_hellman(
                            secret.to_nonzero_scalar(),
                            client.as_affine(),
                        );
                        shared.raw_secret_bytes().to_vec()
                    }
                }
            }
        };

        let hash = self.prf_hash();
        let hs = self.hs.as_ref().unwrap();
        let master = if hs.ems {
            let session_hash = self.transcript_hash();
            self.prf(&premaster, "extended master secret", &session_hash, 48, hash)
        } else {
            let mut seed = hs.client_random.to_vec();
            seed.extend_from_slice(&hs.server_random);
            self.prf(&premaster, "master secret", &seed, 48, hash)
        };
        self.hs().master = master;
        self.derive_keys();
    }

    fn client_finished(&mut self, finished: Finished, bytes: &[u8]) {
        let expected = self.verify_data(true);
        assert_eq!(finished.verify_data, expected, "client Finished does not verify");
        self.hs().transcript.extend_from_slice(bytes);
        self.client_verify_data = finished.verify_data;

        let resumed = self.hs.as_ref().unwrap().resumed;
        if !resumed {
            self.send_change_cipher_spec_and_finished();
        }

        let hs = self.hs.take().unwrap();
        if !resumed {
            self.sessions
                .lock()
                .unwrap()
                .insert(hs.session_id, (hs.master.clone(), hs.ems));
        }
        self.master_secret = hs.master;
        self.completed += 1;
    }

    fn send_change_cipher_spec_and_finished(&mut self) {
        self.write_record(ContentType::ChangeCipherSpec, &[1]);
        let cipher = self.pending_write.take().unwrap();
        self.write.set(cipher);

        let verify_data = self.verify_data(false);
        self.server_verify_data = verify_data.clone();
        self.send_handshake(Body::Finished(Finished::new(verify_data)));
    }

    fn derive_keys(&mut self) {
        let suite = self.options.suite;
        let version = self.options.version;
        let hash = self.prf_hash();
        let hs = self.hs.as_ref().unwrap();

        let (mac_len, key_len, iv_len) = suite.key_lengths();
        let mut seed = hs.server_random.to_vec();
        seed.extend_from_slice(&hs.client_random);
        let total = 2 * (mac_len + key_len + iv_len);
        let block = self.prf(&hs.master, "key expansion", &seed, total, hash);

        let (client_mac, rest) = block.split_at(mac_len);
        let (server_mac, rest) = rest.split_at(mac_len);
        let (client_key, rest) = rest.split_at(key_len);
        let (server_key, rest) = rest.split_at(key_len);
        let (client_iv, server_iv) = rest.split_at(iv_len);

        let factory = self.provider.find_cipher_suite(suite).unwrap();
        self.pending_read = Some(
            factory
                .create_cipher(version, client_mac, client_key, client_iv)
                .unwrap(),
        );
        self.pending_write = Some(
            factory
                .create_cipher(version, server_mac, server_key, server_iv)
                .unwrap(),
        );
    }

    fn verify_data(&self, client: bool) -> Vec<u8> {
        let label = if client {
            "client finished"
        } else {
            "server finished"
        };
        let digest = self.transcript_hash();
        let hs = self.hs.as_ref().unwrap();
        self.prf(&hs.master, label, &digest, 12, self.prf_hash())
    }

    fn transcript_hash(&self) -> Vec<u8> {
        let mut ctx = self.provider.hash_provider.create_hash(self.prf_hash()).unwrap();
        ctx.update(&self.hs.as_ref().unwrap().transcript);
        ctx.clone_and_finalize().to_vec()
    }

    fn prf_hash(&self) -> HashAlgorithm {
        if self.options.version.is_tls12() {
            self.options.suite.prf_hash()
        } else {
            HashAlgorithm::None
        }
    }

    fn prf(&self, secret: &[u8], label: &str, seed: &[u8], len: usize, hash: HashAlgorithm) -> Vec<u8> {
        self.provider
            .prf_provider
            .prf(secret, label, seed, len, hash)
            .unwrap()
    }

    fn send_handshake(&mut self, body: Body) {
        let bytes = Handshake::new(body).to_bytes(self.options.version);
        self.hs().transcript.extend_from_slice(&bytes);
        self.write_record(ContentType::Handshake, &bytes);
    }

    fn write_record(&mut self, content_type: ContentType, data: &[u8]) {
        let version = self.options.version;
        let fragment = self.write.seal(content_type, version, data);
        self.out
            .push(Record::new(content_type, version, fragment).to_bytes());
    }

    fn hs(&mut self) -> &mut ServerHandshake {
        self.hs.as_mut().expect("no handshake in progress")
    }
}

/// Move records both ways until neither side has anything to say.
///
/// Stops at the first client error, after handing the client's alert to
/// the server.
pub fn pump(client: &mut Connection, server: &mut TestServer) -> Result<(), Error> {
    for _ in 0..64 {
        let mut moved = false;

        while let Some(record) = client.poll_record() {
            server.receive(&record);
            moved = true;
        }

        for record in server.take_output() {
            moved = true;
            if let Err(e) = client.handle_bytes(&record) {
                while let Some(record) = client.poll_record() {
                    server.receive(&record);
                }
                return Err(e);
            }
        }

        if !moved {
            return Ok(());
        }
    }
    panic!("client and server keep talking");
}

/// Start the handshake and run it to the end.
pub fn connect(client: &mut Connection, server: &mut TestServer) -> Result<(), Error> {
    client.begin_handshake()?;
    pump(client, server)
}

/// Messages of one handshake as the client saw them.
pub fn received_messages(events: &Events) -> Vec<MessageType> {
    events
        .all()
        .into_iter()
        .filter_map(|e| match e {
            Event::MessageReceived(t) => Some(t),
            _ => None,
        })
        .collect()
}
