//! Full handshakes against the scripted server.

use std::sync::Arc;

use timpl::message::MessageType;
use timpl::types::{CipherSuite, ProtocolVersion};
use timpl::{
    Alert, AlertDescription, AlertLevel, ClientCertificate, Connection, ConnectionState, Error,
    Event, HandshakeStatus, SessionCache,
};

use crate::common::*;

fn new_client(config: timpl::Config) -> (Connection, Arc<SessionCache>) {
    let config = Arc::new(config);
    let cache = Arc::new(SessionCache::from_config(&config));
    let client = Connection::new(config, cache.clone(), Some(HOST), PORT);
    (client, cache)
}

fn last_alert(server: &TestServer) -> Alert {
    *server.alerts.last().expect("client sent no alert")
}

#[test]
fn dhe_rsa_full_handshake() {
    //! DHE_RSA with extended master secret: the session is established,
    //! agrees with the server and lands in the cache under id and host.
    init_log();

    let cert = rsa_cert(HOST);
    let suite = CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256;
    let config = client_config(&[&cert])
        .cipher_suites(&[suite])
        .build()
        .unwrap();
    let (mut client, cache) = new_client(config);
    let mut server = TestServer::new(
        cert.clone(),
        ServerOptions {
            suite,
            ..Default::default()
        },
    );

    connect(&mut client, &mut server).unwrap();

    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);
    assert!(client.is_secure_renegotiation());

    let session = client.session().unwrap().clone();
    assert_eq!(session.cipher_suite(), suite);
    assert_eq!(session.protocol_version(), ProtocolVersion::TLS1_2);
    assert_eq!(session.master_secret().len(), 48);
    assert_eq!(&session.master_secret()[..], &server.master_secret[..]);
    assert!(session.uses_extended_master_secret());
    assert!(!session.is_session_resumption());
    assert!(session.is_rejoinable());
    assert_eq!(session.peer_certificates(), &[cert.der.clone()][..]);
    assert_eq!(session.peer_host(), Some(HOST));
    assert_eq!(session.peer_port(), PORT);

    assert_eq!(cache.get(&session.id()).unwrap().id(), session.id());
    assert_eq!(cache.get_by_host(HOST, PORT).unwrap().id(), session.id());

    assert_eq!(
        server.received,
        vec![
            MessageType::ClientHello,
            MessageType::ClientKeyExchange,
            MessageType::Finished
        ]
    );
}

#[test]
fn ecdhe_ecdsa_message_order() {
    //! The client sees the full flight in order and reports it through the
    //! observer.
    init_log();

    let cert = ecdsa_cert(HOST);
    let events = Arc::new(Events::default());
    let config = client_config(&[&cert])
        .observer(events.clone())
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(cert, ServerOptions::default());

    connect(&mut client, &mut server).unwrap();

    assert_eq!(
        received_messages(&events),
        vec![
            MessageType::ServerHello,
            MessageType::Certificate,
            MessageType::ServerKeyExchange,
            MessageType::ServerHelloDone,
            MessageType::Finished,
        ]
    );
    assert_eq!(
        events.count(|e| matches!(e, Event::HandshakeStarted { renegotiation: false })),
        1
    );
    assert_eq!(
        events.count(|e| matches!(e, Event::NewSession { .. })),
        1
    );
    assert_eq!(
        events.count(|e| matches!(e, Event::SessionCached { .. })),
        1
    );
    assert_eq!(events.count(|e| matches!(e, Event::CipherChanged(_))), 2);
    assert_eq!(client.state(), ConnectionState::ApplicationData);
}

#[test]
fn rsa_key_exchange() {
    //! Plain RSA: no ServerKeyExchange, premaster encrypted to the
    //! certificate key.
    init_log();

    let cert = rsa_cert(HOST);
    let suite = CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256;
    let events = Arc::new(Events::default());
    let config = client_config(&[&cert])
        .cipher_suites(&[suite])
        .observer(events.clone())
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            suite,
            ..Default::default()
        },
    );

    connect(&mut client, &mut server).unwrap();

    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert!(!received_messages(&events).contains(&MessageType::ServerKeyExchange));
    assert_eq!(
        &client.session().unwrap().master_secret()[..],
        &server.master_secret[..]
    );
}

#[test]
fn server_key_exchange_for_rsa_suite() {
    //! ServerKeyExchange is not legal with plain RSA key exchange.
    init_log();

    let cert = rsa_cert(HOST);
    let suite = CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256;
    let config = client_config(&[&cert])
        .cipher_suites(&[suite])
        .build()
        .unwrap();
    let (mut client, cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            suite,
            force_server_key_exchange: true,
            ..Default::default()
        },
    );

    let err = connect(&mut client, &mut server).unwrap_err();

    assert_eq!(err.alert(), AlertDescription::UnexpectedMessage);
    assert_eq!(
        last_alert(&server),
        Alert::new(AlertLevel::Fatal, AlertDescription::UnexpectedMessage)
    );
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(cache.is_empty());
}

#[test]
fn bad_server_key_exchange_signature() {
    //! A ServerKeyExchange that does not verify fails with handshake_failure.
    init_log();

    let cert = ecdsa_cert(HOST);
    let config = client_config(&[&cert]).build().unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            tamper_key_exchange_signature: true,
            ..Default::default()
        },
    );

    let err = connect(&mut client, &mut server).unwrap_err();

    assert!(matches!(
        err,
        Error::CryptoError {
            alert: AlertDescription::HandshakeFailure,
            ..
        }
    ));
    assert_eq!(
        last_alert(&server),
        Alert::new(AlertLevel::Fatal, AlertDescription::HandshakeFailure)
    );
}

#[test]
fn untrusted_server_certificate() {
    //! Without an anchor for the server chain the handshake stops at
    //! Certificate.
    init_log();

    let cert = ecdsa_cert(HOST);
    let other = ecdsa_cert(HOST);
    let config = client_config(&[&other]).build().unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(cert, ServerOptions::default());

    let err = connect(&mut client, &mut server).unwrap_err();

    assert!(matches!(
        err,
        Error::TrustFailure {
            alert: AlertDescription::CertificateUnknown,
            ..
        }
    ));
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.session().is_none());

    // Everything after the failure reports the closed connection.
    assert!(matches!(client.begin_handshake(), Err(Error::Closed(_))));
    assert!(matches!(
        client.send_application_data(b"late"),
        Err(Error::Closed(_))
    ));
}

#[test]
fn endpoint_identification() {
    //! With HTTPS identification the certificate must name the server.
    init_log();

    let wrong = ecdsa_cert("other.example.org");
    let config = client_config(&[&wrong])
        .identification_algorithm("HTTPS")
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(wrong, ServerOptions::default());

    let err = connect(&mut client, &mut server).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::CertificateUnknown);

    let right = ecdsa_cert(HOST);
    let config = client_config(&[&right])
        .identification_algorithm("HTTPS")
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(right, ServerOptions::default());

    connect(&mut client, &mut server).unwrap();
    let session = client.session().unwrap();
    assert_eq!(session.identification_algorithm(), Some("HTTPS"));
}

#[test]
fn extended_master_secret_required() {
    //! A server without extended master secret is refused when legacy
    //! master secrets are not allowed.
    init_log();

    let cert = ecdsa_cert(HOST);
    let config = client_config(&[&cert])
        .allow_legacy_master_secret(false)
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            extended_master_secret: false,
            ..Default::default()
        },
    );

    let err = connect(&mut client, &mut server).unwrap_err();
    assert!(matches!(
        err,
        Error::PolicyViolation {
            alert: AlertDescription::HandshakeFailure,
            ..
        }
    ));
}

#[test]
fn legacy_master_secret() {
    //! Allowed by default, the session just records it.
    init_log();

    let cert = ecdsa_cert(HOST);
    let config = client_config(&[&cert]).build().unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            extended_master_secret: false,
            ..Default::default()
        },
    );

    connect(&mut client, &mut server).unwrap();
    let session = client.session().unwrap();
    assert!(!session.uses_extended_master_secret());
    assert_eq!(&session.master_secret()[..], &server.master_secret[..]);
}

#[test]
fn client_authentication() {
    //! CertificateRequest is answered with Certificate and CertificateVerify.
    init_log();

    let cert = ecdsa_cert(HOST);
    let client_cert = ecdsa_cert("client.example.com");
    let config = client_config(&[&cert])
        .client_certificate(ClientCertificate::new(
            vec![client_cert.der.clone()],
            client_cert.key.clone(),
        ))
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            request_client_certificate: true,
            ..Default::default()
        },
    );

    connect(&mut client, &mut server).unwrap();

    assert_eq!(
        server.received,
        vec![
            MessageType::ClientHello,
            MessageType::Certificate,
            MessageType::ClientKeyExchange,
            MessageType::CertificateVerify,
            MessageType::Finished,
        ]
    );
    assert_eq!(server.client_certificates, vec![vec![client_cert.der.clone()]]);
    assert_eq!(
        client.session().unwrap().local_certificates(),
        &[client_cert.der][..]
    );
}

#[test]
fn certificate_request_without_client_certificate() {
    //! Without a configured certificate the client answers with an empty
    //! chain and no CertificateVerify.
    init_log();

    let cert = ecdsa_cert(HOST);
    let config = client_config(&[&cert]).build().unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            request_client_certificate: true,
            ..Default::default()
        },
    );

    connect(&mut client, &mut server).unwrap();

    assert_eq!(server.client_certificates, vec![Vec::<Vec<u8>>::new()]);
    assert!(!server.received.contains(&MessageType::CertificateVerify));
    assert!(client.session().unwrap().local_certificates().is_empty());
}

#[test]
fn delegated_trust_check() {
    //! With delegated trust checks nothing moves until the task is run and
    //! handed back.
    init_log();

    let cert = ecdsa_cert(HOST);
    let config = client_config(&[&cert])
        .delegate_trust_checks(true)
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(cert, ServerOptions::default());

    connect(&mut client, &mut server).unwrap();

    assert_eq!(client.handshake_status(), HandshakeStatus::NeedTask);
    assert_eq!(client.state(), ConnectionState::Handshaking);
    assert_eq!(server.received, vec![MessageType::ClientHello]);

    let mut task = client.delegated_task().expect("a trust task");
    assert!(client.delegated_task().is_none());
    assert!(!task.is_done());
    task.run();
    assert!(task.is_done());

    client.resume_task(task).unwrap();
    pump(&mut client, &mut server).unwrap();

    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(server.completed, 1);
}

#[test]
fn delegated_trust_check_failure() {
    //! A failed trust task fails the connection when it is handed back.
    init_log();

    let cert = ecdsa_cert(HOST);
    let config = client_config(&[])
        .delegate_trust_checks(true)
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(cert, ServerOptions::default());

    connect(&mut client, &mut server).unwrap();

    let mut task = client.delegated_task().unwrap();
    task.run();
    let err = client.resume_task(task).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::CertificateUnknown);
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[test]
fn tls10_cbc_handshake() {
    //! TLS 1.0 uses the MD5/SHA-1 PRF, unprefixed signatures and 1/n-1
    //! splitting of application records after the first.
    init_log();

    let cert = ecdsa_cert(HOST);
    let suite = CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA;
    let config = client_config(&[&cert])
        .protocol_versions(&[ProtocolVersion::TLS1_0])
        .cipher_suites(&[suite])
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            version: ProtocolVersion::TLS1_0,
            suite,
            ..Default::default()
        },
    );

    connect(&mut client, &mut server).unwrap();
    assert_eq!(
        client.session().unwrap().protocol_version(),
        ProtocolVersion::TLS1_0
    );

    assert!(client.is_first_app_output_record());
    client.send_application_data(b"hello").unwrap();
    assert!(!client.is_first_app_output_record());
    client.send_application_data(b"world").unwrap();
    pump(&mut client, &mut server).unwrap();

    assert_eq!(
        server.application_data,
        vec![b"hello".to_vec(), b"w".to_vec(), b"orld".to_vec()]
    );
}

#[test]
fn version_not_enabled() {
    //! A server choosing a version the client did not enable is refused.
    init_log();

    let cert = ecdsa_cert(HOST);
    let suite = CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA;
    let config = client_config(&[&cert])
        .protocol_versions(&[ProtocolVersion::TLS1_2])
        .cipher_suites(&[suite])
        .build()
        .unwrap();
    let (mut client, _cache) = new_client(config);
    let mut server = TestServer::new(
        cert,
        ServerOptions {
            version: ProtocolVersion::TLS1_1,
            suite,
            ..Default::default()
        },
    );

    let err = connect(&mut client, &mut server).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::HandshakeFailure);
}
