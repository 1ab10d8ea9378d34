//! Renegotiation, secure and otherwise.

use std::sync::Arc;

use timpl::message::MessageType;
use timpl::{
    Alert, AlertDescription, AlertLevel, Connection, ConnectionState, Error, Event, SessionCache,
};

use crate::common::*;

fn established(
    cert: &TestCert,
    build: impl FnOnce(timpl::ConfigBuilder) -> timpl::ConfigBuilder,
    options: ServerOptions,
) -> (Connection, TestServer, Arc<Events>) {
    let events = Arc::new(Events::default());
    let config = Arc::new(
        build(client_config(&[cert]).observer(events.clone()))
            .build()
            .unwrap(),
    );
    let cache = Arc::new(SessionCache::from_config(&config));
    let mut client = Connection::new(config, cache, Some(HOST), PORT);
    let mut server = TestServer::new(cert.clone(), options);
    connect(&mut client, &mut server).unwrap();
    events.clear();
    (client, server, events)
}

fn exchange_data(client: &mut Connection, server: &mut TestServer) {
    server.application_data.clear();
    client.send_application_data(b"after").unwrap();
    server.send_application_data(b"again");
    pump(client, server).unwrap();
    assert_eq!(server.application_data, vec![b"after".to_vec()]);
    assert_eq!(client.poll_application_data(), Some(b"again".to_vec()));
}

#[test]
fn server_requested_full_renegotiation() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let (mut client, mut server, events) = established(&cert, |b| b, ServerOptions::default());
    assert!(client.is_secure_renegotiation());
    let before = client.session().unwrap().clone();

    server.options.resumption = false;
    server.received.clear();
    server.hello_request();
    pump(&mut client, &mut server).unwrap();

    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(server.completed, 2);
    assert_eq!(
        server.received,
        vec![
            MessageType::ClientHello,
            MessageType::ClientKeyExchange,
            MessageType::Finished
        ]
    );
    assert_eq!(
        events.count(|e| matches!(e, Event::HandshakeStarted { renegotiation: true })),
        1
    );
    assert_eq!(
        events.count(|e| matches!(
            e,
            Event::StateChanged {
                to: ConnectionState::Renegotiating,
                ..
            }
        )),
        1
    );

    let after = client.session().unwrap();
    assert_ne!(after.id(), before.id());
    // A renegotiation that declines the offer leaves the old session alone.
    assert!(before.is_rejoinable());
    assert_eq!(client.poll_application_data(), None);

    exchange_data(&mut client, &mut server);
}

#[test]
fn server_requested_abbreviated_renegotiation() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let (mut client, mut server, events) = established(&cert, |b| b, ServerOptions::default());
    let before = client.session().unwrap().clone();

    server.received.clear();
    server.hello_request();
    pump(&mut client, &mut server).unwrap();

    assert_eq!(
        server.received,
        vec![MessageType::ClientHello, MessageType::Finished]
    );
    assert_eq!(events.count(|e| matches!(e, Event::SessionResumed { .. })), 1);
    assert_eq!(client.session().unwrap().id(), before.id());
    // The session was renegotiated, not resumed by a new connection.
    assert!(!client.session().unwrap().is_session_resumption());

    exchange_data(&mut client, &mut server);
}

#[test]
fn client_initiated_renegotiation() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let (mut client, mut server, events) = established(&cert, |b| b, ServerOptions::default());

    client.begin_handshake().unwrap();
    assert_eq!(client.state(), ConnectionState::Renegotiating);

    // Application data keeps flowing while renegotiating.
    client.send_application_data(b"during").unwrap();

    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(server.completed, 2);
    assert_eq!(server.application_data, vec![b"during".to_vec()]);
    assert_eq!(
        events.count(|e| matches!(e, Event::HandshakeStarted { renegotiation: true })),
        1
    );

    exchange_data(&mut client, &mut server);
}

#[test]
fn begin_handshake_while_renegotiating_is_a_no_op() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let (mut client, mut server, events) = established(&cert, |b| b, ServerOptions::default());

    client.begin_handshake().unwrap();
    client.begin_handshake().unwrap();
    assert_eq!(
        events.count(|e| matches!(e, Event::MessageSent(MessageType::ClientHello))),
        1
    );
    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.state(), ConnectionState::ApplicationData);
}

#[test]
fn wrong_renegotiation_info() {
    //! The server does not prove knowledge of the previous handshake.
    init_log();
    let cert = ecdsa_cert(HOST);
    let (mut client, mut server, _) = established(&cert, |b| b, ServerOptions::default());

    server.options.bad_renegotiation_info = true;
    server.hello_request();
    let err = pump(&mut client, &mut server).unwrap_err();

    assert_eq!(err.alert(), AlertDescription::HandshakeFailure);
    assert_eq!(
        server.alerts.last(),
        Some(&Alert::new(AlertLevel::Fatal, AlertDescription::HandshakeFailure))
    );
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(!client.session().unwrap().is_rejoinable());
}

#[test]
fn insecure_server_refuses_renegotiation() {
    //! Without secure renegotiation a HelloRequest gets a warning and the
    //! connection carries on.
    init_log();
    let cert = ecdsa_cert(HOST);
    let options = ServerOptions {
        secure_renegotiation: false,
        ..Default::default()
    };
    let (mut client, mut server, events) = established(&cert, |b| b, options);
    assert!(!client.is_secure_renegotiation());

    server.hello_request();
    pump(&mut client, &mut server).unwrap();

    assert_eq!(
        server.alerts,
        vec![Alert::new(AlertLevel::Warning, AlertDescription::NoRenegotiation)]
    );
    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(events.count(|e| matches!(e, Event::RenegotiationRefused)), 1);
    assert_eq!(server.completed, 1);

    let err = client.begin_handshake().unwrap_err();
    assert!(matches!(
        err,
        Error::PolicyViolation {
            alert: AlertDescription::HandshakeFailure,
            ..
        }
    ));
    assert_eq!(client.state(), ConnectionState::ApplicationData);

    exchange_data(&mut client, &mut server);
}

#[test]
fn unsafe_renegotiation_when_allowed() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let options = ServerOptions {
        secure_renegotiation: false,
        ..Default::default()
    };
    let (mut client, mut server, events) =
        established(&cert, |b| b.allow_unsafe_renegotiation(true), options);

    server.options.resumption = false;
    server.hello_request();
    pump(&mut client, &mut server).unwrap();

    assert_eq!(server.completed, 2);
    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(events.count(|e| matches!(e, Event::RenegotiationRefused)), 0);
    assert!(!client.is_secure_renegotiation());

    exchange_data(&mut client, &mut server);
}

/// A connection whose session came from an abbreviated handshake, over
/// legacy master secrets and without endpoint identification.
fn resumed_legacy(
    cert: &TestCert,
    other: &TestCert,
    build: impl Fn(timpl::ConfigBuilder) -> timpl::ConfigBuilder,
) -> (Connection, TestServer) {
    let config = Arc::new(
        build(client_config(&[cert, other]).use_extended_master_secret(false))
            .build()
            .unwrap(),
    );
    let cache = Arc::new(SessionCache::from_config(&config));
    let options = ServerOptions {
        extended_master_secret: false,
        ..Default::default()
    };

    let mut first = Connection::new(config.clone(), cache.clone(), Some(HOST), PORT);
    let mut server = TestServer::new(cert.clone(), options.clone());
    connect(&mut first, &mut server).unwrap();

    let mut second = Connection::new(config, cache, Some(HOST), PORT);
    let mut server2 = TestServer::new(cert.clone(), options).sharing_sessions(&server);
    connect(&mut second, &mut server2).unwrap();
    assert!(second.session().unwrap().is_session_resumption());

    (second, server2)
}

#[test]
fn certificate_change_after_resumption() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let other = ecdsa_cert("other.example.org");
    let (mut client, mut server) = resumed_legacy(&cert, &other, |b| b);

    server.set_certificate(other);
    server.options.resumption = false;
    server.hello_request();
    let err = pump(&mut client, &mut server).unwrap_err();

    assert!(matches!(
        err,
        Error::TrustFailure {
            alert: AlertDescription::BadCertificate,
            ..
        }
    ));
    assert_eq!(
        server.alerts.last(),
        Some(&Alert::new(AlertLevel::Fatal, AlertDescription::BadCertificate))
    );
}

#[test]
fn same_identity_after_resumption() {
    //! A new certificate for the same name is fine.
    init_log();
    let cert = ecdsa_cert(HOST);
    let renewed = ecdsa_cert(HOST);
    let (mut client, mut server) = resumed_legacy(&cert, &renewed, |b| b);

    server.set_certificate(renewed);
    server.options.resumption = false;
    server.hello_request();
    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(server.completed, 2);
}

#[test]
fn certificate_change_when_allowed() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let other = ecdsa_cert("other.example.org");
    let (mut client, mut server) =
        resumed_legacy(&cert, &other, |b| b.allow_unsafe_server_cert_change(true));

    server.set_certificate(other);
    server.options.resumption = false;
    server.hello_request();
    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.state(), ConnectionState::ApplicationData);
}
