//! Abbreviated handshakes and the choice of the session to offer.

use std::sync::Arc;

use timpl::message::MessageType;
use timpl::types::CipherSuite;
use timpl::{AlertDescription, Config, Connection, ConnectionState, Error, Event, SessionCache};

use crate::common::*;

struct Setup {
    cert: TestCert,
    config: Arc<Config>,
    cache: Arc<SessionCache>,
    events: Arc<Events>,
}

impl Setup {
    fn new(build: impl FnOnce(timpl::ConfigBuilder) -> timpl::ConfigBuilder) -> Self {
        let cert = ecdsa_cert(HOST);
        let events = Arc::new(Events::default());
        let config = Arc::new(
            build(client_config(&[&cert]).observer(events.clone()))
                .build()
                .unwrap(),
        );
        let cache = Arc::new(SessionCache::from_config(&config));
        Setup {
            cert,
            config,
            cache,
            events,
        }
    }

    fn client(&self) -> Connection {
        Connection::new(self.config.clone(), self.cache.clone(), Some(HOST), PORT)
    }

    fn offered(&self) -> usize {
        self.events
            .count(|e| matches!(e, Event::ResumptionOffered { .. }))
    }
}

#[test]
fn abbreviated_handshake() {
    //! A second connection to the same peer resumes the cached session:
    //! no Certificate, no key exchange, server Finished first.
    init_log();
    let setup = Setup::new(|b| b);

    let mut first = setup.client();
    let mut server = TestServer::new(setup.cert.clone(), ServerOptions::default());
    connect(&mut first, &mut server).unwrap();
    let original = first.session().unwrap().clone();
    let created = original.creation_time();
    setup.events.clear();

    let mut second = setup.client();
    let mut server2 =
        TestServer::new(setup.cert.clone(), ServerOptions::default()).sharing_sessions(&server);
    connect(&mut second, &mut server2).unwrap();

    assert_eq!(second.state(), ConnectionState::ApplicationData);
    let resumed = second.session().unwrap();
    assert!(Arc::ptr_eq(resumed, &original));
    assert!(resumed.is_session_resumption());
    assert_eq!(resumed.creation_time(), created);
    assert!(resumed.last_accessed_time() >= created);

    assert_eq!(
        received_messages(&setup.events),
        vec![MessageType::ServerHello, MessageType::Finished]
    );
    assert_eq!(
        server2.received,
        vec![MessageType::ClientHello, MessageType::Finished]
    );
    assert_eq!(setup.offered(), 1);
    assert_eq!(
        setup
            .events
            .count(|e| matches!(e, Event::SessionResumed { session_id } if *session_id == original.id())),
        1
    );
    assert_eq!(setup.events.count(|e| matches!(e, Event::NewSession { .. })), 0);
    assert_eq!(setup.events.count(|e| matches!(e, Event::SessionCached { .. })), 0);

    // Keys from the resumed master secret work both ways.
    second.send_application_data(b"ping").unwrap();
    server2.send_application_data(b"pong");
    pump(&mut second, &mut server2).unwrap();
    assert_eq!(server2.application_data, vec![b"ping".to_vec()]);
    assert_eq!(second.poll_application_data(), Some(b"pong".to_vec()));
}

#[test]
fn server_declines_resumption() {
    //! The server starts a new session instead. The offered one is
    //! invalidated and the new one cached.
    init_log();
    let setup = Setup::new(|b| b);

    let mut first = setup.client();
    let mut server = TestServer::new(setup.cert.clone(), ServerOptions::default());
    connect(&mut first, &mut server).unwrap();
    let original = first.session().unwrap().clone();
    setup.events.clear();

    let mut second = setup.client();
    let mut server2 = TestServer::new(
        setup.cert.clone(),
        ServerOptions {
            resumption: false,
            ..Default::default()
        },
    );
    connect(&mut second, &mut server2).unwrap();

    let session = second.session().unwrap();
    assert_ne!(session.id(), original.id());
    assert!(!session.is_session_resumption());
    assert!(!original.is_rejoinable());
    assert!(setup.cache.get(&original.id()).is_none());
    assert_eq!(setup.cache.get_by_host(HOST, PORT).unwrap().id(), session.id());
    assert_eq!(setup.offered(), 1);
    assert_eq!(setup.events.count(|e| matches!(e, Event::NewSession { .. })), 1);
}

#[test]
fn identification_algorithm_must_match() {
    //! A session made without endpoint identification is not offered to a
    //! configuration that asks for it.
    init_log();
    let setup = Setup::new(|b| b);

    let mut first = setup.client();
    let mut server = TestServer::new(setup.cert.clone(), ServerOptions::default());
    connect(&mut first, &mut server).unwrap();

    let events = Arc::new(Events::default());
    let strict = Arc::new(
        client_config(&[&setup.cert])
            .identification_algorithm("HTTPS")
            .observer(events.clone())
            .build()
            .unwrap(),
    );
    let mut second = Connection::new(strict, setup.cache.clone(), Some(HOST), PORT);
    let mut server2 =
        TestServer::new(setup.cert.clone(), ServerOptions::default()).sharing_sessions(&server);
    connect(&mut second, &mut server2).unwrap();

    assert_eq!(
        events.count(|e| matches!(e, Event::ResumptionOffered { .. })),
        0
    );
    assert!(server2.received.contains(&MessageType::ClientKeyExchange));
}

#[test]
fn legacy_session_needs_endpoint_identification() {
    //! Without extended master secret and without identification nothing
    //! pins the server certificate, so the session is not offered.
    init_log();
    let setup = Setup::new(|b| b);
    let options = ServerOptions {
        extended_master_secret: false,
        ..Default::default()
    };

    let mut first = setup.client();
    let mut server = TestServer::new(setup.cert.clone(), options.clone());
    connect(&mut first, &mut server).unwrap();
    assert!(!first.session().unwrap().uses_extended_master_secret());

    let mut second = setup.client();
    let mut server2 = TestServer::new(setup.cert.clone(), options).sharing_sessions(&server);
    connect(&mut second, &mut server2).unwrap();

    assert_eq!(setup.offered(), 0);
    assert!(!second.session().unwrap().is_session_resumption());
}

#[test]
fn legacy_session_resumes_without_extended_master_secret() {
    //! With extended master secret switched off the legacy session resumes.
    init_log();
    let setup = Setup::new(|b| b.use_extended_master_secret(false));
    let options = ServerOptions {
        extended_master_secret: false,
        ..Default::default()
    };

    let mut first = setup.client();
    let mut server = TestServer::new(setup.cert.clone(), options.clone());
    connect(&mut first, &mut server).unwrap();

    let mut second = setup.client();
    let mut server2 = TestServer::new(setup.cert.clone(), options).sharing_sessions(&server);
    connect(&mut second, &mut server2).unwrap();

    assert_eq!(setup.offered(), 1);
    assert!(second.session().unwrap().is_session_resumption());
}

#[test]
fn resumed_with_other_cipher_suite() {
    //! The server may not change the suite of a resumed session.
    init_log();
    let suites = [
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    ];
    let setup = Setup::new(|b| b.cipher_suites(&suites));

    let mut first = setup.client();
    let mut server = TestServer::new(
        setup.cert.clone(),
        ServerOptions {
            suite: suites[0],
            ..Default::default()
        },
    );
    connect(&mut first, &mut server).unwrap();

    let mut second = setup.client();
    let mut server2 = TestServer::new(
        setup.cert.clone(),
        ServerOptions {
            suite: suites[1],
            ..Default::default()
        },
    )
    .sharing_sessions(&server);

    let err = connect(&mut second, &mut server2).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::UnexpectedMessage);
    assert_eq!(second.state(), ConnectionState::Closed);
}

#[test]
fn resumption_only() {
    //! With new sessions disabled a handshake needs something to resume.
    init_log();
    let setup = Setup::new(|b| b.enable_new_session(false));

    let mut client = setup.client();
    let err = client.begin_handshake().unwrap_err();
    assert!(matches!(
        err,
        Error::PolicyViolation {
            alert: AlertDescription::HandshakeFailure,
            ..
        }
    ));
}

#[test]
fn resumption_only_with_cached_session() {
    //! A cached session is offered alone and the server resumes it.
    init_log();
    let setup = Setup::new(|b| b);

    let mut first = setup.client();
    let mut server = TestServer::new(setup.cert.clone(), ServerOptions::default());
    connect(&mut first, &mut server).unwrap();

    let config = Arc::new(
        client_config(&[&setup.cert])
            .enable_new_session(false)
            .build()
            .unwrap(),
    );
    let mut second = Connection::new(config, setup.cache.clone(), Some(HOST), PORT);
    let mut server2 =
        TestServer::new(setup.cert.clone(), ServerOptions::default()).sharing_sessions(&server);
    connect(&mut second, &mut server2).unwrap();
    assert!(second.session().unwrap().is_session_resumption());

    // A server that will not resume is refused.
    let config = Arc::new(
        client_config(&[&setup.cert])
            .enable_new_session(false)
            .build()
            .unwrap(),
    );
    let mut third = Connection::new(config, setup.cache.clone(), Some(HOST), PORT);
    let mut server3 = TestServer::new(
        setup.cert.clone(),
        ServerOptions {
            resumption: false,
            ..Default::default()
        },
    );
    let err = connect(&mut third, &mut server3).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::HandshakeFailure);
}
