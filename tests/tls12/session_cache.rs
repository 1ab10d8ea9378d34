//! The session cache as seen by connections sharing it.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use timpl::{Connection, Event, SessionCache};

use crate::common::*;

#[test]
fn expired_session_is_not_resumed() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let events = Arc::new(Events::default());
    let config = Arc::new(
        client_config(&[&cert])
            .session_timeout(Duration::from_secs(1))
            .observer(events.clone())
            .build()
            .unwrap(),
    );
    let cache = Arc::new(SessionCache::from_config(&config));
    assert_eq!(cache.session_timeout(), Duration::from_secs(1));

    let mut client = Connection::new(config.clone(), cache.clone(), Some(HOST), PORT);
    let mut server = TestServer::new(cert.clone(), ServerOptions::default());
    connect(&mut client, &mut server).unwrap();
    let session = client.session().unwrap().clone();

    assert!(cache.get_at(&session.id(), SystemTime::now()).is_some());
    let later = SystemTime::now() + Duration::from_secs(2);
    assert!(cache.get_at(&session.id(), later).is_none());
    assert!(!session.is_rejoinable());
    assert!(cache.is_empty());

    events.clear();
    let mut next = Connection::new(config, cache, Some(HOST), PORT);
    let mut server2 = TestServer::new(cert, ServerOptions::default()).sharing_sessions(&server);
    connect(&mut next, &mut server2).unwrap();
    assert_eq!(
        events.count(|e| matches!(e, Event::ResumptionOffered { .. })),
        0
    );
    assert_ne!(next.session().unwrap().id(), session.id());
}

#[test]
fn invalidate_is_idempotent() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let config = Arc::new(client_config(&[&cert]).build().unwrap());
    let cache = Arc::new(SessionCache::from_config(&config));

    let mut client = Connection::new(config.clone(), cache.clone(), Some(HOST), PORT);
    let mut server = TestServer::new(cert.clone(), ServerOptions::default());
    connect(&mut client, &mut server).unwrap();
    let session = client.session().unwrap().clone();
    assert!(session.is_rejoinable());

    session.invalidate();
    session.invalidate();
    assert!(!session.is_rejoinable());
    assert!(cache.get(&session.id()).is_none());
    assert!(cache.get_by_host(HOST, PORT).is_none());

    // The established connection is not affected.
    client.send_application_data(b"still fine").unwrap();
    pump(&mut client, &mut server).unwrap();
    assert_eq!(server.application_data, vec![b"still fine".to_vec()]);
}

#[test]
fn sessions_are_kept_per_peer() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let config = Arc::new(client_config(&[&cert]).build().unwrap());
    let cache = Arc::new(SessionCache::from_config(&config));

    let mut ids = Vec::new();
    for port in [443, 8443] {
        let mut client = Connection::new(config.clone(), cache.clone(), Some(HOST), port);
        let mut server = TestServer::new(cert.clone(), ServerOptions::default());
        connect(&mut client, &mut server).unwrap();
        ids.push(client.session().unwrap().id());
    }

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get_by_host(HOST, 443).unwrap().id(), ids[0]);
    assert_eq!(cache.get_by_host(HOST, 8443).unwrap().id(), ids[1]);
    let mut cached = cache.ids();
    cached.sort_by_key(|id| id.to_vec());
    ids.sort_by_key(|id| id.to_vec());
    assert_eq!(cached, ids);
}

#[test]
fn capacity_evicts_oldest_peer() {
    init_log();
    let cert = ecdsa_cert(HOST);
    let config = Arc::new(client_config(&[&cert]).session_cache_size(1).build().unwrap());
    let cache = Arc::new(SessionCache::from_config(&config));

    for port in [443, 8443] {
        let mut client = Connection::new(config.clone(), cache.clone(), Some(HOST), port);
        let mut server = TestServer::new(cert.clone(), ServerOptions::default());
        connect(&mut client, &mut server).unwrap();
    }

    assert_eq!(cache.len(), 1);
    assert!(cache.get_by_host(HOST, 443).is_none());
    assert!(cache.get_by_host(HOST, 8443).is_some());
}

#[test]
fn no_peer_host_no_resumption() {
    //! Without a peer host there is nothing to look a session up by.
    init_log();
    let cert = ecdsa_cert(HOST);
    let events = Arc::new(Events::default());
    let config = Arc::new(
        client_config(&[&cert])
            .observer(events.clone())
            .build()
            .unwrap(),
    );
    let cache = Arc::new(SessionCache::from_config(&config));

    for _ in 0..2 {
        let mut client = Connection::new(config.clone(), cache.clone(), None, 0);
        let mut server = TestServer::new(cert.clone(), ServerOptions::default());
        connect(&mut client, &mut server).unwrap();
    }

    assert_eq!(cache.len(), 2);
    assert_eq!(
        events.count(|e| matches!(e, Event::ResumptionOffered { .. })),
        0
    );
}

#[test]
fn negative_settings_are_rejected() {
    assert!(SessionCache::try_new(-1, 10).is_err());
    assert!(SessionCache::try_new(10, -1).is_err());
    let cache = SessionCache::try_new(0, 0).unwrap();
    assert_eq!(cache.cache_size(), 0);
    assert_eq!(cache.session_timeout(), Duration::ZERO);
}
