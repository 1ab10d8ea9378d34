//! Record level behavior of an established or establishing connection.

use std::sync::Arc;

use timpl::message::Record;
use timpl::types::{ContentType, ProtocolVersion};
use timpl::{
    Alert, AlertDescription, AlertLevel, Connection, ConnectionState, Error, HandshakeStatus,
    SessionCache,
};

use crate::common::*;

fn setup() -> (Connection, TestServer, Arc<SessionCache>) {
    let cert = ecdsa_cert(HOST);
    let config = Arc::new(client_config(&[&cert]).build().unwrap());
    let cache = Arc::new(SessionCache::from_config(&config));
    let client = Connection::new(config, cache.clone(), Some(HOST), PORT);
    let server = TestServer::new(cert, ServerOptions::default());
    (client, server, cache)
}

fn established() -> (Connection, TestServer, Arc<SessionCache>) {
    let (mut client, mut server, cache) = setup();
    connect(&mut client, &mut server).unwrap();
    (client, server, cache)
}

/// Hand whatever the client has queued to the server.
fn flush(client: &mut Connection, server: &mut TestServer) {
    while let Some(record) = client.poll_record() {
        server.receive(&record);
    }
}

#[test]
fn data_before_handshake_is_held_back() {
    init_log();
    let (mut client, mut server, _) = setup();

    client.send_application_data(b"early").unwrap();
    assert_eq!(client.state(), ConnectionState::Start);
    assert!(client.poll_record().is_none());

    connect(&mut client, &mut server).unwrap();
    assert_eq!(server.application_data, vec![b"early".to_vec()]);
}

#[test]
fn handshake_status() {
    init_log();
    let (mut client, mut server, _) = setup();
    assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);

    client.begin_handshake().unwrap();
    assert_eq!(client.state(), ConnectionState::Handshaking);
    assert_eq!(client.handshake_status(), HandshakeStatus::NeedWrap);

    flush(&mut client, &mut server);
    assert_eq!(client.handshake_status(), HandshakeStatus::NeedUnwrap);

    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.handshake_status(), HandshakeStatus::NotHandshaking);
}

#[test]
fn large_writes_are_fragmented() {
    init_log();
    let (mut client, mut server, _) = established();

    client.send_application_data(&vec![7; 40_000]).unwrap();
    pump(&mut client, &mut server).unwrap();

    let sizes: Vec<usize> = server.application_data.iter().map(|d| d.len()).collect();
    assert_eq!(sizes, vec![16_384, 16_384, 7_232]);
}

#[test]
fn server_close_notify() {
    init_log();
    let (mut client, mut server, _) = established();

    server.send_alert(AlertLevel::Warning, AlertDescription::CloseNotify);
    pump(&mut client, &mut server).unwrap();

    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(
        server.alerts,
        vec![Alert::new(AlertLevel::Warning, AlertDescription::CloseNotify)]
    );
    client.close_inbound().unwrap();
    assert!(matches!(
        client.send_application_data(b"late"),
        Err(Error::Closed(_))
    ));
    // A clean close keeps the session.
    assert!(client.session().unwrap().is_rejoinable());
}

#[test]
fn client_close_outbound() {
    //! After close_notify nothing more is written, but data from the server
    //! still arrives.
    init_log();
    let (mut client, mut server, _) = established();

    client.close_outbound();
    assert_eq!(client.state(), ConnectionState::Closed);
    flush(&mut client, &mut server);
    assert_eq!(
        server.alerts,
        vec![Alert::new(AlertLevel::Warning, AlertDescription::CloseNotify)]
    );
    assert!(client.send_application_data(b"late").is_err());

    server.send_application_data(b"bye");
    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.poll_application_data(), Some(b"bye".to_vec()));
}

#[test]
fn truncation() {
    //! Transport EOF without close_notify.
    init_log();
    let (mut client, mut server, cache) = established();
    let session = client.session().unwrap().clone();

    let err = client.close_inbound().unwrap_err();
    assert_eq!(err.alert(), AlertDescription::InternalError);
    flush(&mut client, &mut server);
    assert_eq!(
        server.alerts,
        vec![Alert::new(AlertLevel::Fatal, AlertDescription::InternalError)]
    );
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(!session.is_rejoinable());
    assert!(cache.get(&session.id()).is_none());
}

#[test]
fn close_inbound_before_handshake() {
    let (mut client, _, _) = setup();
    client.close_inbound().unwrap();
    assert!(client.poll_record().is_none());
}

#[test]
fn fatal_alert_from_server() {
    init_log();
    let (mut client, mut server, cache) = established();
    let session = client.session().unwrap().clone();

    server.send_alert(AlertLevel::Fatal, AlertDescription::HandshakeFailure);
    let err = pump(&mut client, &mut server).unwrap_err();

    assert!(matches!(
        err,
        Error::PeerAlert(AlertDescription::HandshakeFailure)
    ));
    // No alert in reply to a fatal alert.
    assert!(server.alerts.is_empty());
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(cache.get(&session.id()).is_none());
    assert!(matches!(
        client.send_application_data(b"x"),
        Err(Error::Closed(_))
    ));
}

#[test]
fn warning_alert_is_ignored() {
    init_log();
    let (mut client, mut server, _) = established();

    server.send_alert(AlertLevel::Warning, AlertDescription::UserCanceled);
    server.send_application_data(b"still here");
    pump(&mut client, &mut server).unwrap();

    assert_eq!(client.state(), ConnectionState::ApplicationData);
    assert_eq!(client.poll_application_data(), Some(b"still here".to_vec()));
}

#[test]
fn close_notify_during_handshake() {
    init_log();
    let (mut client, mut server, _) = setup();
    client.begin_handshake().unwrap();

    server.send_alert(AlertLevel::Warning, AlertDescription::CloseNotify);
    let err = pump(&mut client, &mut server).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::UnexpectedMessage);
}

#[test]
fn record_before_handshake() {
    init_log();
    let (mut client, mut server, _) = setup();

    server.send_application_data(b"hi");
    let record = server.take_output().remove(0);
    let err = client.handle_bytes(&record).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::UnexpectedMessage);
}

#[test]
fn wrong_record_version() {
    init_log();
    let (mut client, _, _) = established();

    let record = Record::new(
        ContentType::ApplicationData,
        ProtocolVersion::TLS1_0,
        vec![0; 32],
    );
    let err = client.handle_bytes(&record.to_bytes()).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::ProtocolVersion);
}

#[test]
fn tampered_record() {
    init_log();
    let (mut client, mut server, _) = established();

    server.send_application_data(b"secret");
    let mut record = server.take_output().remove(0);
    let last = record.len() - 1;
    record[last] ^= 0x01;

    let err = client.handle_bytes(&record).unwrap_err();
    assert!(matches!(err, Error::BadRecordMac(_)));
    flush(&mut client, &mut server);
    assert_eq!(
        server.alerts,
        vec![Alert::new(AlertLevel::Fatal, AlertDescription::BadRecordMac)]
    );
}

#[test]
fn oversized_record() {
    init_log();
    let (mut client, _, _) = established();

    let err = client.handle_bytes(&[23, 3, 3, 0x50, 0x00]).unwrap_err();
    assert_eq!(err.alert(), AlertDescription::RecordOverflow);
}

#[test]
fn records_split_across_reads() {
    init_log();
    let (mut client, mut server, _) = established();

    server.send_application_data(b"in pieces");
    let record = server.take_output().remove(0);
    let (head, tail) = record.split_at(3);

    client.handle_bytes(head).unwrap();
    assert_eq!(client.poll_application_data(), None);
    client.handle_bytes(tail).unwrap();
    assert_eq!(client.poll_application_data(), Some(b"in pieces".to_vec()));
}
