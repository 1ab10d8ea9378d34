//! The connection coordinator.
//!
//! Sits between the record stream and the [`HandshakeEngine`]. It decides
//! which record types are legal in which [`ConnectionState`], applies record
//! protection per direction, swaps ciphers at ChangeCipherSpec and watches
//! the sequence numbers.
//!
//! Any fatal error sends an alert, invalidates the session and closes the
//! connection for good. Every call after that returns [`Error::Closed`].

mod authenticator;
mod state;

pub use state::ConnectionState;

use std::collections::VecDeque;
use std::sync::Arc;

use self::authenticator::Authenticator;
use crate::config::Config;
use crate::crypto::RecordCipher;
use crate::error::{Alert, AlertLevel};
use crate::event::{Direction, Event};
use crate::handshake::{DelegatedTask, HandshakeEngine, HandshakeStatus, Outgoing};
use crate::message::{Record, CHANGE_CIPHER_SPEC, MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN};
use crate::message::RECORD_HEADER_LEN;
use crate::session::{Session, SessionCache};
use crate::types::{ContentType, ProtocolVersion};
use crate::{AlertDescription, Error};

/// A client TLS connection without I/O.
///
/// Feed received bytes to [`handle_bytes`](Self::handle_bytes), send what
/// [`poll_record`](Self::poll_record) returns, and read plaintext from
/// [`poll_application_data`](Self::poll_application_data).
pub struct Connection {
    config: Arc<Config>,
    engine: HandshakeEngine,
    state: ConnectionState,

    read: Authenticator,
    write: Authenticator,

    /// Received bytes not yet framed into a record.
    incoming: Vec<u8>,

    /// Protected records ready for the wire.
    records: VecDeque<Vec<u8>>,

    /// Received plaintext.
    app_data: VecDeque<Vec<u8>>,

    /// Data that is sent before we are connected.
    queued_data: Vec<Vec<u8>>,

    /// No application record written under the current write cipher yet.
    first_app_output_record: bool,

    close_notify_received: bool,
    inbound_done: bool,
    outbound_done: bool,

    /// The fatal error that closed the connection.
    failure: Option<String>,
}

impl Connection {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<SessionCache>,
        peer_host: Option<&str>,
        peer_port: u16,
    ) -> Self {
        let engine = HandshakeEngine::new(config.clone(), cache, peer_host, peer_port);
        Connection {
            config,
            engine,
            state: ConnectionState::Start,
            read: Authenticator::null(),
            write: Authenticator::null(),
            incoming: Vec::new(),
            records: VecDeque::new(),
            app_data: VecDeque::new(),
            queued_data: Vec::new(),
            first_app_output_record: true,
            close_notify_received: false,
            inbound_done: false,
            outbound_done: false,
            failure: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session of the last completed handshake.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.engine.session()
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        match self.engine.status() {
            HandshakeStatus::NeedUnwrap if !self.records.is_empty() => HandshakeStatus::NeedWrap,
            status => status,
        }
    }

    pub fn is_secure_renegotiation(&self) -> bool {
        self.engine.is_secure_renegotiation()
    }

    /// Whether nothing has been written under the current write cipher.
    ///
    /// TLS 1.0 CBC suites split every later application record 1/n-1.
    pub fn is_first_app_output_record(&self) -> bool {
        self.first_app_output_record
    }

    /// Start the initial handshake, or renegotiate an established connection.
    ///
    /// Does nothing while a handshake is in progress. Renegotiation fails
    /// without closing the connection when the server does not support secure
    /// renegotiation and unsafe renegotiation is not allowed.
    pub fn begin_handshake(&mut self) -> Result<(), Error> {
        self.check_open()?;
        if self.state == ConnectionState::ApplicationData && !self.renegotiation_allowed() {
            return Err(Error::policy(
                AlertDescription::HandshakeFailure,
                "Insecure renegotiation is not allowed",
            ));
        }
        let result = self.start_handshake();
        self.guard(result)
    }

    /// Feed bytes received from the server.
    pub fn handle_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        self.check_open()?;
        self.incoming.extend_from_slice(data);

        loop {
            if self.incoming.len() < RECORD_HEADER_LEN {
                break;
            }
            let len = u16::from_be_bytes([self.incoming[3], self.incoming[4]]) as usize;
            if len > MAX_CIPHERTEXT_LEN {
                let err = Error::fatal(
                    AlertDescription::RecordOverflow,
                    format!("Record length {} exceeds the maximum", len),
                );
                return self.guard(Err(err));
            }
            if self.incoming.len() < RECORD_HEADER_LEN + len {
                break;
            }

            let bytes: Vec<u8> = self.incoming.drain(..RECORD_HEADER_LEN + len).collect();
            let record = match Record::parse(&bytes) {
                Ok((_, record)) => record,
                Err(e) => return self.guard(Err(e.into())),
            };
            self.dispatch(record)?;
        }

        Ok(())
    }

    /// Process one framed record.
    pub fn dispatch(&mut self, record: Record) -> Result<(), Error> {
        self.check_open()?;
        let result = self.dispatch_record(record);
        self.guard(result)
    }

    /// Next protected record to send.
    pub fn poll_record(&mut self) -> Option<Vec<u8>> {
        self.records.pop_front()
    }

    /// Next chunk of received application data.
    pub fn poll_application_data(&mut self) -> Option<Vec<u8>> {
        self.app_data.pop_front()
    }

    /// Send application data.
    ///
    /// Before the initial handshake completes the data is held back and sent
    /// once the connection is established.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.check_open()?;
        if self.outbound_done {
            return Err(Error::Closed("outbound closed".into()));
        }
        if matches!(
            self.state,
            ConnectionState::Start | ConnectionState::Handshaking
        ) {
            self.queued_data.push(data.to_vec());
            return Ok(());
        }
        let result = self.write_application_data(data);
        self.guard(result)
    }

    /// Take the pending delegated task, if any.
    pub fn delegated_task(&mut self) -> Option<DelegatedTask> {
        self.engine.delegated_task()
    }

    /// Report a task that has been run and continue the handshake.
    pub fn resume_task(&mut self, task: DelegatedTask) -> Result<(), Error> {
        self.check_open()?;
        let result = self.resume_handshake(task);
        self.guard(result)
    }

    /// The transport is done delivering data.
    ///
    /// Unless the server closed first with close_notify, this is a possible
    /// truncation attack and fails the connection.
    pub fn close_inbound(&mut self) -> Result<(), Error> {
        if self.inbound_done {
            return Ok(());
        }
        self.inbound_done = true;

        if self.state != ConnectionState::Start && !self.close_notify_received {
            let err = Error::fatal(
                AlertDescription::InternalError,
                "Inbound closed before receiving peer's close_notify: possible truncation attack?",
            );
            return self.guard(Err(err));
        }
        Ok(())
    }

    /// Send close_notify. Nothing more can be sent afterwards.
    pub fn close_outbound(&mut self) {
        if self.outbound_done {
            return;
        }
        self.outbound_done = true;

        if !matches!(
            self.state,
            ConnectionState::Start | ConnectionState::Error | ConnectionState::Closed
        ) {
            let alert = Alert::new(AlertLevel::Warning, AlertDescription::CloseNotify);
            if let Err(e) = self.send_alert(alert) {
                debug!("Failed to send close_notify: {}", e);
            }
        }

        if self.state != ConnectionState::Error {
            self.set_state(ConnectionState::Closed);
        }
    }

    fn start_handshake(&mut self) -> Result<(), Error> {
        match self.state {
            ConnectionState::Start => self.set_state(ConnectionState::Handshaking),
            ConnectionState::ApplicationData => {
                if !self.engine.is_secure_renegotiation() {
                    warn!("Using insecure renegotiation");
                }
                self.set_state(ConnectionState::Renegotiating);
            }
            ConnectionState::Handshaking | ConnectionState::Renegotiating => return Ok(()),
            ConnectionState::Error | ConnectionState::Closed => return Err(self.closed_error()),
        }
        self.engine.kickstart()?;
        self.flush_handshake()
    }

    fn resume_handshake(&mut self, task: DelegatedTask) -> Result<(), Error> {
        self.engine.resume(task)?;
        self.flush_handshake()?;
        self.check_handshake_complete()
    }

    fn dispatch_record(&mut self, record: Record) -> Result<(), Error> {
        let content_type = record.content_type;

        if self.state == ConnectionState::Start {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unexpected {} record in state {}", content_type, self.state),
            ));
        }
        if self.inbound_done {
            debug!("Discarding {} record, inbound is closed", content_type);
            return Ok(());
        }

        self.check_record_version(record.version)?;
        self.check_sequence_number(Direction::Read, content_type)?;

        let fragment = self
            .read
            .decrypt(content_type, record.version, &record.fragment)
            .map_err(|e| {
                if content_type == ContentType::Handshake {
                    Error::crypto(
                        AlertDescription::HandshakeFailure,
                        format!("Invalid handshake record: {}", e),
                    )
                } else {
                    Error::BadRecordMac(e)
                }
            })?;

        if fragment.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::fatal(
                AlertDescription::RecordOverflow,
                format!("Plaintext of {} bytes exceeds the maximum", fragment.len()),
            ));
        }

        match content_type {
            ContentType::Handshake => self.handshake_record(&fragment),
            ContentType::ChangeCipherSpec => self.change_cipher_spec_record(&fragment),
            ContentType::Alert => self.alert_record(&fragment),
            ContentType::ApplicationData => self.application_data_record(fragment),
            ContentType::Unknown(value) => Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unknown record type {}", value),
            )),
        }
    }

    fn handshake_record(&mut self, fragment: &[u8]) -> Result<(), Error> {
        if self.state.is_terminal() {
            debug!("Discarding handshake record in state {}", self.state);
            return Ok(());
        }

        self.engine.handle_handshake_bytes(fragment)?;

        if self.state == ConnectionState::ApplicationData && self.engine.is_handshaking() {
            self.set_state(ConnectionState::Renegotiating);
        }
        if self.engine.take_invalidated() {
            debug!("Renegotiation request refused, connection unchanged");
        }

        self.flush_handshake()?;
        self.check_handshake_complete()
    }

    fn change_cipher_spec_record(&mut self, fragment: &[u8]) -> Result<(), Error> {
        if fragment != CHANGE_CIPHER_SPEC {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                "Malformed change cipher spec msg",
            ));
        }
        if !self.state.is_handshaking() {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unexpected change cipher spec in state {}", self.state),
            ));
        }

        let cipher = self.engine.receive_change_cipher_spec()?;
        self.change_read_cipher(cipher)
    }

    fn alert_record(&mut self, fragment: &[u8]) -> Result<(), Error> {
        let alert = match Alert::parse(fragment) {
            Ok((rest, alert)) if rest.is_empty() => alert,
            _ => {
                return Err(Error::fatal(
                    AlertDescription::DecodeError,
                    "Invalid alert message",
                ))
            }
        };
        self.emit(Event::AlertReceived(alert));

        if alert.level != AlertLevel::Warning {
            debug!("Received fatal alert: {}", alert.description);
            return Err(Error::PeerAlert(alert.description));
        }

        if alert.description == AlertDescription::CloseNotify {
            if self.state == ConnectionState::Handshaking {
                return Err(Error::fatal(
                    AlertDescription::UnexpectedMessage,
                    "Received close_notify during handshake",
                ));
            }
            debug!("Received close_notify");
            self.close_notify_received = true;
            self.inbound_done = true;
            self.close_outbound();
            return Ok(());
        }

        if self.engine.is_handshaking() {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("handshake alert: {}", alert.description),
            ));
        }

        debug!("Ignoring warning alert: {}", alert.description);
        Ok(())
    }

    fn application_data_record(&mut self, fragment: Vec<u8>) -> Result<(), Error> {
        if !self.state.accepts_application_data() {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unexpected application data in state {}", self.state),
            ));
        }
        if self.engine.expects_finished() {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                "Expecting finished message, received application data",
            ));
        }
        if !fragment.is_empty() {
            self.app_data.push_back(fragment);
        }
        Ok(())
    }

    fn check_handshake_complete(&mut self) -> Result<(), Error> {
        let Some(session) = self.engine.take_completed() else {
            return Ok(());
        };

        debug!(
            "Connection established: {} {}",
            session.protocol_version(),
            session.cipher_suite()
        );
        self.set_state(ConnectionState::ApplicationData);

        for data in std::mem::take(&mut self.queued_data) {
            self.write_application_data(&data)?;
        }
        Ok(())
    }

    /// Swap the read cipher. Only legal during a handshake.
    pub(crate) fn change_read_cipher(&mut self, cipher: Box<dyn RecordCipher>) -> Result<(), Error> {
        if !self.state.is_handshaking() {
            return Err(Error::InternalError(format!(
                "Read cipher change in state {}",
                self.state
            )));
        }
        let mut old = std::mem::replace(&mut self.read, Authenticator::new(cipher));
        old.dispose();

        trace!("Read cipher changed");
        self.emit(Event::CipherChanged(Direction::Read));
        Ok(())
    }

    /// Swap the write cipher. Only legal during a handshake.
    pub(crate) fn change_write_cipher(&mut self, cipher: Box<dyn RecordCipher>) -> Result<(), Error> {
        if !self.state.is_handshaking() {
            return Err(Error::InternalError(format!(
                "Write cipher change in state {}",
                self.state
            )));
        }
        let mut old = std::mem::replace(&mut self.write, Authenticator::new(cipher));
        old.dispose();
        self.first_app_output_record = true;

        trace!("Write cipher changed");
        self.emit(Event::CipherChanged(Direction::Write));
        Ok(())
    }

    /// Act on the sequence number of one direction before a record goes
    /// through it. Returns whether a renegotiation was requested.
    ///
    /// Close to wrapping the connection fails. A huge number outside a
    /// handshake asks for new keys, once.
    pub(crate) fn check_sequence_number(
        &mut self,
        direction: Direction,
        content_type: ContentType,
    ) -> Result<bool, Error> {
        let auth = match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        };
        if auth.is_null() {
            return Ok(false);
        }

        if auth.seq_num_overflow() {
            debug!("{} sequence number overflow, closing connection", direction);
            return Err(Error::ResourceExhaustion(format!(
                "{} sequence number overflow",
                direction
            )));
        }

        if auth.seq_num_is_huge()
            && content_type != ContentType::Handshake
            && self.state == ConnectionState::ApplicationData
        {
            debug!("{} sequence number is huge, requesting renegotiation", direction);
            self.emit(Event::SequenceRenegotiation(direction));
            if self.renegotiation_allowed() {
                self.start_handshake()?;
            } else {
                debug!("Renegotiation is not allowed, continuing with current keys");
            }
            return Ok(true);
        }

        Ok(false)
    }

    fn check_record_version(&self, version: ProtocolVersion) -> Result<(), Error> {
        match self.engine.negotiated_version() {
            Some(negotiated) if version != negotiated => Err(Error::fatal(
                AlertDescription::ProtocolVersion,
                format!(
                    "Received record version {}, negotiated {}",
                    version, negotiated
                ),
            )),
            None if matches!(version, ProtocolVersion::Unknown(_)) => Err(Error::fatal(
                AlertDescription::ProtocolVersion,
                format!("Unsupported record version {}", version),
            )),
            _ => Ok(()),
        }
    }

    fn renegotiation_allowed(&self) -> bool {
        self.engine.is_secure_renegotiation() || self.config.allow_unsafe_renegotiation()
    }

    fn flush_handshake(&mut self) -> Result<(), Error> {
        while let Some(output) = self.engine.poll_output() {
            match output {
                Outgoing::Handshake(bytes) => {
                    for chunk in bytes.chunks(MAX_PLAINTEXT_LEN) {
                        self.write_record(ContentType::Handshake, chunk)?;
                    }
                }
                Outgoing::ChangeCipherSpec(cipher) => {
                    self.write_record(ContentType::ChangeCipherSpec, &CHANGE_CIPHER_SPEC)?;
                    self.change_write_cipher(cipher)?;
                }
                Outgoing::Alert(alert) => self.send_alert(alert)?,
            }
        }
        Ok(())
    }

    fn write_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        let mut rest = data;
        // 1/n-1 record splitting against chosen plaintext attacks on the
        // TLS 1.0 CBC IV chain.
        if self.needs_payload_split() && rest.len() > 1 {
            self.write_record(ContentType::ApplicationData, &rest[..1])?;
            rest = &rest[1..];
        }
        for chunk in rest.chunks(MAX_PLAINTEXT_LEN) {
            self.write_record(ContentType::ApplicationData, chunk)?;
        }
        self.first_app_output_record = false;
        Ok(())
    }

    fn needs_payload_split(&self) -> bool {
        self.record_version() <= ProtocolVersion::TLS1_0
            && self.write.is_cbc_mode()
            && !self.first_app_output_record
    }

    fn write_record(&mut self, content_type: ContentType, fragment: &[u8]) -> Result<(), Error> {
        self.check_sequence_number(Direction::Write, content_type)?;
        self.protect(content_type, fragment)
    }

    fn protect(&mut self, content_type: ContentType, fragment: &[u8]) -> Result<(), Error> {
        let version = self.record_version();
        let protected = self
            .write
            .encrypt(content_type, version, fragment)
            .map_err(Error::InternalError)?;
        self.records
            .push_back(Record::new(content_type, version, protected).to_bytes());
        Ok(())
    }

    fn send_alert(&mut self, alert: Alert) -> Result<(), Error> {
        let mut body = Vec::with_capacity(2);
        alert.serialize(&mut body);
        self.protect(ContentType::Alert, &body)?;
        self.emit(Event::AlertSent(alert));
        Ok(())
    }

    /// Version on outgoing records. The lowest enabled version until the
    /// server has chosen.
    fn record_version(&self) -> ProtocolVersion {
        self.engine
            .negotiated_version()
            .unwrap_or_else(|| self.config.min_protocol_version())
    }

    fn guard<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            self.fatal(e);
        }
        result
    }

    fn fatal(&mut self, error: &Error) {
        if self.failure.is_some() || matches!(error, Error::Closed(_)) {
            return;
        }
        debug!("Fatal error in state {}: {}", self.state, error);

        if !matches!(error, Error::PeerAlert(_)) && !self.outbound_done {
            let alert = Alert::new(AlertLevel::Fatal, error.alert());
            if let Err(e) = self.send_alert(alert) {
                debug!("Failed to send fatal alert: {}", e);
            }
        }

        self.set_state(ConnectionState::Error);
        self.engine.fail();
        self.read.dispose();
        self.write.dispose();
        self.queued_data.clear();
        self.inbound_done = true;
        self.outbound_done = true;
        self.failure = Some(error.to_string());
        self.set_state(ConnectionState::Closed);
    }

    fn check_open(&self) -> Result<(), Error> {
        match &self.failure {
            Some(_) => Err(self.closed_error()),
            None => Ok(()),
        }
    }

    fn closed_error(&self) -> Error {
        Error::Closed(
            self.failure
                .clone()
                .unwrap_or_else(|| "connection closed".to_string()),
        )
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        trace!("{:?} -> {:?}", self.state, state);
        let from = std::mem::replace(&mut self.state, state);
        self.emit(Event::StateChanged { from, to: state });
    }

    fn emit(&self, event: Event) {
        self.config.observer().on_event(&event);
    }
}
