// TLS 1.0 - 1.2 client handshake (RFC 5246, RFC 2246 and RFC 4346).
//
// Full handshake:
//
//   ClientHello            -------->
//                                        ServerHello
//                                        Certificate*
//                                        ServerKeyExchange*
//                                        CertificateRequest*
//                          <--------     ServerHelloDone
//   Certificate*
//   ClientKeyExchange
//   CertificateVerify*
//   [ChangeCipherSpec]
//   Finished               -------->
//                                        [ChangeCipherSpec]
//                          <--------     Finished
//
// Abbreviated handshake, when the server accepts the offered session:
//
//   ClientHello            -------->
//                                        ServerHello
//                                        [ChangeCipherSpec]
//                          <--------     Finished
//   [ChangeCipherSpec]
//   Finished               -------->
//
// A HelloRequest from the server at any time after the first handshake
// starts the same flow again over the protected connection. Records are not
// handled here. The engine consumes handshake message bytes and produces
// handshake messages, cipher changes and alerts for the connection to frame.

mod certificate;
mod context;
mod hello;
mod key_exchange;
mod state;
mod task;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use zeroize::Zeroizing;

pub use task::DelegatedTask;

use self::context::HandshakeContext;
use self::state::State;
use crate::config::Config;
use crate::crypto::{extended_master_secret, key_block, master_secret, prf_hash, verify_data};
use crate::crypto::RecordCipher;
use crate::error::{Alert, AlertLevel};
use crate::event::Event;
use crate::message::{Body, Finished, Handshake, MessageType, ParseContext, MAX_HANDSHAKE_LEN};
use crate::session::{Session, SessionCache};
use crate::types::ProtocolVersion;
use crate::{AlertDescription, Error};

/// What the caller should do next to move the handshake along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// No handshake in progress.
    NotHandshaking,
    /// Waiting for more bytes from the server.
    NeedUnwrap,
    /// Output is queued, see [`HandshakeEngine::poll_output`].
    NeedWrap,
    /// A [`DelegatedTask`] must be run before anything else happens.
    NeedTask,
    /// A handshake just completed. Reported once.
    Finished,
}

/// Output of the engine, in the order it must reach the wire.
#[derive(Debug)]
pub enum Outgoing {
    /// One encoded handshake message, header included.
    Handshake(Vec<u8>),
    /// Send ChangeCipherSpec, then protect everything after it with the cipher.
    ChangeCipherSpec(Box<dyn RecordCipher>),
    Alert(Alert),
}

/// State that belongs to the connection rather than one handshake.
#[derive(Debug, Default)]
pub(crate) struct Carryover {
    /// Whether the server supports RFC 5746 secure renegotiation.
    pub secure_renegotiation: bool,
    /// verify_data of the last client Finished.
    pub client_verify_data: Vec<u8>,
    /// verify_data of the last server Finished.
    pub server_verify_data: Vec<u8>,
    pub peer_host: Option<String>,
    pub peer_port: u16,
}

/// Client side TLS 1.0 - 1.2 handshake state machine.
///
/// Feed it handshake message bytes with
/// [`handle_handshake_bytes`](Self::handle_handshake_bytes) and drain
/// [`poll_output`](Self::poll_output). The engine runs every handshake of a
/// connection, including renegotiations.
pub struct HandshakeEngine {
    config: Arc<Config>,
    cache: Arc<SessionCache>,

    /// Current state. Idle between handshakes.
    state: State,

    /// The attempt in progress.
    ctx: Option<HandshakeContext>,

    conn: Carryover,

    /// Session of the last completed handshake.
    session: Option<Arc<Session>>,

    /// Partial handshake message bytes.
    incoming: Vec<u8>,

    /// Whole messages that arrived while a task was outstanding.
    deferred: VecDeque<Vec<u8>>,

    outgoing: VecDeque<Outgoing>,

    /// Task not yet handed to the caller.
    task: Option<DelegatedTask>,

    /// A task was handed out and not yet given back.
    task_outstanding: bool,

    /// Session of a just completed handshake, until taken.
    completed: Option<Arc<Session>>,

    /// Set when a HelloRequest was refused.
    invalidated: bool,
}

impl HandshakeEngine {
    pub fn new(
        config: Arc<Config>,
        cache: Arc<SessionCache>,
        peer_host: Option<&str>,
        peer_port: u16,
    ) -> Self {
        HandshakeEngine {
            config,
            cache,
            state: State::Idle,
            ctx: None,
            conn: Carryover {
                peer_host: peer_host.map(str::to_string),
                peer_port,
                ..Default::default()
            },
            session: None,
            incoming: Vec::new(),
            deferred: VecDeque::new(),
            outgoing: VecDeque::new(),
            task: None,
            task_outstanding: false,
            completed: None,
            invalidated: false,
        }
    }

    /// Start a handshake by queueing a ClientHello.
    ///
    /// Does nothing while a handshake is already in progress.
    pub fn kickstart(&mut self) -> Result<(), Error> {
        if self.state.is_handshaking() {
            return Ok(());
        }

        let renegotiation = self.session.is_some();
        let (candidate, reserved) = hello::choose_session(
            &self.config,
            &self.cache,
            self.conn.peer_host.as_deref(),
            self.conn.peer_port,
        );

        let max_version = candidate
            .as_ref()
            .map(|s| s.protocol_version())
            .unwrap_or_else(|| self.config.max_protocol_version());

        let random = hello::random();
        let mut ctx = HandshakeContext::new(renegotiation, random.to_bytes(), max_version);
        ctx.candidate = candidate;
        ctx.reserved_server_certs = reserved;

        let client_hello = hello::client_hello(&self.config, &self.conn, &mut ctx, random)?;

        self.emit(Event::HandshakeStarted { renegotiation });
        if let Some(session) = &ctx.candidate {
            debug!("Try resuming session {:?}", session.id());
            self.emit(Event::ResumptionOffered {
                session_id: session.id(),
            });
        }

        self.ctx = Some(ctx);
        self.queue_handshake(Body::ClientHello(client_hello))?;
        self.set_state(State::AwaitServerHello);
        Ok(())
    }

    /// Feed handshake record content. Messages may span records and a record
    /// may hold several messages.
    pub fn handle_handshake_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        self.incoming.extend_from_slice(data);

        loop {
            if self.incoming.len() < 4 {
                break;
            }
            let (_, (_, len)) = Handshake::parse_header(&self.incoming)?;
            if len > MAX_HANDSHAKE_LEN {
                return Err(Error::fatal(
                    AlertDescription::DecodeError,
                    format!(
                        "The size of the handshake message ({}) exceeds the maximum allowed size ({})",
                        len, MAX_HANDSHAKE_LEN
                    ),
                ));
            }
            if self.incoming.len() < 4 + len {
                break;
            }

            let message: Vec<u8> = self.incoming.drain(..4 + len).collect();
            if self.task_outstanding {
                self.deferred.push_back(message);
            } else {
                self.process_message(&message)?;
            }
        }

        Ok(())
    }

    /// The server's ChangeCipherSpec arrived.
    ///
    /// Returns the cipher that protects everything the server sends next.
    pub fn receive_change_cipher_spec(&mut self) -> Result<Box<dyn RecordCipher>, Error> {
        if self.state != State::AwaitChangeCipherSpec || self.task_outstanding {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                format!("Unexpected ChangeCipherSpec in state {}", self.state.name()),
            ));
        }
        if !self.incoming.is_empty() {
            return Err(Error::fatal(
                AlertDescription::UnexpectedMessage,
                "ChangeCipherSpec inside a handshake message",
            ));
        }

        let cipher = self
            .ctx_mut()?
            .read_cipher
            .take()
            .ok_or_else(|| Error::InternalError("No pending read cipher".into()))?;
        self.set_state(State::AwaitFinished);
        Ok(cipher)
    }

    pub fn poll_output(&mut self) -> Option<Outgoing> {
        self.outgoing.pop_front()
    }

    pub fn status(&self) -> HandshakeStatus {
        if self.task_outstanding {
            HandshakeStatus::NeedTask
        } else if !self.outgoing.is_empty() {
            HandshakeStatus::NeedWrap
        } else if self.completed.is_some() {
            HandshakeStatus::Finished
        } else if self.state.is_handshaking() {
            HandshakeStatus::NeedUnwrap
        } else {
            HandshakeStatus::NotHandshaking
        }
    }

    /// Take the pending task, if any. Each task is handed out once.
    pub fn delegated_task(&mut self) -> Option<DelegatedTask> {
        self.task.take()
    }

    /// Give back a task that has been run and continue the handshake.
    pub fn resume(&mut self, task: DelegatedTask) -> Result<(), Error> {
        if !self.task_outstanding || self.task.is_some() {
            return Err(Error::InternalError("No delegated task outstanding".into()));
        }
        self.task_outstanding = false;

        let trusted = task.into_result()?;
        debug!("Server chain trusted, {} certificate(s)", trusted.len());

        while let Some(message) = self.deferred.pop_front() {
            if self.task_outstanding {
                self.deferred.push_front(message);
                break;
            }
            self.process_message(&message)?;
        }
        Ok(())
    }

    /// Session of a handshake that completed since the last call.
    pub fn take_completed(&mut self) -> Option<Arc<Session>> {
        self.completed.take()
    }

    /// Whether a HelloRequest was refused since the last call.
    pub(crate) fn take_invalidated(&mut self) -> bool {
        std::mem::take(&mut self.invalidated)
    }

    /// Session of the last completed handshake.
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn is_handshaking(&self) -> bool {
        self.state.is_handshaking()
    }

    pub fn is_secure_renegotiation(&self) -> bool {
        self.conn.secure_renegotiation
    }

    /// Version of the handshake in progress, else of the current session.
    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.ctx
            .as_ref()
            .and_then(|c| c.version)
            .or_else(|| self.session.as_ref().map(|s| s.protocol_version()))
    }

    /// True between the server's ChangeCipherSpec and its Finished.
    pub fn expects_finished(&self) -> bool {
        self.state == State::AwaitFinished
    }

    /// Whether the server's ChangeCipherSpec is the next legal message.
    pub fn expects_change_cipher_spec(&self) -> bool {
        self.state == State::AwaitChangeCipherSpec
    }

    /// Abandon the handshake after a fatal error.
    ///
    /// The current session and the resumption candidate are invalidated.
    pub fn fail(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Some(candidate) = ctx.candidate.as_ref().filter(|_| ctx.resuming) {
                candidate.invalidate();
            }
            ctx.dispose();
        }
        if let Some(session) = &self.session {
            session.invalidate();
        }
        self.state = State::Idle;
        self.incoming.clear();
        self.deferred.clear();
        self.outgoing.clear();
        self.task = None;
        self.task_outstanding = false;
        self.completed = None;
    }

    fn process_message(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let (_, (msg_type, _)) = Handshake::parse_header(bytes)?;

        if msg_type == MessageType::HelloRequest {
            Handshake::parse(bytes, &ParseContext::default())?;
            return self.hello_request();
        }

        self.state.check(msg_type)?;

        let ctx = self.ctx_mut()?;
        let parse_ctx = ParseContext {
            version: ctx.version(),
            key_exchange: ctx.key_exchange_algorithm(),
        };
        let (_, handshake) = Handshake::parse(bytes, &parse_ctx)?;

        // Finished is checked against the transcript without itself.
        if msg_type != MessageType::Finished {
            ctx.transcript.update(bytes);
        }

        trace!("Received {} in state {}", msg_type, self.state.name());
        self.emit(Event::MessageReceived(msg_type));

        let next = match handshake.body {
            Body::ServerHello(m) => self.server_hello(m)?,
            Body::Certificate(m) => self.certificate(m)?,
            Body::ServerKeyExchange(m) => {
                let config = self.config.clone();
                key_exchange::process_server_key_exchange(&config, self.ctx_mut()?, m)?;
                State::AwaitCertificateRequest
            }
            Body::CertificateRequest(m) => {
                let config = self.config.clone();
                certificate::process_certificate_request(&config, self.ctx_mut()?, m)?;
                State::AwaitServerHelloDone
            }
            Body::ServerHelloDone => self.server_hello_done()?,
            Body::Finished(m) => self.finished(m, bytes)?,
            _ => unreachable!("{} passed the state check", msg_type),
        };

        self.set_state(next);
        Ok(())
    }

    fn hello_request(&mut self) -> Result<(), Error> {
        self.emit(Event::MessageReceived(MessageType::HelloRequest));

        if self.state.is_handshaking() || self.session.is_none() {
            debug!("Ignoring HelloRequest, no established session to renegotiate");
            return Ok(());
        }

        if !self.conn.secure_renegotiation && !self.config.allow_unsafe_renegotiation() {
            debug!("Refusing insecure renegotiation");
            let alert = Alert::new(AlertLevel::Warning, AlertDescription::NoRenegotiation);
            self.outgoing.push_back(Outgoing::Alert(alert));
            self.invalidated = true;
            self.emit(Event::RenegotiationRefused);
            return Ok(());
        }

        if !self.conn.secure_renegotiation {
            warn!("Continue with insecure renegotiation");
        }
        self.kickstart()
    }

    fn server_hello(&mut self, message: crate::message::ServerHello) -> Result<State, Error> {
        let config = self.config.clone();
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| Error::InternalError("No handshake in progress".into()))?;
        hello::process_server_hello(&config, &mut self.conn, ctx, message)?;

        let suite = ctx.suite()?;
        let version = ctx.version();
        let session_id = ctx.session.id;

        if ctx.resuming {
            derive_ciphers(&config, ctx)?;
            debug!("Resuming session {:?} with {} {}", session_id, version, suite);
            self.emit(Event::SessionResumed { session_id });
            return Ok(State::AwaitChangeCipherSpec);
        }

        let anonymous = ctx
            .key_exchange_algorithm()
            .map_or(false, |kx| kx.is_anonymous());

        debug!("New session {:?} with {} {}", session_id, version, suite);
        self.emit(Event::NewSession {
            session_id,
            cipher_suite: suite,
            version,
        });

        Ok(if anonymous {
            State::AwaitServerKeyExchange
        } else {
            State::AwaitCertificate
        })
    }

    fn certificate(&mut self, message: crate::message::Certificate) -> Result<State, Error> {
        let config = self.config.clone();
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| Error::InternalError("No handshake in progress".into()))?;
        let next = certificate::process_certificate(&config, ctx, message)?;

        let kx = ctx
            .key_exchange_algorithm()
            .ok_or_else(|| Error::InternalError("No key exchange negotiated".into()))?;
        let auth_type = certificate::auth_type(kx);
        let evaluator = certificate::trust_evaluator(&config);

        if config.delegate_trust_checks() {
            trace!("Delegating trust check for {}", auth_type);
            self.task = Some(DelegatedTask::trust_check(
                evaluator,
                ctx.session.peer_certificates.clone(),
                auth_type,
                ctx.requested_server_names.clone(),
                self.conn.peer_host.clone(),
            ));
            self.task_outstanding = true;
        } else {
            let trusted = evaluator.evaluate(
                &ctx.session.peer_certificates,
                auth_type,
                &ctx.requested_server_names,
                self.conn.peer_host.as_deref(),
            )?;
            debug!("Server chain trusted, {} certificate(s)", trusted.len());
        }

        Ok(next)
    }

    fn server_hello_done(&mut self) -> Result<State, Error> {
        let config = self.config.clone();

        let signing_key = if self.ctx_mut()?.cert_request.is_some() {
            let (cert, key) = certificate::client_certificate(&config, self.ctx_mut()?)?;
            self.queue_handshake(Body::Certificate(cert))?;
            key
        } else {
            None
        };

        let (cke, premaster) = key_exchange::client_key_exchange(&config, self.ctx_mut()?)?;
        self.queue_handshake(Body::ClientKeyExchange(cke))?;

        let ctx = self.ctx_mut()?;
        derive_master_secret(&config, ctx, &premaster)?;
        derive_ciphers(&config, ctx)?;

        if let Some(mut key) = signing_key {
            let verify = certificate::certificate_verify(self.ctx_mut()?, key.as_mut())?;
            self.queue_handshake(Body::CertificateVerify(verify))?;
        }

        self.send_change_cipher_spec_and_finished()?;
        Ok(State::AwaitChangeCipherSpec)
    }

    fn finished(&mut self, message: Finished, bytes: &[u8]) -> Result<State, Error> {
        let config = self.config.clone();
        let ctx = self.ctx_mut()?;

        let expected = finished_verify_data(&config, ctx, false)?;
        if !message.verify(&expected) {
            return Err(Error::crypto(
                AlertDescription::IllegalParameter,
                "server 'finished' message doesn't verify",
            ));
        }
        ctx.transcript.update(bytes);
        let resuming = ctx.resuming;

        if self.conn.secure_renegotiation {
            self.conn.server_verify_data = message.verify_data;
        }

        // In the abbreviated handshake the client finishes last.
        if resuming {
            self.send_change_cipher_spec_and_finished()?;
        }

        self.complete()?;
        Ok(State::Idle)
    }

    fn send_change_cipher_spec_and_finished(&mut self) -> Result<(), Error> {
        let config = self.config.clone();
        let ctx = self.ctx_mut()?;

        let cipher = ctx
            .write_cipher
            .take()
            .ok_or_else(|| Error::InternalError("No pending write cipher".into()))?;
        let verify_data = finished_verify_data(&config, ctx, true)?;

        self.outgoing.push_back(Outgoing::ChangeCipherSpec(cipher));
        if self.conn.secure_renegotiation {
            self.conn.client_verify_data = verify_data.clone();
        }
        self.queue_handshake(Body::Finished(Finished::new(verify_data)))
    }

    fn complete(&mut self) -> Result<(), Error> {
        let mut ctx = self
            .ctx
            .take()
            .ok_or_else(|| Error::InternalError("No handshake in progress".into()))?;
        let now = SystemTime::now();

        let session = match ctx.candidate.take() {
            Some(candidate) if ctx.resuming => {
                candidate.touch(now);
                candidate
            }
            _ => {
                let pending = std::mem::take(&mut ctx.session);
                let session = Arc::new(pending.freeze(now).map_err(Error::InternalError)?);
                if session.is_rejoinable() {
                    self.cache.put(session.clone());
                    self.emit(Event::SessionCached {
                        session_id: session.id(),
                    });
                } else {
                    debug!("Didn't cache non-resumable client session");
                }
                session
            }
        };

        if ctx.renegotiation {
            session.set_session_resumption(false);
        }
        ctx.dispose();

        debug!(
            "Handshake complete: {} {} session {:?}",
            session.protocol_version(),
            session.cipher_suite(),
            session.id()
        );
        self.session = Some(session.clone());
        self.completed = Some(session);
        Ok(())
    }

    fn queue_handshake(&mut self, body: Body) -> Result<(), Error> {
        let ctx = self.ctx_mut()?;
        let message = Handshake::new(body);
        let bytes = message.to_bytes(ctx.version());
        ctx.transcript.update(&bytes);

        trace!("Send {} ({} bytes)", message.msg_type, bytes.len());
        self.emit(Event::MessageSent(message.msg_type));
        self.outgoing.push_back(Outgoing::Handshake(bytes));
        Ok(())
    }

    fn ctx_mut(&mut self) -> Result<&mut HandshakeContext, Error> {
        self.ctx
            .as_mut()
            .ok_or_else(|| Error::InternalError("No handshake in progress".into()))
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            trace!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn emit(&self, event: Event) {
        self.config.observer().on_event(&event);
    }
}

fn derive_master_secret(
    config: &Config,
    ctx: &mut HandshakeContext,
    premaster: &Zeroizing<Vec<u8>>,
) -> Result<(), Error> {
    let suite = ctx.suite()?;
    let hash = prf_hash(ctx.version(), suite);
    let provider = config.crypto_provider();

    let secret = if ctx.session.extended_master_secret {
        let session_hash = ctx
            .transcript
            .digest(provider.hash_provider, hash)
            .map_err(Error::InternalError)?;
        extended_master_secret(provider.prf_provider, premaster, &session_hash[..], hash)
    } else {
        master_secret(
            provider.prf_provider,
            premaster,
            &ctx.client_random,
            &ctx.server_random,
            hash,
        )
    }
    .map_err(Error::InternalError)?;

    ctx.session.master_secret = Some(secret);
    Ok(())
}

/// Expand the master secret into the pending ciphers of both directions.
fn derive_ciphers(config: &Config, ctx: &mut HandshakeContext) -> Result<(), Error> {
    let suite = ctx.suite()?;
    let version = ctx.version();
    let hash = prf_hash(version, suite);
    let provider = config.crypto_provider();

    let block = key_block(
        provider.prf_provider,
        ctx.master_secret()?,
        &ctx.client_random,
        &ctx.server_random,
        suite,
        hash,
    )
    .map_err(Error::InternalError)?;

    let factory = provider
        .find_cipher_suite(suite)
        .ok_or_else(|| Error::InternalError(format!("No record cipher for {}", suite)))?;

    let write = factory
        .create_cipher(
            version,
            block.client_mac_key(),
            block.client_key(),
            block.client_iv(),
        )
        .map_err(Error::InternalError)?;
    let read = factory
        .create_cipher(
            version,
            block.server_mac_key(),
            block.server_key(),
            block.server_iv(),
        )
        .map_err(Error::InternalError)?;

    ctx.write_cipher = Some(write);
    ctx.read_cipher = Some(read);
    Ok(())
}

fn finished_verify_data(
    config: &Config,
    ctx: &HandshakeContext,
    client: bool,
) -> Result<Vec<u8>, Error> {
    let suite = ctx.suite()?;
    let hash = prf_hash(ctx.version(), suite);
    let provider = config.crypto_provider();

    let digest = ctx
        .transcript
        .digest(provider.hash_provider, hash)
        .map_err(Error::InternalError)?;
    verify_data(
        provider.prf_provider,
        ctx.master_secret()?,
        client,
        &digest[..],
        hash,
    )
    .map_err(Error::InternalError)
}
