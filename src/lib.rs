//! timpl
//!
//! A Sans-IO client side handshake engine for TLS 1.0, 1.1 and 1.2.
//!
//! The crate takes care of everything between the record framing and the
//! application: the handshake message flow, session resumption, secure
//! renegotiation, server trust decisions and per-direction record
//! protection. Moving bytes is up to the caller.
//!
//! # Parts
//!
//! - [`Connection`] gates records by [`ConnectionState`], swaps ciphers on
//!   ChangeCipherSpec and enforces the sequence number limits.
//! - [`HandshakeEngine`] runs the handshake message flow, full or
//!   abbreviated, initial or renegotiated.
//! - [`SessionCache`] keeps sessions for resumption, shared between
//!   connections.
//! - [`TrustEvaluator`] validates the server chain and checks the endpoint
//!   identity.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use timpl::{Config, Connection, SessionCache};
//!
//! # fn send(_: &[u8]) {}
//! # fn recv() -> Vec<u8> { Vec::new() }
//! let config = Arc::new(Config::builder().server_names(&["example.com"]).build()?);
//! let cache = Arc::new(SessionCache::from_config(&config));
//!
//! let mut conn = Connection::new(config, cache, Some("example.com"), 443);
//! conn.begin_handshake()?;
//!
//! loop {
//!     while let Some(record) = conn.poll_record() {
//!         send(&record);
//!     }
//!     conn.handle_bytes(&recv())?;
//!     while let Some(data) = conn.poll_application_data() {
//!         println!("{}", String::from_utf8_lossy(&data));
//!     }
//! }
//! # Ok::<(), timpl::Error>(())
//! ```
//!
//! # Cryptography
//!
//! All primitives go through [`crypto::CryptoProvider`]. The default provider
//! in [`crypto::rust_crypto`] is built on RustCrypto crates.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
// #![deny(missing_docs)]

#[macro_use]
extern crate log;

#[macro_use]
mod util;

mod config;
pub use config::{ClientAuth, ClientCertificate, Config, ConfigBuilder};

mod constraints;
pub use constraints::AlgorithmConstraints;

mod connection;
pub use connection::{Connection, ConnectionState};

pub mod crypto;

mod error;
pub use error::{Alert, AlertDescription, AlertLevel, Error};

mod event;
pub use event::{Direction, Event, NoopObserver, Observer};

mod handshake;
pub use handshake::{DelegatedTask, HandshakeEngine, HandshakeStatus, Outgoing};

pub mod message;

mod session;
pub use session::{Session, SessionCache};

mod trust;
pub use trust::{check_identity, identities_equivalent};
pub use trust::{AnchoredValidator, CertValidator, TrustEvaluator};

pub mod types;
