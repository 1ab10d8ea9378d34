//! Wire codecs for TLS 1.0 to 1.2 handshake messages and records.
//!
//! All messages are owned values. Parsing is done with `nom` and each type
//! serializes itself into a `Vec<u8>`.

mod certificate;
mod certificate_request;
mod certificate_verify;
mod client_hello;
mod client_key_exchange;
mod digitally_signed;
mod extension;
pub mod extensions;
mod finished;
mod handshake;
mod id;
mod random;
mod record;
mod server_hello;
mod server_key_exchange;

pub use certificate::Certificate;
pub use certificate_request::CertificateRequest;
pub use certificate_verify::CertificateVerify;
pub use client_hello::ClientHello;
pub use client_key_exchange::ClientKeyExchange;
pub use digitally_signed::DigitallySigned;
pub use extension::{find_extension, Extension, ExtensionType};
pub use finished::Finished;
pub use handshake::{Body, Handshake, MessageType, ParseContext, MAX_HANDSHAKE_LEN};
pub use id::{InvalidSessionIdLength, SessionId, MAX_SESSION_ID_LEN};
pub use random::Random;
pub use record::{
    Record, CHANGE_CIPHER_SPEC, MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN, RECORD_HEADER_LEN,
};
pub use server_hello::ServerHello;
pub use server_key_exchange::{
    DhParams, EcdhParams, RsaParams, ServerKeyExchange, ServerKeyExchangeParams,
};
