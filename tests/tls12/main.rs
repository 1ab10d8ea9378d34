mod common;
mod connection;
mod handshake;
mod renegotiation;
mod resumption;
mod session_cache;
