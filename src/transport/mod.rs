//! Inbound HTTP surface of the dispatcher and the client-side transports.

pub mod client;
pub mod http;
