#![deny(unsafe_code)]

//! HTTP bindings for the agent chat: the start/stop service endpoints, the
//! server-sent events channel and the layered client configuration.

pub mod config;
pub mod error;
pub mod http;
pub mod sse;

#[cfg(test)]
mod fake_server;

pub use config::{ClientConfig, ConfigError, ConfigResult};
pub use error::{TransportError, TransportResult};
pub use http::{HttpAgentService, server_message};
pub use sse::{SseEventChannel, decode_frame};
