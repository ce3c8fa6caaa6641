#![deny(unsafe_code)]

/// Desktop shell for the agent chat: window root, backend wiring and startup config.
pub mod app;
/// Chat views over the session view-model.
pub mod chat;
