//! Library crate for quiz-live-back, exposing modules for binaries and integration tests.

pub mod config;
/// Storage layer.
pub mod dao;
/// API payloads.
pub mod dto;
mod error;
pub mod oracle;
/// HTTP routing.
pub mod routes;
/// Business logic.
pub mod services;
/// Shared application state.
pub mod state;
