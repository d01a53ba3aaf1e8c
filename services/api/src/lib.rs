//! JEDI API Library Crate
//!
//! Configuration, shared state, REST handlers, the WebSocket session and
//! routing for the JEDI web service. The `api` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
