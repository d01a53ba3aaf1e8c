//! WebSocket Session Management
//!
//! - `protocol`: the JSON messages exchanged with the browser.
//! - `session`: connection lifecycle; one `Controller` per connection.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
