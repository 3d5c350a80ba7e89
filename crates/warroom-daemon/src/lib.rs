//! warroom-daemon - War Room workflow daemon.
//!
//! Process wiring around [`warroom_core`]: shared state, the command
//! protocol, a JSON-lines Unix-socket listener, and the periodic synthesis
//! refresh task. Transport stays deliberately thin: request parsing
//! beyond JSON-line framing, HTTP, and authentication are out of scope for
//! the engine's contract.

pub mod dispatch;
pub mod protocol;
pub mod server;
pub mod state;
