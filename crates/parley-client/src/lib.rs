//! parley-client: streaming turn orchestration
//!
//! This crate runs one end-to-end "ask the AI and stream structured results
//! back" request: it opens the transport, splits the incoming stream into
//! narration and payload, parses the payload into records at end of stream,
//! and reports everything through caller-injected callbacks.

pub mod error;
pub mod handler;
pub mod store;
pub mod transport;
pub mod turn;

pub use error::{Error, Result};
pub use handler::{TurnHandler, TurnOutcome};
pub use store::{JsonFileStore, MemoryStore, SessionStore};
pub use transport::{SseTransport, Transport};
pub use turn::{Orchestrator, TurnContext, TurnStatus};
