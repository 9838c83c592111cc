//! parley-wire: wire protocol for streaming negotiation-chat turns
//!
//! This crate holds the contract between the UI-facing client and the AI
//! proxy endpoint: the SSE wire events, the request body types, the
//! tag-aware splitter separating `<thinking>` narration from the structured
//! payload, and the resilient parser turning that payload into typed records.

pub mod error;
pub mod event;
pub mod payload;
pub mod record;
pub mod splitter;

pub use error::{Error, Result};
pub use event::{ChatMessage, ChatRequest, Persona, Role, WireEvent, WireEventStream};
pub use payload::{PayloadError, parse_records};
pub use record::Record;
pub use splitter::{SplitOutput, TagSplitter};
