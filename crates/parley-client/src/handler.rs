//! Callback contract between the orchestrator and the rendering layer

use crate::error::Error;
use parley_wire::Record;
use serde::{Deserialize, Serialize};

/// Final result of a completed turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Parsed records from the structured payload. Empty when the payload
    /// was unusable; the thinking text is still delivered in that case.
    pub records: Vec<Record>,
    /// Cumulative thinking narration captured during the turn
    pub thinking: String,
}

/// Receiver for turn callbacks.
///
/// All methods default to no-ops so a caller implements only what it
/// renders. Per turn: `on_delta` fires once per fragment in arrival order,
/// `on_thinking` fires with the cumulative narration (each call extends the
/// previous text, never rewrites it), and exactly one of
/// `on_complete`/`on_error` fires. A cancelled turn fires neither, and
/// nothing fires after the cancellation is observed.
pub trait TurnHandler: Send {
    /// Raw text fragment, exactly as it came off the wire
    fn on_delta(&mut self, _delta: &str) {}

    /// Cumulative thinking narration
    fn on_thinking(&mut self, _thinking: &str) {}

    /// Turn finished; fires at most once
    fn on_complete(&mut self, _outcome: TurnOutcome) {}

    /// Turn failed; fires at most once, and never after `on_complete`
    fn on_error(&mut self, _error: &Error) {}
}
