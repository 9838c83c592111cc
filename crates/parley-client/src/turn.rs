//! Turn orchestration: one request, one stream, one outcome

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::Error,
    handler::{TurnHandler, TurnOutcome},
    transport::Transport,
};
use parley_wire::{
    ChatMessage, ChatRequest, Error as WireError, Persona, Record, TagSplitter, WireEvent,
    parse_records,
};

/// Request-scoped state for one turn
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    /// Ordered conversation history, oldest first
    pub messages: Vec<ChatMessage>,
    /// Persona name selecting a server-side preset
    pub persona: Option<String>,
    /// Inline persona configuration, passed through opaquely
    pub persona_config: Option<Persona>,
    /// Caller intent hint (e.g. "counter-offer", "summarize")
    pub intent: Option<String>,
}

impl TurnContext {
    /// Create a context from conversation history
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Set the persona name
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Set the inline persona configuration
    pub fn with_persona_config(mut self, config: Persona) -> Self {
        self.persona_config = Some(config);
        self
    }

    /// Set the intent hint
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    /// Append a message to the history
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    fn to_request(&self) -> ChatRequest {
        ChatRequest {
            messages: self.messages.clone(),
            persona: self.persona.clone(),
            persona_config: self.persona_config.clone(),
            intent: self.intent.clone(),
            stream: true,
        }
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// `on_complete` was delivered
    Completed,
    /// `on_error` was delivered
    Failed,
    /// The caller cancelled; no callback was delivered after the
    /// cancellation was observed
    Cancelled,
}

/// Runs one "ask the AI and stream structured results back" request.
///
/// The orchestrator owns the request lifecycle: it opens the transport,
/// routes deltas through the tag splitter, parses the payload at end of
/// stream, and reports everything through the caller's [`TurnHandler`]. One
/// invocation maps to exactly one request; there is no retry state, so a new
/// turn is simply a new call.
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
}

impl Orchestrator {
    /// Create an orchestrator over the given transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Run one turn to completion, cancellation, or failure.
    ///
    /// Cancellation is cooperative: the token is checked before the request
    /// is issued and between reads, and dropping the event stream closes the
    /// underlying connection.
    pub async fn run_turn(
        &self,
        context: &TurnContext,
        handler: &mut dyn TurnHandler,
        cancel: CancellationToken,
    ) -> TurnStatus {
        if cancel.is_cancelled() {
            return TurnStatus::Cancelled;
        }

        let turn_id = uuid::Uuid::new_v4();
        let request = context.to_request();
        tracing::debug!(%turn_id, messages = request.messages.len(), "starting turn");

        let mut events = match self.transport.open(&request, cancel.clone()).await {
            Ok(stream) => stream,
            Err(error) if error.is_cancellation() => return TurnStatus::Cancelled,
            Err(error) => {
                handler.on_error(&error);
                return TurnStatus::Failed;
            }
        };

        let mut splitter = TagSplitter::new();
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(%turn_id, "turn cancelled mid-stream");
                    return TurnStatus::Cancelled;
                }
                event = events.next() => event,
            };

            match event {
                Some(WireEvent::Delta { content }) => {
                    handler.on_delta(&content);
                    if splitter.push(&content) {
                        handler.on_thinking(splitter.thinking());
                    }
                }
                Some(WireEvent::Done { records, .. }) => {
                    let output = splitter.finish();
                    let records = match records {
                        Some(values) => values.into_iter().map(Record::from_value).collect(),
                        None => match parse_records(&output.payload) {
                            Ok(records) => records,
                            Err(error) => {
                                // The narration is still worth delivering;
                                // a broken payload downgrades, not fails.
                                tracing::warn!(%turn_id, %error, "completing with narration only");
                                Vec::new()
                            }
                        },
                    };
                    tracing::debug!(%turn_id, records = records.len(), "turn complete");
                    handler.on_complete(TurnOutcome {
                        records,
                        thinking: output.thinking,
                    });
                    return TurnStatus::Completed;
                }
                Some(WireEvent::Error { error }) => {
                    let error = Error::Wire(WireError::Server { message: error });
                    handler.on_error(&error);
                    return TurnStatus::Failed;
                }
                None => {
                    let error = Error::Wire(WireError::UnexpectedResponse(
                        "stream ended without a terminal event".to_string(),
                    ));
                    handler.on_error(&error);
                    return TurnStatus::Failed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use parley_wire::WireEventStream;
    use serde_json::json;

    /// Transport replaying a fixed event script
    struct ScriptedTransport {
        events: Vec<WireEvent>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn open(
            &self,
            _request: &ChatRequest,
            _cancel: CancellationToken,
        ) -> Result<WireEventStream> {
            Ok(Box::pin(tokio_stream::iter(self.events.clone())))
        }
    }

    /// Transport yielding one delta and then hanging forever
    struct StallingTransport;

    #[async_trait]
    impl Transport for StallingTransport {
        async fn open(
            &self,
            _request: &ChatRequest,
            _cancel: CancellationToken,
        ) -> Result<WireEventStream> {
            Ok(Box::pin(async_stream::stream! {
                yield WireEvent::Delta {
                    content: "<thinking>hold on".to_string(),
                };
                std::future::pending::<()>().await;
            }))
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Delta(String),
        Thinking(String),
        Complete(TurnOutcome),
        Error(String),
    }

    #[derive(Default)]
    struct RecordingHandler {
        calls: Vec<Call>,
    }

    impl TurnHandler for RecordingHandler {
        fn on_delta(&mut self, delta: &str) {
            self.calls.push(Call::Delta(delta.to_string()));
        }

        fn on_thinking(&mut self, thinking: &str) {
            self.calls.push(Call::Thinking(thinking.to_string()));
        }

        fn on_complete(&mut self, outcome: TurnOutcome) {
            self.calls.push(Call::Complete(outcome));
        }

        fn on_error(&mut self, error: &Error) {
            self.calls.push(Call::Error(error.to_string()));
        }
    }

    fn delta(content: &str) -> WireEvent {
        WireEvent::Delta {
            content: content.to_string(),
        }
    }

    fn done() -> WireEvent {
        WireEvent::Done {
            records: None,
            full_content: None,
        }
    }

    fn orchestrator(events: Vec<WireEvent>) -> Orchestrator {
        Orchestrator::new(Arc::new(ScriptedTransport { events }))
    }

    fn context() -> TurnContext {
        TurnContext::new(vec![ChatMessage::user("hello")])
    }

    #[tokio::test]
    async fn test_delta_delta_done_callback_order() {
        let orchestrator = orchestrator(vec![
            delta(r#"[{"type": "markdown", "#),
            delta(r#""content": "hi"}]"#),
            done(),
        ]);
        let mut handler = RecordingHandler::default();
        let status = orchestrator
            .run_turn(&context(), &mut handler, CancellationToken::new())
            .await;

        assert_eq!(status, TurnStatus::Completed);
        assert_eq!(handler.calls.len(), 3);
        assert!(matches!(handler.calls[0], Call::Delta(_)));
        assert!(matches!(handler.calls[1], Call::Delta(_)));
        let Call::Complete(outcome) = &handler.calls[2] else {
            panic!("expected complete last, got {:?}", handler.calls[2]);
        };
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].record_type(), Some("markdown"));
        assert_eq!(outcome.thinking, "");
    }

    #[tokio::test]
    async fn test_thinking_routed_and_monotonic() {
        let orchestrator = orchestrator(vec![
            delta("<thi"),
            delta("nking>step one</thi"),
            delta("nking>[]"),
            done(),
        ]);
        let mut handler = RecordingHandler::default();
        orchestrator
            .run_turn(&context(), &mut handler, CancellationToken::new())
            .await;

        let thinking: Vec<&String> = handler
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Thinking(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(thinking, vec!["step one"]);

        let Some(Call::Complete(outcome)) = handler.calls.last() else {
            panic!("expected complete");
        };
        assert_eq!(outcome.thinking, "step one");
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_error_event_reports_once_and_no_complete() {
        let orchestrator = orchestrator(vec![
            delta("partial"),
            WireEvent::Error {
                error: "model unavailable".to_string(),
            },
        ]);
        let mut handler = RecordingHandler::default();
        let status = orchestrator
            .run_turn(&context(), &mut handler, CancellationToken::new())
            .await;

        assert_eq!(status, TurnStatus::Failed);
        let errors = handler
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Error(_)))
            .count();
        assert_eq!(errors, 1);
        assert!(!handler.calls.iter().any(|c| matches!(c, Call::Complete(_))));
    }

    #[tokio::test]
    async fn test_parse_failure_downgrades_to_empty_complete() {
        let orchestrator = orchestrator(vec![
            delta("<thinking>reasoning</thinking>"),
            delta("this is not json"),
            done(),
        ]);
        let mut handler = RecordingHandler::default();
        let status = orchestrator
            .run_turn(&context(), &mut handler, CancellationToken::new())
            .await;

        assert_eq!(status, TurnStatus::Completed);
        let Some(Call::Complete(outcome)) = handler.calls.last() else {
            panic!("expected complete despite parse failure");
        };
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.thinking, "reasoning");
    }

    #[tokio::test]
    async fn test_done_with_preparsed_records_skips_payload_parse() {
        let orchestrator = orchestrator(vec![
            delta("anything"),
            WireEvent::Done {
                records: Some(vec![
                    json!({"type": "markdown", "content": "from server"}),
                    json!({"type": "exotic", "data": 9}),
                ]),
                full_content: None,
            },
        ]);
        let mut handler = RecordingHandler::default();
        orchestrator
            .run_turn(&context(), &mut handler, CancellationToken::new())
            .await;

        let Some(Call::Complete(outcome)) = handler.calls.last() else {
            panic!("expected complete");
        };
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].record_type(), Some("markdown"));
        assert_eq!(outcome.records[1].record_type(), Some("exotic"));
    }

    #[tokio::test]
    async fn test_cancel_before_start_suppresses_everything() {
        let orchestrator = orchestrator(vec![delta("x"), done()]);
        let mut handler = RecordingHandler::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let status = orchestrator.run_turn(&context(), &mut handler, cancel).await;
        assert_eq!(status, TurnStatus::Cancelled);
        assert!(handler.calls.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_suppresses_later_callbacks() {
        let orchestrator = Orchestrator::new(Arc::new(StallingTransport));
        let mut handler = RecordingHandler::default();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let status = orchestrator.run_turn(&context(), &mut handler, cancel).await;
        assert_eq!(status, TurnStatus::Cancelled);
        // The delta that arrived before the cancel was delivered; nothing
        // terminal ever was.
        assert_eq!(handler.calls.len(), 2);
        assert!(matches!(handler.calls[0], Call::Delta(_)));
        assert!(matches!(handler.calls[1], Call::Thinking(_)));
    }

    #[tokio::test]
    async fn test_stream_without_terminal_event_is_failure() {
        let orchestrator = orchestrator(vec![delta("a"), delta("b")]);
        let mut handler = RecordingHandler::default();
        let status = orchestrator
            .run_turn(&context(), &mut handler, CancellationToken::new())
            .await;

        assert_eq!(status, TurnStatus::Failed);
        assert!(matches!(handler.calls.last(), Some(Call::Error(_))));
    }

    #[test]
    fn test_context_builds_request() {
        let context = TurnContext::new(vec![ChatMessage::user("hi")])
            .with_persona("client")
            .with_persona_config(Persona {
                role: "buyer".to_string(),
                goal: "lower the price".to_string(),
                tone: "polite".to_string(),
            })
            .with_intent("negotiate");
        let request = context.to_request();
        assert!(request.stream);
        assert_eq!(request.persona.as_deref(), Some("client"));
        assert_eq!(request.intent.as_deref(), Some("negotiate"));
        assert_eq!(request.messages.len(), 1);
    }
}
