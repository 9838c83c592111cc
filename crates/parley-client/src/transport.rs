//! Transport abstraction for the streaming chat endpoint

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use parley_wire::{ChatRequest, Error as WireError, WireEvent, WireEventStream};

/// Transport opening one event stream per turn.
///
/// The returned stream yields any number of `Delta` events followed by
/// exactly one terminal event. Transport-level failures (connection refused,
/// non-2xx status, premature close) surface as a single `Error` event so the
/// orchestrator has one consumption path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and return the event stream
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<WireEventStream>;
}

/// HTTP transport speaking text/event-stream to the AI proxy
pub struct SseTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl SseTransport {
    /// Create a transport for the given endpoint URL
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Create a transport reusing an existing client
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The endpoint this transport posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<WireEventStream> {
        if cancel.is_cancelled() {
            return Err(WireError::Aborted.into());
        }

        tracing::debug!(endpoint = %self.endpoint, "opening chat stream");

        let builder = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request);

        let mut source = EventSource::new(builder)
            .map_err(|e| WireError::Sse(format!("failed to create event source: {e}")))?;

        let events = stream! {
            while let Some(item) = source.next().await {
                match item {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(message)) => {
                        match serde_json::from_str::<WireEvent>(&message.data) {
                            Ok(event) => {
                                let terminal = event.is_terminal();
                                yield event;
                                if terminal {
                                    source.close();
                                    break;
                                }
                            }
                            Err(error) => {
                                // Noisy providers happen; drop the record and
                                // keep reading.
                                tracing::warn!(
                                    data = %message.data,
                                    %error,
                                    "skipping malformed stream record"
                                );
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::Parser(error)) => {
                        // Malformed framing on one record does not doom the
                        // stream; later records may still be fine.
                        tracing::warn!(%error, "skipping malformed event-stream frame");
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        source.close();
                        yield WireEvent::Error {
                            error: "stream closed before completion".to_string(),
                        };
                        break;
                    }
                    Err(error) => {
                        source.close();
                        yield WireEvent::Error {
                            error: describe_transport_error(error),
                        };
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(events))
    }
}

fn describe_transport_error(error: reqwest_eventsource::Error) -> String {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, _) => {
            format!("server returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => format!("transport failure: {e}"),
        other => other.to_string(),
    }
}
