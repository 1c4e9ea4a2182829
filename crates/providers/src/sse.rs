//! Shared SSE plumbing for provider adapters.
//!
//! The chat-completions endpoints stream `text/event-stream` bodies:
//! events delimited by `\n\n`, payloads on `data:` lines. Adapters supply
//! a parser closure that turns each payload into zero or more
//! [`StreamEvent`]s; this module handles buffering, draining, end-of-body
//! flush, and the fallback `Done` when a provider never sends one.

use crate::util::from_reqwest;
use ga_domain::error::Result;
use ga_domain::stream::{BoxStream, StreamEvent};

/// Pull complete `data:` payloads out of an SSE buffer.
///
/// Consumed bytes are drained in place; a trailing partial event stays in
/// the buffer for the next chunk. `event:`/`id:`/`retry:` lines are
/// ignored.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
    }

    payloads
}

/// Build a [`BoxStream`] of events from an SSE `reqwest::Response`.
///
/// The parser is `FnMut` so adapters can keep assembly state across
/// payloads (e.g. partial tool-call arguments).
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        for event in parse_data(&data) {
                            done_emitted |= matches!(&event, Ok(StreamEvent::Done { .. }));
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Body closed; flush whatever partial event remains.
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for event in parse_data(&data) {
                                done_emitted |= matches!(&event, Ok(StreamEvent::Done { .. }));
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
