// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Frame classifier
//
// Maps one complete frame to at most one ParsedEvent. Classification never
// fails: anything that does not look like a control message is text.

use serde_json::Value;
use tracing::debug;

use super::types::{FrameProtocol, ParsedEvent, Source};

/// Classify a complete frame (delimiter already removed).
///
/// - whitespace-only frame -> `None`
/// - no field marker -> `Unparseable(frame)`
/// - terminator payload -> `Terminator`
/// - `{"type":"sources","data":[...]}` -> `SourcesUpdate`
/// - JSON string -> `Token(decoded string)`
/// - anything else -> `Token(raw payload)`
pub fn classify_frame(frame: &str, protocol: &FrameProtocol) -> Option<ParsedEvent> {
    if frame.trim().is_empty() {
        return None;
    }

    // A delimiter run longer than the delimiter leaves line breaks at the front
    let frame = frame.trim_start_matches(['\n', '\r']);

    let payload = match frame.strip_prefix(protocol.field_marker.as_str()) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => {
            debug!(frame_len = frame.len(), "frame without field marker");
            return Some(ParsedEvent::Unparseable(frame.to_string()));
        }
    };

    if payload.trim() == protocol.terminator {
        return Some(ParsedEvent::Terminator);
    }

    Some(classify_payload(payload))
}

fn classify_payload(payload: &str) -> ParsedEvent {
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => return ParsedEvent::Token(payload.to_string()),
    };

    match value {
        Value::String(text) => ParsedEvent::Token(text),
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("sources") => {
            let sources = map
                .get("data")
                .cloned()
                .map(serde_json::from_value::<Vec<Source>>);
            match sources {
                Some(Ok(sources)) => ParsedEvent::SourcesUpdate(sources),
                Some(Err(e)) => {
                    debug!(error = %e, "sources message with unexpected data shape");
                    ParsedEvent::Token(payload.to_string())
                }
                None => {
                    debug!("sources message without data");
                    ParsedEvent::Token(payload.to_string())
                }
            }
        }
        // Structured-looking literal content
        _ => ParsedEvent::Token(payload.to_string()),
    }
}
