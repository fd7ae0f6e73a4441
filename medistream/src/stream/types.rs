// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Framing protocol, parsed events, and the source descriptors carried by
// "sources" control messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

// ---------------------------------------------------------------------------
// Framing protocol
// ---------------------------------------------------------------------------

pub const DEFAULT_FIELD_MARKER: &str = "data:";
pub const DEFAULT_TERMINATOR: &str = "[DONE]";
pub const DEFAULT_DELIMITER: &str = "\n\n";

/// Wire-level constants of the answer stream.
///
/// A frame is the text between two delimiters. Frames that start with the
/// field marker carry a payload; a payload equal to the terminator ends the
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameProtocol {
    pub field_marker: String,
    pub terminator: String,
    pub delimiter: String,
}

impl Default for FrameProtocol {
    fn default() -> Self {
        Self {
            field_marker: DEFAULT_FIELD_MARKER.to_string(),
            terminator: DEFAULT_TERMINATOR.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed events
// ---------------------------------------------------------------------------

/// One classified frame.
///
/// Serialized as `{"event": "token", "data": "..."}` for event dumps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ParsedEvent {
    /// A fragment of answer text.
    Token(String),
    /// Replacement list of reference sources for the answer.
    SourcesUpdate(Vec<Source>),
    /// The stream is over. Nothing after it is processed.
    Terminator,
    /// A frame without the field marker, kept verbatim.
    Unparseable(String),
}

impl ParsedEvent {
    /// Answer text carried by this event, if any.
    ///
    /// Unparseable frames count as answer text: downstream they are
    /// indistinguishable from tokens.
    pub fn text(&self) -> Option<&str> {
        match self {
            ParsedEvent::Token(text) | ParsedEvent::Unparseable(text) => Some(text),
            ParsedEvent::SourcesUpdate(_) | ParsedEvent::Terminator => None,
        }
    }
}

/// Item yielded by [`frame_events`](super::frame_events).
#[derive(Debug)]
pub enum FramedItem {
    Event(ParsedEvent),
    /// The byte stream failed. Always the last item.
    Failed(TransportError),
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A reference the answer was grounded on.
///
/// Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageRef>,
    #[serde(default, alias = "paragraph", skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Page of a source: a number, or a free-form label such as "iv" or "12-14".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(u64),
    Label(String),
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Number(n) => write!(f, "{n}"),
            PageRef::Label(label) => f.write_str(label),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title.as_deref().unwrap_or("Untitled source"))?;
        if let Some(page) = &self.page {
            write!(f, " (p. {page})")?;
        }
        if let Some(url) = &self.url {
            write!(f, " <{url}>")?;
        }
        Ok(())
    }
}
