// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Answer stream framing
//
// Responsibilities:
// - Decode UTF-8 incrementally across chunk boundaries
// - Buffer text until a frame delimiter has been seen
// - Classify each complete frame: token, sources update, terminator, or
//   unparseable text
// - Stop at the terminator; discard an unterminated trailing frame

mod classifier;
mod decoder;
mod framer;
mod types;

pub use classifier::classify_frame;
pub use decoder::Utf8Decoder;
pub use framer::{frame_events, StreamFramer};
pub use types::{
    FrameProtocol, FramedItem, PageRef, ParsedEvent, Source, DEFAULT_DELIMITER,
    DEFAULT_FIELD_MARKER, DEFAULT_TERMINATOR,
};

#[cfg(test)]
mod tests;
