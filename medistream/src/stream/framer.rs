// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Stream framer
//
// Decodes raw chunks, buffers text until a delimiter arrives, and
// classifies every complete frame in arrival order. No frame boundary
// depends on a chunk boundary.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use tracing::debug;

use super::classifier::classify_frame;
use super::decoder::Utf8Decoder;
use super::types::{FrameProtocol, FramedItem, ParsedEvent};
use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    Open,
    /// Terminator seen. Further input is ignored.
    Terminated,
    /// `finish` called.
    Closed,
}

/// Turns a chunked byte stream into ParsedEvents.
///
/// One framer serves one request. Line breaks are normalized before
/// framing: `"\r\n"` becomes `"\n"`, including when the pair straddles a
/// chunk boundary.
#[derive(Debug)]
pub struct StreamFramer {
    protocol: FrameProtocol,
    decoder: Utf8Decoder,
    buffer: String,
    /// Offset in `buffer` before which no delimiter can start.
    scan_from: usize,
    pending_cr: bool,
    state: FramerState,
}

impl StreamFramer {
    pub fn new(protocol: FrameProtocol) -> Self {
        Self {
            protocol,
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            scan_from: 0,
            pending_cr: false,
            state: FramerState::Open,
        }
    }

    /// Feed one chunk. Returns the events of every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ParsedEvent> {
        if self.state != FramerState::Open {
            return Vec::new();
        }
        let text = self.decoder.decode(chunk);
        self.append(&text);
        self.drain_frames()
    }

    /// The transport closed. Flushes the decoder and discards whatever
    /// incomplete frame is left, returning it if it held anything but
    /// whitespace.
    pub fn finish(&mut self) -> Option<String> {
        if self.state != FramerState::Open {
            return None;
        }
        self.state = FramerState::Closed;

        let tail = self.decoder.finish();
        self.append(&tail);
        if self.pending_cr {
            self.buffer.push('\r');
            self.pending_cr = false;
        }

        let rest = std::mem::take(&mut self.buffer);
        self.scan_from = 0;
        if rest.trim().is_empty() {
            return None;
        }
        debug!(
            discarded_len = rest.len(),
            "transport closed with an incomplete frame, discarding"
        );
        Some(rest)
    }

    /// Whether the terminator has been seen.
    pub fn is_terminated(&self) -> bool {
        self.state == FramerState::Terminated
    }

    /// Length of the buffered, not yet delimited text.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn protocol(&self) -> &FrameProtocol {
        &self.protocol
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut piece = String::with_capacity(text.len() + 1);
        if self.pending_cr {
            piece.push('\r');
            self.pending_cr = false;
        }
        piece.push_str(text);
        // Hold a trailing '\r': its '\n' may be in the next chunk
        if piece.ends_with('\r') {
            piece.pop();
            self.pending_cr = true;
        }
        if piece.contains('\r') {
            piece = piece.replace("\r\n", "\n");
        }
        self.buffer.push_str(&piece);
    }

    fn drain_frames(&mut self) -> Vec<ParsedEvent> {
        let mut events = Vec::new();
        let delimiter_len = self.protocol.delimiter.len();
        let mut consumed = 0;
        let mut search_from = self.scan_from.min(self.buffer.len());

        while let Some(offset) = self.buffer[search_from..].find(self.protocol.delimiter.as_str()) {
            let end = search_from + offset;
            let event = classify_frame(&self.buffer[consumed..end], &self.protocol);
            consumed = end + delimiter_len;
            search_from = consumed;

            if let Some(event) = event {
                let is_terminator = event == ParsedEvent::Terminator;
                events.push(event);
                if is_terminator {
                    debug!(
                        ignored_len = self.buffer.len() - consumed,
                        "terminator received, ignoring further input"
                    );
                    self.state = FramerState::Terminated;
                    self.buffer.clear();
                    self.scan_from = 0;
                    return events;
                }
            }
        }

        self.buffer.drain(..consumed);

        // A delimiter may straddle the next chunk boundary
        let mut resume = self.buffer.len().saturating_sub(delimiter_len.saturating_sub(1));
        while !self.buffer.is_char_boundary(resume) {
            resume -= 1;
        }
        self.scan_from = resume;

        events
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new(FrameProtocol::default())
    }
}

// ---------------------------------------------------------------------------
// Stream adapter
// ---------------------------------------------------------------------------

struct FrameState<S> {
    input: S,
    framer: StreamFramer,
    ready: VecDeque<ParsedEvent>,
    input_done: bool,
}

/// Frame a transport byte stream into a stream of events.
///
/// Ends after the terminator, at end of input, or right after the first
/// `Failed` item.
pub fn frame_events<S>(input: S, protocol: FrameProtocol) -> impl Stream<Item = FramedItem>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let state = FrameState {
        input,
        framer: StreamFramer::new(protocol),
        ready: VecDeque::new(),
        input_done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.ready.pop_front() {
                return Some((FramedItem::Event(event), st));
            }
            if st.input_done || st.framer.is_terminated() {
                return None;
            }
            match st.input.next().await {
                Some(Ok(chunk)) => st.ready.extend(st.framer.push(&chunk)),
                Some(Err(e)) => {
                    st.input_done = true;
                    return Some((FramedItem::Failed(e), st));
                }
                None => {
                    st.input_done = true;
                    st.framer.finish();
                }
            }
        }
    })
}
