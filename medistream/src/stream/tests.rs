// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Tests for answer stream framing
//
// Tests cover:
//  1. A frame split across chunks yields one token, then the terminator
//  2. Every split point of a wire string yields the same events
//  3. Multi-byte characters split across chunks survive intact
//  4. Whitespace-only frames are never surfaced
//  5. Sources messages: exactly one update, lenient field shapes
//  6. Malformed and non-marker frames degrade to text
//  7. Terminator stops all further processing
//  8. CRLF-delimited streams frame like LF-delimited ones
//  9. finish() discards an incomplete trailing frame
// 10. frame_events adapter: ordering, failure, early end

use super::*;
use crate::transport::TransportError;
use bytes::Bytes;
use futures_util::{stream, StreamExt};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Push every chunk through a fresh framer and collect all events.
fn frame_chunks(chunks: &[&[u8]]) -> Vec<ParsedEvent> {
    let mut framer = StreamFramer::default();
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(framer.push(chunk));
    }
    framer.finish();
    events
}

fn frame_whole(wire: &str) -> Vec<ParsedEvent> {
    frame_chunks(&[wire.as_bytes()])
}

fn token(text: &str) -> ParsedEvent {
    ParsedEvent::Token(text.to_string())
}

const WIRE: &str = concat!(
    "data: \"Type 1 \"\n\n",
    "data: Diabetes\n\n",
    "\n\n",
    "data: {\"type\":\"sources\",\"data\":[{\"title\":\"Guide\",\"page\":4}]}\n\n",
    "data: \"- **Cause:** auto immune\\n\"\n\n",
    "data: [DONE]\n\n",
);

fn wire_events() -> Vec<ParsedEvent> {
    vec![
        token("Type 1 "),
        token("Diabetes"),
        ParsedEvent::SourcesUpdate(vec![Source {
            title: Some("Guide".to_string()),
            page: Some(PageRef::Number(4)),
            ..Default::default()
        }]),
        token("- **Cause:** auto immune\n"),
        ParsedEvent::Terminator,
    ]
}

// ---------------------------------------------------------------------------
// 1. Split frame
// ---------------------------------------------------------------------------

#[test]
fn frame_split_across_chunks_yields_single_token() {
    let mut framer = StreamFramer::default();
    assert!(framer.push(b"data: Hel").is_empty());
    let events = framer.push(b"lo\n\ndata: [DONE]\n\n");
    assert_eq!(events, vec![token("Hello"), ParsedEvent::Terminator]);
    assert!(framer.is_terminated());
}

#[test]
fn delimiter_split_across_chunks() {
    let events = frame_chunks(&[b"data: a\n", b"\ndata: b\n", b"\n"]);
    assert_eq!(events, vec![token("a"), token("b")]);
}

// ---------------------------------------------------------------------------
// 2. No data loss across chunk splits
// ---------------------------------------------------------------------------

#[test]
fn whole_wire_string_yields_expected_events() {
    assert_eq!(frame_whole(WIRE), wire_events());
}

#[test]
fn every_two_way_split_yields_same_events() {
    let bytes = WIRE.as_bytes();
    for split in 0..=bytes.len() {
        let (a, b) = bytes.split_at(split);
        assert_eq!(frame_chunks(&[a, b]), wire_events(), "split at byte {split}");
    }
}

#[test]
fn byte_at_a_time_yields_same_events() {
    let chunks: Vec<&[u8]> = WIRE.as_bytes().chunks(1).collect();
    assert_eq!(frame_chunks(&chunks), wire_events());
}

// ---------------------------------------------------------------------------
// 3. Multi-byte characters
// ---------------------------------------------------------------------------

#[test]
fn multibyte_characters_split_at_every_byte() {
    let wire = "data: Glukose ≥ 7 mmol/L, 37 °C, Ärztin 😷\n\n";
    let expected = vec![token("Glukose ≥ 7 mmol/L, 37 °C, Ärztin 😷")];
    let bytes = wire.as_bytes();
    for split in 0..=bytes.len() {
        let (a, b) = bytes.split_at(split);
        assert_eq!(frame_chunks(&[a, b]), expected, "split at byte {split}");
    }
}

#[test]
fn invalid_utf8_decodes_to_replacement_character() {
    let events = frame_chunks(&[b"data: a\xFFb\n\n"]);
    assert_eq!(events, vec![token("a\u{FFFD}b")]);
}

// ---------------------------------------------------------------------------
// 4. Empty-frame suppression
// ---------------------------------------------------------------------------

#[test]
fn whitespace_only_frames_are_skipped() {
    let events = frame_whole("\n\n   \n\n\t\n\ndata: x\n\n");
    assert_eq!(events, vec![token("x")]);
}

#[test]
fn longer_delimiter_run_does_not_leak_line_breaks() {
    let events = frame_whole("data: a\n\n\n\ndata: b\n\n\ndata: c\n\n");
    assert_eq!(events, vec![token("a"), token("b"), token("c")]);
}

#[test]
fn whitespace_token_payload_is_kept() {
    // A JSON-encoded space is answer text, not an empty frame
    assert_eq!(frame_whole("data: \" \"\n\n"), vec![token(" ")]);
}

// ---------------------------------------------------------------------------
// 5. Sources
// ---------------------------------------------------------------------------

#[test]
fn sources_frame_yields_exactly_one_update_and_no_token() {
    let events = frame_whole("data: {\"type\":\"sources\",\"data\":[{\"title\":\"A\"}]}\n\n");
    assert_eq!(
        events,
        vec![ParsedEvent::SourcesUpdate(vec![Source {
            title: Some("A".to_string()),
            ..Default::default()
        }])]
    );
}

#[test]
fn sources_accept_page_labels_and_paragraph_alias() {
    let events = frame_whole(concat!(
        "data: {\"type\":\"sources\",\"data\":[",
        "{\"title\":\"A\",\"page\":\"iv\",\"paragraph\":\"text\",\"score\":0.9},",
        "{\"page\":null}",
        "]}\n\n"
    ));
    let ParsedEvent::SourcesUpdate(sources) = &events[0] else {
        panic!("expected sources update, got {events:?}");
    };
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].page, Some(PageRef::Label("iv".to_string())));
    assert_eq!(sources[0].snippet.as_deref(), Some("text"));
    assert_eq!(sources[1], Source::default());
}

#[test]
fn sources_with_wrong_data_shape_degrade_to_raw_token() {
    let payload = "{\"type\":\"sources\",\"data\":\"not a list\"}";
    let events = frame_whole(&format!("data: {payload}\n\n"));
    assert_eq!(events, vec![token(payload)]);
}

#[test]
fn empty_sources_list_is_an_update() {
    let events = frame_whole("data: {\"type\":\"sources\",\"data\":[]}\n\n");
    assert_eq!(events, vec![ParsedEvent::SourcesUpdate(Vec::new())]);
}

// ---------------------------------------------------------------------------
// 6. Malformed frames degrade to text
// ---------------------------------------------------------------------------

#[test]
fn json_string_payload_is_decoded() {
    assert_eq!(frame_whole("data: \"a\\nb\"\n\n"), vec![token("a\nb")]);
}

#[test]
fn other_json_shapes_keep_raw_payload() {
    assert_eq!(frame_whole("data: 42\n\n"), vec![token("42")]);
    assert_eq!(
        frame_whole("data: {\"type\":\"note\"}\n\n"),
        vec![token("{\"type\":\"note\"}")]
    );
}

#[test]
fn broken_json_keeps_raw_payload() {
    assert_eq!(frame_whole("data: {\"type\":\n\n"), vec![token("{\"type\":")]);
}

#[test]
fn marker_without_space_is_accepted() {
    assert_eq!(frame_whole("data:plain\n\n"), vec![token("plain")]);
}

#[test]
fn frame_without_marker_is_unparseable_verbatim() {
    let events = frame_whole("event: ping\ndata: x\n\n");
    assert_eq!(
        events,
        vec![ParsedEvent::Unparseable("event: ping\ndata: x".to_string())]
    );
    assert_eq!(events[0].text(), Some("event: ping\ndata: x"));
}

#[test]
fn custom_protocol_is_honored() {
    let protocol = FrameProtocol {
        field_marker: "msg=".to_string(),
        terminator: "END".to_string(),
        delimiter: "\n---\n".to_string(),
    };
    let mut framer = StreamFramer::new(protocol);
    let events = framer.push(b"msg= one\n---\nmsg=END\n---\nmsg= two\n---\n");
    assert_eq!(events, vec![token("one"), ParsedEvent::Terminator]);
}

// ---------------------------------------------------------------------------
// 7. Terminator
// ---------------------------------------------------------------------------

#[test]
fn terminator_stops_processing() {
    let mut framer = StreamFramer::default();
    let events = framer.push(b"data: a\n\ndata:  [DONE] \n\ndata: b\n\n");
    assert_eq!(events, vec![token("a"), ParsedEvent::Terminator]);
    assert!(framer.push(b"data: c\n\n").is_empty());
    assert_eq!(framer.buffered_len(), 0);
    assert_eq!(framer.finish(), None);
}

#[test]
fn quoted_terminator_is_a_token() {
    assert_eq!(frame_whole("data: \"[DONE]\"\n\n"), vec![token("[DONE]")]);
}

// ---------------------------------------------------------------------------
// 8. CRLF
// ---------------------------------------------------------------------------

#[test]
fn crlf_stream_frames_like_lf_stream() {
    let crlf = WIRE.replace('\n', "\r\n");
    let bytes = crlf.as_bytes();
    for split in 0..=bytes.len() {
        let (a, b) = bytes.split_at(split);
        assert_eq!(frame_chunks(&[a, b]), wire_events(), "split at byte {split}");
    }
}

#[test]
fn lone_carriage_return_is_kept() {
    assert_eq!(frame_whole("data: a\rb\n\n"), vec![token("a\rb")]);
}

// ---------------------------------------------------------------------------
// 9. finish()
// ---------------------------------------------------------------------------

#[test]
fn finish_discards_incomplete_frame() {
    let mut framer = StreamFramer::default();
    assert_eq!(framer.push(b"data: a\n\ndata: partial"), vec![token("a")]);
    assert_eq!(framer.finish().as_deref(), Some("data: partial"));
    // Closed framers ignore input
    assert!(framer.push(b"\n\n").is_empty());
}

#[test]
fn finish_with_only_whitespace_left_returns_none() {
    let mut framer = StreamFramer::default();
    framer.push(b"data: a\n\n\n");
    assert_eq!(framer.finish(), None);
}

#[test]
fn finish_flushes_dangling_multibyte_sequence() {
    let mut framer = StreamFramer::default();
    framer.push(b"data: \xE2\x82");
    assert_eq!(framer.finish().as_deref(), Some("data: \u{FFFD}"));
}

// ---------------------------------------------------------------------------
// 10. frame_events adapter
// ---------------------------------------------------------------------------

fn byte_stream(
    items: Vec<Result<&'static str, TransportError>>,
) -> impl futures_util::Stream<Item = Result<Bytes, TransportError>> + Unpin {
    stream::iter(
        items
            .into_iter()
            .map(|item| item.map(|s| Bytes::from_static(s.as_bytes())))
            .collect::<Vec<_>>(),
    )
}

#[tokio::test]
async fn frame_events_yields_events_in_order_and_stops_at_terminator() {
    let input = byte_stream(vec![
        Ok("data: Hel"),
        Ok("lo\n\ndata: [DONE]\n\ndata: ignored\n\n"),
        Ok("data: also ignored\n\n"),
    ]);
    let items: Vec<FramedItem> = frame_events(input, FrameProtocol::default())
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], FramedItem::Event(e) if *e == token("Hello")));
    assert!(matches!(&items[1], FramedItem::Event(ParsedEvent::Terminator)));
}

#[tokio::test]
async fn frame_events_surfaces_failure_last() {
    let input = byte_stream(vec![
        Ok("data: a\n\ndata: b"),
        Err(TransportError::Transport("connection reset".to_string())),
        Ok("\n\n"),
    ]);
    let items: Vec<FramedItem> = frame_events(input, FrameProtocol::default())
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], FramedItem::Event(e) if *e == token("a")));
    assert!(matches!(&items[1], FramedItem::Failed(TransportError::Transport(_))));
}

#[tokio::test]
async fn frame_events_ends_at_end_of_input() {
    let input = byte_stream(vec![Ok("data: a\n\n"), Ok("data: unterminated")]);
    let items: Vec<FramedItem> = frame_events(input, FrameProtocol::default())
        .collect()
        .await;
    assert_eq!(items.len(), 1);
}

#[test]
fn parsed_events_serialize_as_tagged_json() {
    let json = serde_json::to_string(&token("hi")).unwrap();
    assert_eq!(json, r#"{"event":"token","data":"hi"}"#);
    let json = serde_json::to_string(&ParsedEvent::Terminator).unwrap();
    assert_eq!(json, r#"{"event":"terminator"}"#);
}
