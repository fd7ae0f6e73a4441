// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Ingestion sessions
//
// One session per outstanding request: owns the framer and the accumulated
// answer, re-normalizes the answer as tokens arrive, and publishes the
// result to an observer. The registry enforces at most one live session
// per conversation.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{RenormalizePolicy, SessionConfig};
use crate::normalize::Normalizer;
use crate::stream::{FrameProtocol, ParsedEvent, Source, StreamFramer};
use crate::transport::TransportError;

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Receives the output of a session.
///
/// After `on_complete` or `on_failure` no further callbacks are made, and
/// exactly one of the two is made per session.
pub trait AnswerObserver {
    /// The full normalized answer so far. Never empty.
    fn on_token(&mut self, normalized: &str);

    /// The current source list. Replaces any earlier list.
    fn on_sources(&mut self, sources: &[Source]);

    /// The answer ended normally.
    fn on_complete(&mut self) {}

    /// The answer ended abnormally. Text published so far stays valid.
    fn on_failure(&mut self, notice: &FailureNotice);
}

impl<T: AnswerObserver + ?Sized> AnswerObserver for &mut T {
    fn on_token(&mut self, normalized: &str) {
        (**self).on_token(normalized);
    }

    fn on_sources(&mut self, sources: &[Source]) {
        (**self).on_sources(sources);
    }

    fn on_complete(&mut self) {
        (**self).on_complete();
    }

    fn on_failure(&mut self, notice: &FailureNotice) {
        (**self).on_failure(notice);
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Why a session failed, as far as the end user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The answer stream broke off midway.
    Interrupted,
    /// The backend could not be reached at all.
    Unreachable,
    TimedOut,
    /// The backend declined to answer this question.
    Refused,
    /// The backend failed to handle the request.
    Rejected,
}

impl FailureKind {
    /// Fixed, non-technical text shown to the user.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::Interrupted => {
                "The answer was interrupted before it finished. Please try again."
            }
            FailureKind::Unreachable => {
                "The assistant could not be reached. Please check your connection and try again."
            }
            FailureKind::TimedOut => "The assistant took too long to respond. Please try again.",
            FailureKind::Refused => {
                "This question can't be answered here. Please rephrase it or ask something else."
            }
            FailureKind::Rejected => {
                "Something went wrong while processing your question. Please try again later."
            }
        }
    }

    /// Classify an error raised while opening the answer stream.
    pub fn from_open_error(err: &TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => FailureKind::TimedOut,
            TransportError::Transport(_) => FailureKind::Unreachable,
            TransportError::Status {
                status: 400,
                detail: Some(_),
            } => FailureKind::Refused,
            TransportError::Status { .. }
            | TransportError::InvalidHeader { .. }
            | TransportError::Decode(_) => FailureKind::Rejected,
        }
    }

    /// Classify an error raised while reading an open answer stream.
    pub fn from_read_error(err: &TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => FailureKind::TimedOut,
            _ => FailureKind::Interrupted,
        }
    }
}

/// Terminal failure of a session.
///
/// `cause` is for logs only; users see [`FailureNotice::message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub kind: FailureKind,
    pub cause: String,
}

impl FailureNotice {
    pub fn new(kind: FailureKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    /// The answer stream could not be opened.
    pub fn opening(err: &TransportError) -> Self {
        Self::new(FailureKind::from_open_error(err), err.to_string())
    }

    /// The answer stream failed after it was opened.
    pub fn reading(err: &TransportError) -> Self {
        Self::new(FailureKind::from_read_error(err), err.to_string())
    }

    pub fn message(&self) -> &'static str {
        self.kind.user_message()
    }
}

// ---------------------------------------------------------------------------
// IngestionSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// Terminator received.
    Completed,
    /// Transport closed without a terminator.
    Closed,
    Failed,
}

/// Summary of a finished session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub conversation_id: String,
    pub outcome: SessionState,
    /// Final normalized answer.
    pub answer: String,
    pub sources: Vec<Source>,
    /// Text events received, including empty ones.
    pub token_count: usize,
    pub failure: Option<FailureNotice>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Lifecycle of one request's answer.
pub struct IngestionSession<O: AnswerObserver> {
    conversation_id: String,
    framer: StreamFramer,
    normalizer: Arc<dyn Normalizer>,
    policy: RenormalizePolicy,
    observer: O,
    answer: String,
    /// Last normalized text handed to the observer.
    published: String,
    /// `answer` changed since it was last normalized.
    dirty: bool,
    sources: Vec<Source>,
    state: SessionState,
    token_count: usize,
    failure: Option<FailureNotice>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl<O: AnswerObserver> IngestionSession<O> {
    pub fn new(
        conversation_id: impl Into<String>,
        protocol: FrameProtocol,
        normalizer: Arc<dyn Normalizer>,
        config: SessionConfig,
        observer: O,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            framer: StreamFramer::new(protocol),
            normalizer,
            policy: config.renormalize,
            observer,
            answer: String::new(),
            published: String::new(),
            dirty: false,
            sources: Vec::new(),
            state: SessionState::Open,
            token_count: 0,
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Raw accumulated answer text.
    pub fn raw_answer(&self) -> &str {
        &self.answer
    }

    /// Normalized answer as last published.
    pub fn normalized_answer(&self) -> &str {
        &self.published
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Feed one chunk of the answer stream.
    pub fn ingest_chunk(&mut self, chunk: &[u8]) {
        if !self.is_open() {
            return;
        }
        for event in self.framer.push(chunk) {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: ParsedEvent) {
        if !self.is_open() {
            return;
        }
        match event {
            ParsedEvent::Token(text) => self.push_text(&text),
            ParsedEvent::Unparseable(text) => {
                debug!(
                    conversation_id = %self.conversation_id,
                    frame_len = text.len(),
                    "treating unparseable frame as answer text"
                );
                self.push_text(&text);
            }
            ParsedEvent::SourcesUpdate(sources) => {
                self.sources = sources;
                self.observer.on_sources(&self.sources);
            }
            ParsedEvent::Terminator => self.finish(SessionState::Completed),
        }
    }

    /// The transport closed. Without a prior terminator this still ends the
    /// session normally; an unterminated trailing frame is dropped.
    pub fn transport_closed(&mut self) {
        if !self.is_open() {
            return;
        }
        if let Some(tail) = self.framer.finish() {
            debug!(
                conversation_id = %self.conversation_id,
                discarded_len = tail.len(),
                "dropped incomplete trailing frame"
            );
        }
        self.finish(SessionState::Closed);
    }

    /// End the session with a failure. Pending text is published first.
    pub fn fail(&mut self, notice: FailureNotice) {
        if !self.is_open() {
            return;
        }
        self.publish();
        self.state = SessionState::Failed;
        self.finished_at = Some(Utc::now());
        warn!(
            conversation_id = %self.conversation_id,
            kind = ?notice.kind,
            cause = %notice.cause,
            answer_len = self.published.len(),
            "answer stream failed"
        );
        self.observer.on_failure(&notice);
        self.failure = Some(notice);
    }

    /// Drive the session from a byte stream until it ends.
    ///
    /// Dropping the returned future drops the stream and the session with it.
    pub async fn run<S>(mut self, mut stream: S) -> SessionReport
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
    {
        while self.is_open() {
            match stream.next().await {
                Some(Ok(chunk)) => self.ingest_chunk(&chunk),
                Some(Err(e)) => self.fail(FailureNotice::reading(&e)),
                None => self.transport_closed(),
            }
        }
        self.into_report()
    }

    pub fn into_report(self) -> SessionReport {
        SessionReport {
            conversation_id: self.conversation_id,
            outcome: self.state,
            answer: self.published,
            sources: self.sources,
            token_count: self.token_count,
            failure: self.failure,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        }
    }

    fn push_text(&mut self, text: &str) {
        self.token_count += 1;
        if text.is_empty() {
            return;
        }
        self.answer.push_str(text);
        self.dirty = true;

        let due = match self.policy {
            RenormalizePolicy::EveryToken => true,
            RenormalizePolicy::LineBreak => text.contains('\n'),
        };
        if due {
            self.publish();
        }
    }

    /// Normalize the whole answer and hand it to the observer if it changed.
    fn publish(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let normalized = self.normalizer.normalize(&self.answer);
        if normalized.is_empty() || normalized == self.published {
            return;
        }
        self.published = normalized;
        self.observer.on_token(&self.published);
    }

    fn finish(&mut self, state: SessionState) {
        self.publish();
        self.state = state;
        let finished_at = Utc::now();
        self.finished_at = Some(finished_at);
        info!(
            conversation_id = %self.conversation_id,
            outcome = ?state,
            tokens = self.token_count,
            sources = self.sources.len(),
            answer_len = self.published.len(),
            elapsed_ms = (finished_at - self.started_at).num_milliseconds(),
            "answer complete"
        );
        self.observer.on_complete();
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("conversation \"{conversation_id}\" already has an answer in progress")]
    AlreadyActive { conversation_id: String },
}

/// Tracks which conversations have a live session, backed by `DashMap` for
/// concurrent access.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: DashMap<String, DateTime<Utc>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a conversation. The claim lasts until the lease is dropped.
    pub fn acquire(self: &Arc<Self>, conversation_id: &str) -> Result<SessionLease, SessionError> {
        match self.active.entry(conversation_id.to_string()) {
            Entry::Occupied(_) => Err(SessionError::AlreadyActive {
                conversation_id: conversation_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Ok(SessionLease {
                    registry: Arc::clone(self),
                    conversation_id: conversation_id.to_string(),
                })
            }
        }
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.active.contains_key(conversation_id)
    }

    /// Number of live sessions (for metrics/testing).
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Proof that a conversation is claimed. Releases the claim on drop.
#[derive(Debug)]
pub struct SessionLease {
    registry: Arc<SessionRegistry>,
    conversation_id: String,
}

impl SessionLease {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.registry.active.remove(&self.conversation_id);
    }
}
