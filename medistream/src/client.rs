// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Chat client
//
// Entry point for applications: claims the conversation, opens the answer
// stream, and drives an IngestionSession over it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Config, SessionConfig};
use crate::normalize::{MarkdownNormalizer, Normalizer};
use crate::session::{
    AnswerObserver, FailureNotice, IngestionSession, SessionError, SessionRegistry, SessionReport,
    SessionState,
};
use crate::stream::FrameProtocol;
use crate::transport::{ChatRequest, ChatTransport, ReqwestTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to set up chat transport: {0}")]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// Client dependencies
// ---------------------------------------------------------------------------

pub struct ClientDeps {
    pub transport: Arc<dyn ChatTransport>,
    pub normalizer: Arc<dyn Normalizer>,
    pub registry: Arc<SessionRegistry>,
    pub session: SessionConfig,
    pub protocol: FrameProtocol,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

pub struct ChatClient {
    deps: ClientDeps,
}

impl ChatClient {
    pub fn new_with(deps: ClientDeps) -> Self {
        Self { deps }
    }

    /// Client over HTTP with the configured normalizer rules.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(&config.transport)?;
        Ok(Self::new_with(ClientDeps {
            transport: Arc::new(transport),
            normalizer: Arc::new(MarkdownNormalizer::new(&config.normalizer)),
            registry: Arc::new(SessionRegistry::new()),
            session: config.session,
            protocol: config.protocol.clone(),
        }))
    }

    /// Replace the normalizer, e.g. to show raw model output.
    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.deps.normalizer = normalizer;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.deps.registry
    }

    /// Ask a question and stream the answer into `observer`.
    ///
    /// Transport failures are reported through the observer and the report,
    /// not as `Err`. `Err` means the session never started.
    pub async fn ask<O: AnswerObserver>(
        &self,
        conversation_id: &str,
        message: &str,
        observer: O,
    ) -> Result<SessionReport, ClientError> {
        let _lease = self.deps.registry.acquire(conversation_id)?;
        let mut session = self.session(conversation_id, observer);

        let request = ChatRequest::new(conversation_id, message);
        info!(
            conversation_id,
            message_len = message.len(),
            "opening answer stream"
        );
        match self.deps.transport.open_stream(&request).await {
            Ok(stream) => Ok(session.run(stream).await),
            Err(e) => {
                session.fail(FailureNotice::opening(&e));
                Ok(session.into_report())
            }
        }
    }

    /// Ask a question without streaming. The observer sees the sources, one
    /// normalized answer and the completion, or a single failure.
    pub async fn ask_once<O: AnswerObserver>(
        &self,
        conversation_id: &str,
        message: &str,
        mut observer: O,
    ) -> Result<SessionReport, ClientError> {
        let _lease = self.deps.registry.acquire(conversation_id)?;
        let started_at = Utc::now();
        let request = ChatRequest::new(conversation_id, message);

        let response = match self.deps.transport.send(&request).await {
            Ok(r) => r,
            Err(e) => {
                let notice = FailureNotice::opening(&e);
                warn!(
                    conversation_id,
                    kind = ?notice.kind,
                    cause = %notice.cause,
                    "chat request failed"
                );
                observer.on_failure(&notice);
                return Ok(SessionReport {
                    conversation_id: conversation_id.to_string(),
                    outcome: SessionState::Failed,
                    answer: String::new(),
                    sources: Vec::new(),
                    token_count: 0,
                    failure: Some(notice),
                    started_at,
                    finished_at: Utc::now(),
                });
            }
        };

        if !response.sources.is_empty() {
            observer.on_sources(&response.sources);
        }
        let answer = self.deps.normalizer.normalize(&response.answer);
        if !answer.is_empty() {
            observer.on_token(&answer);
        }
        observer.on_complete();
        info!(
            conversation_id,
            sources = response.sources.len(),
            answer_len = answer.len(),
            "answer complete"
        );

        Ok(SessionReport {
            conversation_id: conversation_id.to_string(),
            outcome: SessionState::Completed,
            answer,
            sources: response.sources,
            token_count: 1,
            failure: None,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn session<O: AnswerObserver>(&self, conversation_id: &str, observer: O) -> IngestionSession<O> {
        IngestionSession::new(
            conversation_id,
            self.deps.protocol.clone(),
            Arc::clone(&self.deps.normalizer),
            self.deps.session,
            observer,
        )
    }
}
