// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crate::stream::FrameProtocol;

use super::pattern::CompiledPattern;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level parsed and validated medistream config.
#[derive(Debug)]
pub struct Config {
    /// Config format version. Always "v1".
    pub version: String,
    /// Where and how to reach the chat backend.
    pub transport: TransportConfig,
    /// Wire framing of the answer stream.
    pub protocol: FrameProtocol,
    /// Per-request ingestion behavior.
    pub session: SessionConfig,
    /// Rewrite rules for answer text.
    pub normalizer: NormalizerConfig,
    /// SHA256 hash of the raw YAML: "sha256:{hex}".
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_CHAT_PATH: &str = "/api/chat";

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Scheme, host and port of the chat backend, without a trailing slash.
    pub base_url: String,
    /// Path of the chat endpoint. Streaming requests add `?stream=true`.
    pub chat_path: String,
    /// Whole-request timeout. `None` waits for as long as the stream lasts.
    pub timeout_ms: Option<u64>,
    /// Static headers attached to every request, already interpolated.
    pub headers: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            timeout_ms: None,
            headers: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// When an ingestion session re-runs the normalizer over the accumulated
/// answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenormalizePolicy {
    /// After every token. Cost is O(answer length) per token.
    #[default]
    EveryToken,
    /// Only when a token carries a line break, plus once when the session
    /// ends.
    LineBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub renormalize: RenormalizePolicy,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_ROUNDS: usize = 4;

/// One whitespace-corruption repair: every match of `pattern` is replaced by
/// `replacement`, keeping the case of the first matched letter.
#[derive(Debug, Clone, PartialEq)]
pub struct WordRepair {
    pub pattern: CompiledPattern,
    pub replacement: String,
}

/// Data that drives the text normalizer's content-specific passes.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Upper bound on pipeline applications while looking for a fixed point.
    pub max_rounds: usize,
    /// Labels recognized in the "Heading- Keyword:" repair.
    pub label_keywords: Vec<String>,
    /// `label_keywords` compiled into the "Heading- Keyword:" matcher.
    /// `None` disables the repair.
    pub label_pattern: Option<CompiledPattern>,
    /// Ordered repair dictionary.
    pub word_repairs: Vec<WordRepair>,
}
