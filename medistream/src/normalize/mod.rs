// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Answer text normalization
//
// Rewrites malformed model output (glued bullets, inline headings, padded
// bold markers, words split by stray whitespace) into consistent Markdown.
// Normalization is a pure string transformation and is idempotent:
// normalizing already-normalized text returns the same text.

mod passes;

use regex::Regex;
use tracing::debug;

use crate::config::{NormalizerConfig, WordRepair};
use passes::StructurePatterns;

// ---------------------------------------------------------------------------
// Trait: Normalizer
// ---------------------------------------------------------------------------

/// Pure string normalizer. Implementations must be Send + Sync so they can be
/// shared across sessions.
pub trait Normalizer: Send + Sync {
    /// Normalize a whole answer. The result must be idempotent:
    /// `normalize(normalize(x)) == normalize(x)` for all `x`.
    fn normalize(&self, input: &str) -> String;
}

// ---------------------------------------------------------------------------
// Implementation: MarkdownNormalizer
// ---------------------------------------------------------------------------

/// Markdown normalizer that applies, in order:
///
/// 1. Remove list items with no content after the marker
/// 2. Tighten bold markers: `** text **` -> `**text**`
/// 3. Paragraph break before a heading that is not at line start
/// 4. Line break after a heading followed by text
/// 5. Exactly two blank lines between heading lines, and between a list
///    and the heading after it
/// 6. `Label- Keyword:` -> `**Label**` plus `- **Keyword:**`
/// 7. Line break between a sentence's period and a glued `- ` marker
/// 8. `-item` at line start -> `- item`
/// 9. Line break before a bold list item glued onto a sentence
/// 10. Word repairs from the configured dictionary
///
/// then trims the result. The pipeline is re-run until the text stops
/// changing, at most `max_rounds` times.
pub struct MarkdownNormalizer {
    patterns: StructurePatterns,
    label_pattern: Option<Regex>,
    word_repairs: Vec<WordRepair>,
    max_rounds: usize,
}

impl MarkdownNormalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            patterns: StructurePatterns::compile(),
            label_pattern: config.label_pattern.as_ref().map(|p| p.regex.clone()),
            word_repairs: config.word_repairs.clone(),
            max_rounds: config.max_rounds.max(1),
        }
    }

    /// Normalizer with the embedded default keywords and repairs.
    pub fn with_defaults() -> Self {
        Self::new(&NormalizerConfig::default())
    }

    fn apply_passes(&self, input: &str) -> String {
        let p = &self.patterns;
        let text = passes::remove_dangling_bullets(p, input);
        let text = passes::tighten_bold(p, &text);
        let text = passes::break_before_headings(p, &text);
        let text = passes::break_after_headings(p, &text);
        let text = passes::separate_headings(p, &text);
        let text = passes::split_label_keywords(self.label_pattern.as_ref(), &text);
        let text = passes::break_before_glued_markers(p, &text);
        let text = passes::space_list_markers(p, &text);
        let text = passes::break_before_bold_items(p, &text);
        let text = passes::repair_words(&self.word_repairs, &text);
        text.trim().to_string()
    }
}

impl Default for MarkdownNormalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Normalizer for MarkdownNormalizer {
    fn normalize(&self, input: &str) -> String {
        let mut current = self.apply_passes(input);
        for _ in 1..self.max_rounds {
            let next = self.apply_passes(&current);
            if next == current {
                return current;
            }
            current = next;
        }
        if self.max_rounds > 1 {
            debug!(
                max_rounds = self.max_rounds,
                input_len = input.len(),
                "normalizer stopped before reaching a fixed point"
            );
        }
        current
    }
}

// ---------------------------------------------------------------------------
// Implementation: IdentityNormalizer
// ---------------------------------------------------------------------------

/// Leaves text untouched. Used to show the raw model output.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityNormalizer;

impl Normalizer for IdentityNormalizer {
    fn normalize(&self, input: &str) -> String {
        input.to_string()
    }
}
