// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

use super::pattern::CompiledPattern;
use super::types::{NormalizerConfig, WordRepair, DEFAULT_MAX_ROUNDS};

/// The default normalizer rules YAML, embedded at compile time.
const DEFAULT_RULES_YAML: &str = include_str!("../../../schema/default_rules.yaml");

#[derive(serde::Deserialize)]
struct DefaultRulesYaml {
    label_keywords: Vec<String>,
    word_repairs: Vec<DefaultWordRepair>,
}

#[derive(serde::Deserialize)]
struct DefaultWordRepair {
    pattern: String,
    replacement: String,
}

fn default_rules() -> DefaultRulesYaml {
    serde_yaml::from_str(DEFAULT_RULES_YAML).expect("default rules YAML is invalid")
}

/// The embedded default label keywords, in match-priority order.
pub fn default_label_keywords() -> Vec<String> {
    default_rules().label_keywords
}

/// Parse and compile the embedded default word repairs.
/// Panics on invalid regex (these are our own patterns).
pub fn default_word_repairs() -> Vec<WordRepair> {
    default_rules()
        .word_repairs
        .into_iter()
        .map(|r| WordRepair {
            pattern: CompiledPattern::compile_case_insensitive(&r.pattern)
                .unwrap_or_else(|e| panic!("default word repair failed to compile: {e}")),
            replacement: r.replacement,
        })
        .collect()
}

/// Build the regex for the "<label>- <Keyword>:" repair.
///
/// Capture groups: `label` (no leading or trailing whitespace, single line)
/// and `keyword`. Longer keywords are tried first so "Symptoms" wins over
/// "Symptom". Returns `None` when there are no keywords.
pub fn label_pattern(
    keywords: &[String],
) -> Result<Option<CompiledPattern>, super::ConfigError> {
    let mut sorted: Vec<&String> = keywords.iter().collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    sorted.dedup();
    if sorted.is_empty() {
        return Ok(None);
    }

    let alternation = sorted
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");

    CompiledPattern::compile_case_insensitive(&format!(
        r"(?P<label>[A-Za-z0-9(][A-Za-z0-9() \t]*?)[ \t]*-[ \t]*(?P<keyword>{alternation})[ \t]*:"
    ))
    .map(Some)
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let label_keywords = default_label_keywords();
        let label_pattern = label_pattern(&label_keywords)
            .unwrap_or_else(|e| panic!("default label pattern failed to compile: {e}"));
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            label_keywords,
            label_pattern,
            word_repairs: default_word_repairs(),
        }
    }
}
