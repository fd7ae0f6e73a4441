// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use regex::{Regex, RegexBuilder};

use super::error::ConfigError;

/// A pre-compiled regex pattern. Wraps `regex::Regex` with the source
/// pattern string preserved for debugging and hashing.
#[derive(Clone)]
pub struct CompiledPattern {
    pub pattern: String,
    pub regex: Regex,
}

impl CompiledPattern {
    /// Compile a case-sensitive pattern.
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        Self::build(pattern, false)
    }

    /// Compile a pattern that matches regardless of letter case.
    pub fn compile_case_insensitive(pattern: &str) -> Result<Self, ConfigError> {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, case_insensitive: bool) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ConfigError::InvalidRegex {
                pattern: pattern.to_string(),
                source: e,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}
