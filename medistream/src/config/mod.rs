// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads medistream.yaml, validates structure, resolves variable
// interpolation in transport headers, compiles normalizer rules, and
// computes a deterministic config hash.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod pattern;
mod raw;
mod source;
mod types;

pub use defaults::{default_label_keywords, default_word_repairs, label_pattern};
pub use error::ConfigError;
pub use interpolation::{resolve_variables, resolve_variables_with};
pub use loader::{compute_hash, load_config};
pub use pattern::CompiledPattern;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::*;
