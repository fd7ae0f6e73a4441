// Raw YAML deserialization types (internal)
// These are separate from the public Config structs because:
// 1. the public types hold compiled regexes, which are not Deserialize
// 2. interpolation and validation happen between raw and public
// 3. every section is optional in YAML but always present in Config

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub medistream: String,
    pub transport: Option<RawTransportConfig>,
    pub protocol: Option<RawProtocolConfig>,
    pub session: Option<RawSessionConfig>,
    pub normalizer: Option<RawNormalizerConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTransportConfig {
    pub base_url: Option<String>,
    pub chat_path: Option<String>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProtocolConfig {
    pub field_marker: Option<String>,
    pub terminator: Option<String>,
    pub delimiter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSessionConfig {
    pub renormalize: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawNormalizerConfig {
    pub max_rounds: Option<usize>,
    /// If false, skip the embedded default keywords and repairs. Default: true.
    pub use_default_rules: Option<bool>,
    #[serde(default)]
    pub label_keywords: Vec<String>,
    #[serde(default)]
    pub word_repairs: Vec<RawWordRepair>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawWordRepair {
    pub pattern: String,
    pub replacement: String,
}
