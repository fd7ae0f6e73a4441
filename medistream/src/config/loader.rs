// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::stream::FrameProtocol;

use super::defaults::{default_label_keywords, default_word_repairs, label_pattern};
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::pattern::CompiledPattern;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a medistream config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash
/// 3. Parse YAML into raw deserialization types
/// 4. Validate version and field values
/// 5. Resolve variable interpolation in header values
/// 6. Merge default and user normalizer rules, compiling their regexes
/// 7. Build typed Config struct
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.medistream != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.medistream
        )));
    }

    Ok(Config {
        version: raw.medistream,
        transport: build_transport_config(raw.transport)?,
        protocol: build_frame_protocol(raw.protocol)?,
        session: build_session_config(raw.session)?,
        normalizer: build_normalizer_config(raw.normalizer)?,
        config_hash,
    })
}

pub fn compute_hash(raw_yaml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_yaml.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

fn build_transport_config(
    raw: Option<raw::RawTransportConfig>,
) -> Result<TransportConfig, ConfigError> {
    let raw = match raw {
        Some(r) => r,
        None => return Ok(TransportConfig::default()),
    };

    let base_url = raw
        .base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "transport.base_url \"{base_url}\" must start with http:// or https://"
        )));
    }

    let chat_path = raw
        .chat_path
        .unwrap_or_else(|| DEFAULT_CHAT_PATH.to_string());
    if !chat_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "transport.chat_path \"{chat_path}\" must start with '/'"
        )));
    }

    if raw.timeout_ms == Some(0) {
        return Err(ConfigError::Validation(
            "transport.timeout_ms must be greater than zero".to_string(),
        ));
    }

    let mut headers = BTreeMap::new();
    for (name, value) in raw.headers {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "transport.headers contains an empty header name".to_string(),
            ));
        }
        headers.insert(name, resolve_variables(&value)?);
    }

    Ok(TransportConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        chat_path,
        timeout_ms: raw.timeout_ms,
        headers,
    })
}

fn build_frame_protocol(raw: Option<raw::RawProtocolConfig>) -> Result<FrameProtocol, ConfigError> {
    let defaults = FrameProtocol::default();
    let raw = match raw {
        Some(r) => r,
        None => return Ok(defaults),
    };

    let protocol = FrameProtocol {
        field_marker: raw.field_marker.unwrap_or(defaults.field_marker),
        terminator: raw.terminator.unwrap_or(defaults.terminator),
        delimiter: raw.delimiter.unwrap_or(defaults.delimiter),
    };

    for (field, value) in [
        ("protocol.field_marker", &protocol.field_marker),
        ("protocol.terminator", &protocol.terminator),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{field} must not be empty")));
        }
    }
    if protocol.delimiter.is_empty() {
        return Err(ConfigError::Validation(
            "protocol.delimiter must not be empty".to_string(),
        ));
    }
    // CRLF is folded to LF before framing, so a '\r' could never match
    if protocol.delimiter.contains('\r') {
        return Err(ConfigError::Validation(
            "protocol.delimiter must not contain a carriage return".to_string(),
        ));
    }

    Ok(protocol)
}

fn build_session_config(raw: Option<raw::RawSessionConfig>) -> Result<SessionConfig, ConfigError> {
    let renormalize = match raw.and_then(|r| r.renormalize).as_deref() {
        Some("every_token") | None => RenormalizePolicy::EveryToken,
        Some("line_break") => RenormalizePolicy::LineBreak,
        Some(other) => {
            return Err(ConfigError::Validation(format!(
                "unknown session.renormalize value \"{other}\", expected \"every_token\" or \"line_break\""
            )));
        }
    };

    Ok(SessionConfig { renormalize })
}

fn build_normalizer_config(
    raw: Option<raw::RawNormalizerConfig>,
) -> Result<NormalizerConfig, ConfigError> {
    let raw = match raw {
        Some(r) => r,
        None => return Ok(NormalizerConfig::default()),
    };

    let max_rounds = raw.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS);
    if max_rounds == 0 {
        return Err(ConfigError::Validation(
            "normalizer.max_rounds must be at least 1".to_string(),
        ));
    }

    let use_defaults = raw.use_default_rules != Some(false);

    // Keywords: defaults first, then user keywords
    let mut label_keywords = if use_defaults {
        default_label_keywords()
    } else {
        Vec::new()
    };
    for keyword in raw.label_keywords {
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(ConfigError::Validation(
                "normalizer.label_keywords contains an empty keyword".to_string(),
            ));
        }
        if !label_keywords.iter().any(|k| k.eq_ignore_ascii_case(&keyword)) {
            label_keywords.push(keyword);
        }
    }
    let label_pattern = label_pattern(&label_keywords)?;

    // Repairs: defaults first, then user repairs, in file order
    let mut word_repairs = if use_defaults {
        default_word_repairs()
    } else {
        Vec::new()
    };
    let user_repairs = raw
        .word_repairs
        .iter()
        .map(|r| {
            Ok(WordRepair {
                pattern: CompiledPattern::compile_case_insensitive(&r.pattern)?,
                replacement: r.replacement.clone(),
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    word_repairs.extend(user_repairs);

    Ok(NormalizerConfig {
        max_rounds,
        label_keywords,
        label_pattern,
        word_repairs,
    })
}
