// Copyright 2026 The Medistream Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Resolves `${VAR_NAME}` references from the process environment.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    resolve_variables_with(input, |name| std::env::var(name).ok())
}

/// Resolves `${VAR_NAME}` references through `lookup`.
///
/// A reference whose variable is unknown fails with
/// `ConfigError::UndefinedVariable`. An unterminated `${` or an empty name is
/// kept literally.
pub fn resolve_variables_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("${") {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        let Some(close) = after_open.find('}') else {
            result.push_str(&rest[open..]);
            return Ok(result);
        };

        let name = &after_open[..close];
        if name.is_empty() {
            result.push_str("${}");
        } else {
            let value = lookup(name).ok_or_else(|| ConfigError::UndefinedVariable {
                name: name.to_string(),
            })?;
            result.push_str(&value);
        }
        rest = &after_open[close + 1..];
    }

    result.push_str(rest);
    Ok(result)
}
