// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task environment JSON.
//!
//! Top-level keys become executor extra-vars. A reserved `ENV` object
//! contributes `KEY=VALUE` pairs to the subprocess environment instead.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved key holding process environment variables.
pub const ENV_KEY: &str = "ENV";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub json: String,
}

/// Parse an environment document into its top-level map.
///
/// Blank input is an empty map; anything that is not a JSON object is an error.
pub fn parse_environment(json: &str) -> Result<Map<String, Value>, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_json::from_str(json)
}

/// Extract `ENV` entries as `(key, value)` pairs for the subprocess.
///
/// Malformed documents and a non-object `ENV` yield nothing. String values
/// are used verbatim; other values use their JSON text.
pub fn command_environment(json: &str) -> Vec<(String, String)> {
    let Ok(doc) = parse_environment(json) else {
        return Vec::new();
    };
    match doc.get(ENV_KEY) {
        Some(Value::Object(vars)) => vars
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
