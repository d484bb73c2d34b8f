// ABOUTME: Configuration values that may come from the environment.
// ABOUTME: Used for secrets, registry passwords and container env entries.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Either a literal or `{ env: VAR, default: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

/// Resolve an optional value.
pub fn resolve_optional(value: Option<&EnvValue>) -> Result<Option<String>> {
    value.map(EnvValue::resolve).transpose()
}

/// Render an env map as `KEY=value` entries, sorted by key.
pub fn resolve_env_entries(map: &BTreeMap<String, EnvValue>) -> Result<Vec<String>> {
    map.iter()
        .map(|(k, v)| v.resolve().map(|resolved| format!("{}={}", k, resolved)))
        .collect()
}
