// ABOUTME: Hostname-compatible logical service name shared by all container generations.
// ABOUTME: Validates RFC 1123 style names that are also legal container names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum LogicalNameError {
    #[error("logical name cannot be empty")]
    Empty,

    #[error("logical name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("logical name must start with a letter or digit")]
    BadStart,

    #[error("logical name cannot end with a hyphen or dot")]
    BadEnd,

    #[error("logical name must be lowercase")]
    NotLowercase,

    #[error("invalid character in logical name: '{0}'")]
    InvalidChar(char),
}

/// Stable service-level identity. It is written as the container hostname
/// and identity label of every generation, and becomes the container name of
/// the active generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalName(String);

impl LogicalName {
    pub fn new(value: &str) -> Result<Self, LogicalNameError> {
        if value.is_empty() {
            return Err(LogicalNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(LogicalNameError::TooLong);
        }

        if value.starts_with(['-', '.']) {
            return Err(LogicalNameError::BadStart);
        }

        if value.ends_with(['-', '.']) {
            return Err(LogicalNameError::BadEnd);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(LogicalNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.' {
                return Err(LogicalNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LogicalName {
    type Err = LogicalNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for LogicalName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LogicalName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(&value).map_err(serde::de::Error::custom)
    }
}
