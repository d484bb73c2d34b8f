// ABOUTME: Container image reference parsing and validation.
// ABOUTME: Handles formats like nginx, nginx:tag, registry:5000/team/image:tag.

use std::fmt;
use thiserror::Error;

pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A `repository:tag` pair. Two references are the same image identity when
/// both parts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    repository: String,
    tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric() && c != '/' && c != ':' && c != '.' && c != '-' && c != '_'
            {
                return Err(ParseImageRefError::InvalidChar(c));
            }
        }

        // A colon followed by a slash belongs to a registry port, not a tag
        let (repository, tag) = match input.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, after),
            _ => (input, DEFAULT_TAG),
        };

        if repository.is_empty()
            || tag.is_empty()
            || repository.starts_with('/')
            || repository.ends_with('/')
            || repository.contains("//")
        {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self::new(repository, tag))
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Registry host if the first path component looks like one.
    pub fn registry(&self) -> Option<&str> {
        let (first, _) = self.repository.split_once('/')?;
        if first.contains('.') || first.contains(':') || first == "localhost" {
            Some(first)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl std::str::FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for ImageRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ImageRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_port_is_not_a_tag() {
        let r = ImageRef::parse("registry:5000/team/app").unwrap();
        assert_eq!(r.repository(), "registry:5000/team/app");
        assert_eq!(r.tag(), DEFAULT_TAG);
        assert_eq!(r.registry(), Some("registry:5000"));
    }

    #[test]
    fn explicit_tag() {
        let r = ImageRef::parse("registry:5000/app:v2").unwrap();
        assert_eq!(r.repository(), "registry:5000/app");
        assert_eq!(r.tag(), "v2");
        assert_eq!(r.to_string(), "registry:5000/app:v2");
    }

    #[test]
    fn docker_hub_names_have_no_registry() {
        assert_eq!(ImageRef::parse("library/nginx").unwrap().registry(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(ImageRef::parse("  "), Err(ParseImageRefError::Empty)));
        assert!(matches!(
            ImageRef::parse("app:v1 extra"),
            Err(ParseImageRefError::InvalidChar(' '))
        ));
        assert!(matches!(
            ImageRef::parse("app:"),
            Err(ParseImageRefError::InvalidFormat(_))
        ));
    }
}
