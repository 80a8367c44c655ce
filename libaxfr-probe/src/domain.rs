use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Domain name is empty")]
    Empty,
    #[error("Domain name exceeds {MAX_NAME_LEN} characters: {0}")]
    TooLong(String),
    #[error("Invalid label {label:?} in domain {domain}")]
    InvalidLabel { domain: String, label: String },
}

/// A syntactically plausible DNS name, lowercase, without the trailing root dot.
///
/// Validation is best-effort: anything that passes here may still be rejected
/// by the resolver or the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        let name = trimmed.strip_suffix('.').unwrap_or(trimmed);

        if name.is_empty() {
            return Err(DomainError::Empty);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(DomainError::TooLong(name.to_string()));
        }

        for label in name.split('.') {
            if !is_valid_label(label) {
                return Err(DomainError::InvalidLabel {
                    domain: name.to_string(),
                    label: label.to_string(),
                });
            }
        }

        Ok(Self(name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified form with the trailing dot, as the wire format expects.
    pub fn to_fqdn(&self) -> String {
        format!("{}.", self.0)
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FromStr for Domain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Host name (or address literal) of a server taken from an NS answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameServer(String);

impl NameServer {
    pub fn new(host: &str) -> Self {
        let host = host.trim();
        let host = host.strip_suffix('.').unwrap_or(host);
        Self(host.to_ascii_lowercase())
    }

    pub fn host(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NameServer {
    fn from(host: &str) -> Self {
        Self::new(host)
    }
}

impl fmt::Display for NameServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NameServer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Name servers in the order the resolver returned them.
pub type NameServerSet = Vec<NameServer>;
