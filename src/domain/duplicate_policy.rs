use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What to do with a device that already exists on the network server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Replace,
}

impl FromStr for DuplicatePolicy {
    type Err = UnknownPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(DuplicatePolicy::Skip),
            "replace" => Ok(DuplicatePolicy::Replace),
            _ => Err(UnknownPolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Skip => f.write_str("skip"),
            DuplicatePolicy::Replace => f.write_str("replace"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("unknown duplicate policy '{0}', expected 'skip' or 'replace'")]
pub struct UnknownPolicyError(String);
