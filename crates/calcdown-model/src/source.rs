use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// Resolves the format of an external table from an explicit `format:` header value, falling
    /// back to the file extension of `uri` when no format is given.
    #[must_use]
    pub fn resolve(explicit: Option<&str>, uri: &str) -> Option<Self> {
        match explicit.map(str::to_ascii_lowercase).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("json") => Some(Self::Json),
            Some("") | None => {
                let lower = uri.to_ascii_lowercase();
                if lower.ends_with(".csv") {
                    Some(Self::Csv)
                } else if lower.ends_with(".json") || lower.ends_with(".jsonl") {
                    Some(Self::Json)
                } else {
                    None
                }
            }
            Some(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("External data tables must specify hash: sha256:<hex>")]
    Missing,
    #[error("Invalid hash format (expected sha256:<64 hex chars>)")]
    Invalid,
}

/// Location, format and pinned digest of an externally hosted table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    pub uri: String,
    pub format: SourceFormat,
    /// `sha256:<64 hex chars>` as written in the document.
    pub hash: String,
}

impl TableSource {
    /// Validates a `hash:` header value.
    pub fn check_hash(hash: Option<&str>) -> Result<&str, HashError> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let hash = hash.filter(|h| !h.is_empty()).ok_or(HashError::Missing)?;
        let re = RE.get_or_init(|| Regex::new(r"^sha256:[0-9a-fA-F]{64}$").expect("valid regex"));
        if re.is_match(hash) {
            Ok(hash)
        } else {
            Err(HashError::Invalid)
        }
    }

    /// The expected digest, lowercased, without the `sha256:` prefix.
    #[must_use]
    pub fn expected_digest(&self) -> String {
        self.hash
            .strip_prefix("sha256:")
            .unwrap_or(&self.hash)
            .to_ascii_lowercase()
    }

    /// Case-insensitive comparison against a hex digest computed by the loader.
    #[must_use]
    pub fn digest_matches(&self, actual_hex: &str) -> bool {
        self.expected_digest() == actual_hex.trim().to_ascii_lowercase()
    }
}
