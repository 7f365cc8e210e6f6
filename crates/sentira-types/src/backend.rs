//! Backend identities for the scoring sources sentira fans work out to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One scoring source: a local lexicon function, a local neural model, or
/// a remote LLM API.
///
/// The kebab-case string form (`lexicon`, `local-model`, `gpt4`, `gemini`,
/// `grok`) is used in configuration files, cache fingerprints, and the CLI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum BackendId {
    /// Local word-list sentiment scorer. Synchronous, no I/O.
    Lexicon,
    /// Local neural model, lazily loaded with a deadline.
    LocalModel,
    /// OpenAI chat completions.
    Gpt4,
    /// Google Gemini via its OpenAI-compatible endpoint.
    Gemini,
    /// xAI Grok.
    Grok,
}

impl BackendId {
    /// All known backends, in declaration order.
    pub const ALL: [BackendId; 5] = [
        BackendId::Lexicon,
        BackendId::LocalModel,
        BackendId::Gpt4,
        BackendId::Gemini,
        BackendId::Grok,
    ];

    /// The stable string form used in config, fingerprints, and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Lexicon => "lexicon",
            BackendId::LocalModel => "local-model",
            BackendId::Gpt4 => "gpt4",
            BackendId::Gemini => "gemini",
            BackendId::Grok => "grok",
        }
    }

    /// Whether this backend talks to a remote API (as opposed to running
    /// in-process).
    pub fn is_remote(&self) -> bool {
        matches!(self, BackendId::Gpt4 | BackendId::Gemini | BackendId::Grok)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown backend name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown backend: {0}")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendId {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lexicon" => Ok(BackendId::Lexicon),
            "local-model" => Ok(BackendId::LocalModel),
            "gpt4" => Ok(BackendId::Gpt4),
            "gemini" => Ok(BackendId::Gemini),
            "grok" => Ok(BackendId::Grok),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}
