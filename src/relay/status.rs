//! Build results reported by the targets and the status messages sent to listeners.

use serde::{Deserialize, Serialize};

/// Summary of one finished build of a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub has_errors: bool,
    pub hash: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl CompilationResult {
    pub fn success(hash: impl Into<String>) -> Self {
        Self {
            has_errors: false,
            hash: hash.into(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn failed(hash: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            has_errors: true,
            hash: hash.into(),
            warnings: Vec::new(),
            errors,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAction {
    Building,
    Built,
    Sync,
}

impl std::fmt::Display for StatusAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusAction::Building => write!(f, "building"),
            StatusAction::Built => write!(f, "built"),
            StatusAction::Sync => write!(f, "sync"),
        }
    }
}

/// The payload every listener receives.
///
/// A `building` message only carries its action. `built` and `sync` always carry the hash
/// and both lists, even when the lists are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub action: StatusAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl StatusMessage {
    pub fn building() -> Self {
        Self {
            action: StatusAction::Building,
            hash: None,
            warnings: None,
            errors: None,
        }
    }

    pub fn from_result(action: StatusAction, result: &CompilationResult) -> Self {
        Self {
            action,
            hash: Some(result.hash.clone()),
            warnings: Some(result.warnings.clone()),
            errors: Some(result.errors.clone()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn errors(&self) -> &[String] {
        self.errors.as_deref().unwrap_or_default()
    }

    pub fn warnings(&self) -> &[String] {
        self.warnings.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tests/status_tests.rs"]
mod tests;
