use std::path::{Path, PathBuf};

// The errors reported by the relay's own plumbing (config, sockets, CLI).
// Build errors from the targets are never represented here, they travel as status data.
#[derive(Debug, Default)]
pub struct RelayMessages {
    pub errors: Vec<RelayError>,
}

impl RelayMessages {
    pub fn new() -> Self {
        RelayMessages { errors: Vec::new() }
    }

    pub fn from_error(error: RelayError) -> Self {
        RelayMessages {
            errors: vec![error],
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl From<RelayError> for RelayMessages {
    fn from(error: RelayError) -> Self {
        RelayMessages::from_error(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Config,
    File,
    DevServer,
    Cli,
}

#[derive(Debug)]
pub struct RelayError {
    pub msg: String,

    // Not every error is tied to a file, but config and watch errors usually are.
    pub path: Option<PathBuf>,
    pub error_type: ErrorType,
}

impl RelayError {
    pub fn new(msg: impl Into<String>, error_type: ErrorType) -> Self {
        RelayError {
            msg: msg.into(),
            path: None,
            error_type,
        }
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    pub fn config_error(path: &Path, msg: impl Into<String>) -> Self {
        RelayError::new(msg, ErrorType::Config).with_path(path)
    }

    pub fn file_error(path: &Path, msg: impl Into<String>) -> Self {
        RelayError::new(msg, ErrorType::File).with_path(path)
    }

    pub fn dev_server_error(msg: impl Into<String>) -> Self {
        RelayError::new(msg, ErrorType::DevServer)
    }

    pub fn cli_error(msg: impl Into<String>) -> Self {
        RelayError::new(msg, ErrorType::Cli)
    }
}

pub fn error_type_to_str(error_type: &ErrorType) -> &'static str {
    match error_type {
        ErrorType::Config => "Config",
        ErrorType::File => "File",
        ErrorType::DevServer => "Dev Server",
        ErrorType::Cli => "CLI",
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "[{}] {}: {}",
                error_type_to_str(&self.error_type),
                path.display(),
                self.msg
            ),
            None => write!(f, "[{}] {}", error_type_to_str(&self.error_type), self.msg),
        }
    }
}
