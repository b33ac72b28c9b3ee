use crate::relay_messages::relay_errors::{ErrorType, RelayError, RelayMessages};
use saying::say;
use std::env;
use std::path::{Path, PathBuf};

fn normalize_display_path(path: &Path) -> PathBuf {
    let path_string = path.to_string_lossy();
    if let Some(stripped) = path_string.strip_prefix(r"\\?\") {
        return PathBuf::from(stripped);
    }

    path.to_path_buf()
}

fn relative_display_path(path: &Path) -> String {
    let normalized = normalize_display_path(path);

    match env::current_dir() {
        Ok(dir) => {
            let normalized_dir = normalize_display_path(&dir);
            normalized
                .strip_prefix(&normalized_dir)
                .unwrap_or(&normalized)
                .to_string_lossy()
                .to_string()
        }
        Err(_) => normalized.to_string_lossy().to_string(),
    }
}

pub fn print_relay_messages(messages: RelayMessages) {
    for err in messages.errors {
        print_formatted_error(err);
    }
}

pub fn print_formatted_error(e: RelayError) {
    let relative_dir = e
        .path
        .as_deref()
        .map(relative_display_path)
        .unwrap_or_default();

    match e.error_type {
        ErrorType::Config => {
            say!(Yellow "CONFIG FILE ISSUE - ");
            if !relative_dir.is_empty() {
                say!(Dark Magenta relative_dir);
            }
            say!(e.msg);
        }

        ErrorType::File => {
            say!(Yellow "Can't find/read file or directory: ", relative_dir);
            say!(e.msg);
        }

        ErrorType::DevServer => {
            say!(Yellow "Dev Server whoopsie: ", Red e.msg);
        }

        ErrorType::Cli => {
            say!(Red e.msg);
        }
    }
}
