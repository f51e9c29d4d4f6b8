// Error taxonomy shared by the config store, the Jenkins client and the
// command flows. Every variant is terminal for the current invocation.

use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ValidatorError>;

#[derive(Error, Debug)]
pub enum ValidatorError {
    /// URL, username or token is empty.
    #[error("Jenkins settings are incomplete, run 'jenkinsfile-validator config' first")]
    ConfigMissing,

    #[error("could not determine the home directory")]
    HomeDirUnavailable,

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not connect to Jenkins: {0}")]
    Connection(String),

    #[error("authentication failed, check your username and API token")]
    Auth,

    #[error("access forbidden, check your permissions")]
    Permission,

    /// Non-200 answer from the validation endpoint. `body` is already
    /// truncated to the configured limit.
    #[error("request failed with status {status}, response: {body}")]
    Request { status: StatusCode, body: String },

    #[error("API request failed with status: {status}{}", detail(.message))]
    Api {
        status: String,
        message: Option<String>,
    },

    #[error("invalid response format: {0}")]
    MalformedResponse(String),

    #[error("Jenkinsfile validation failed")]
    ValidationFailed { reported: usize },

    /// Prompting the user or writing to the terminal failed.
    #[error("terminal I/O failed: {0}")]
    Terminal(#[source] io::Error),
}

fn detail(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(" ({m})"),
        _ => String::new(),
    }
}
