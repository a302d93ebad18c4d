use std::fmt;

use crate::model::Credential;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("API {method} {path} failed with status {status}")]
    Api {
        method: String,
        path: String,
        status: u16,
        message: String,
    },
    #[error("HTTP transport failure for {path}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Could not encode request body for {path}")]
    Encode { path: String, details: String },
    #[error("Unexpected response body for {path}")]
    Decode { path: String, details: String },
    #[error("No response available for {path}")]
    NoResponse { path: String, details: String },
    #[error("Invalid server URL: {value}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("No {credential} key configured")]
    MissingCredential { credential: Credential },
    #[error("Realtime channel failure for {subscription}")]
    Realtime {
        subscription: String,
        details: String,
    },
    #[error("RON {action} error")]
    Ron {
        action: StorageAction,
        path: Option<String>,
        #[source]
        source: ron::Error,
    },
    #[error("Storage {action} error")]
    StorageIo {
        action: StorageAction,
        path: Option<String>,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAction {
    Load,
    Save,
}

impl fmt::Display for StorageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageAction::Load => f.write_str("load"),
            StorageAction::Save => f.write_str("save"),
        }
    }
}

impl Error {
    /// Text shown in notifications. API failures surface the server's own message.
    pub fn user_summary(&self) -> String {
        match self {
            Error::Api {
                status, message, ..
            } => {
                if message.is_empty() {
                    format!("Request failed with status {status}.")
                } else {
                    message.clone()
                }
            }
            Error::Transport { .. } => "Could not reach the server.".to_string(),
            Error::Encode { .. } => "Could not prepare the request.".to_string(),
            Error::Decode { .. } => "The server sent an unexpected response.".to_string(),
            Error::NoResponse { .. } => "No response from the server.".to_string(),
            Error::InvalidUrl { value, .. } => format!("Invalid server URL: {value}."),
            Error::MissingCredential { credential } => {
                format!("No {credential} key configured for this wallet.")
            }
            Error::Realtime { .. } => "Payment notifications are unavailable.".to_string(),
            Error::Ron { action, .. } => format!("Failed to {action} profile data."),
            Error::StorageIo { action, .. } => format!("Failed to {action} profile file."),
        }
    }

    pub fn technical_detail(&self) -> String {
        match self {
            Error::Api {
                method,
                path,
                status,
                message,
            } => format!("{method} {path} -> {status}: {message}"),
            Error::Transport { path, source } => format!("Transport failure for {path}: {source}"),
            Error::Encode { path, details } => format!("Encode failure for {path}: {details}"),
            Error::Decode { path, details } => format!("Decode failure for {path}: {details}"),
            Error::NoResponse { path, details } => format!("No response for {path}: {details}"),
            Error::InvalidUrl { value, source } => format!("Invalid URL '{value}': {source}"),
            Error::MissingCredential { credential } => {
                format!("Missing {credential} key in profile.")
            }
            Error::Realtime {
                subscription,
                details,
            } => format!("Realtime failure for {subscription}: {details}"),
            Error::Ron {
                action,
                path,
                source,
            } => {
                let path = path
                    .as_ref()
                    .map(|value| format!(" path={value}."))
                    .unwrap_or_default();
                format!("RON {action} error.{path} {source}")
            }
            Error::StorageIo {
                action,
                path,
                source,
            } => {
                let path = path
                    .as_ref()
                    .map(|value| format!(" path={value}."))
                    .unwrap_or_default();
                format!("Storage {action} error.{path} {source}")
            }
        }
    }
}

/// Cloneable rendering of an [`Error`], carried by controller events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub summary: String,
    pub detail: String,
}

impl From<&Error> for Failure {
    fn from(error: &Error) -> Self {
        Self {
            summary: error.user_summary(),
            detail: error.technical_detail(),
        }
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self::from(&error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.summary, self.detail)
    }
}
