use thiserror::Error;

/// Failures talking to the analysis backend.
///
/// A superseded request is not an error and never appears here; the request
/// lifecycle reports it as a cancelled outcome instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Server error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Text for the dismissible inline error banner
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(_) => {
                "Unable to reach the analysis server. Please try again in a moment.".to_string()
            }
            ClientError::Status { status, .. } => format!("HTTP error! status: {}", status),
            ClientError::Decode(_) => "Invalid response format from server".to_string(),
            ClientError::Validation(msg) | ClientError::Config(msg) => msg.clone(),
        }
    }

    /// Whether repeating the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<diversity_types::UploadError> for ClientError {
    fn from(err: diversity_types::UploadError) -> Self {
        ClientError::Validation(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
