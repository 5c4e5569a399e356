pub mod copilot_error;

use std::io;

use thiserror::Error as ThisError;

pub use copilot_error::CopilotError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serde_json error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Copilot(#[from] CopilotError),
}

impl Error {
    pub fn model(message: impl Into<String>) -> Self {
        Error::Copilot(CopilotError::Model(message.into()))
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Error::Copilot(CopilotError::Collaborator(message.into()))
    }

    /// Domain error behind this error, if any.
    pub fn as_copilot(&self) -> Option<&CopilotError> {
        match self {
            Error::Copilot(inner) => Some(inner),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
