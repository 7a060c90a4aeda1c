use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
/// Action inputs that parse but cannot be turned into a runnable configuration.
pub enum InputError {
    #[error("invalid repository '{value}': {reason}")]
    InvalidRepository { value: String, reason: String },
    #[error("invalid mode '{0}'; expected auto|refactor")]
    InvalidMode(String),
    #[error("missing GitHub token; set GITHUB_TOKEN or pass --token")]
    MissingToken,
    #[error("agent login must not be empty")]
    EmptyAgentLogin,
}
