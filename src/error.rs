use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unexpected status {status} for {url}")]
    Network { status: u16, url: String },
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Server broke the expected protocol: {0}")]
    Protocol(String),

    #[error("Login failed: {0}")]
    Auth(String),

    #[error("Couldn't parse the page: {0}")]
    Parse(String),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Url Error: {0}")]
    Url(#[from] url::ParseError),
}

/// Coarse classification of an [`Error`], for callers deciding what to do next
/// (e.g. asking for credentials again on [`ErrorKind::Auth`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Protocol,
    Auth,
    Parse,
    Local,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Network { .. } | Error::Reqwest(_) => ErrorKind::Network,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Parse(_) | Error::Url(_) => ErrorKind::Parse,
            Error::RuntimeJoin(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Local,
        }
    }
}
