use thiserror::Error;

/// Errors surfaced by the crawl, index and search operations.
///
/// The first group is reported to callers verbatim; the rest are internal and
/// are only logged (see [`Error::is_internal`]).
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotReady(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Persistence(String),

    #[error("lemmatization failed: {0}")]
    Lemmatization(String),

    #[error("{0}")]
    Cancelled(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Internal errors must not leak their details to API clients.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Storage(_)
                | Error::Codec(_)
                | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_errors_are_not_internal() {
        assert!(!Error::Validation("empty query".into()).is_internal());
        assert!(!Error::NotReady("site".into()).is_internal());
        assert!(!Error::Cancelled("stopped".into()).is_internal());
        assert!(!Error::Connection("timeout".into()).is_internal());
        assert!(Error::Config("bad json".into()).is_internal());
    }

    #[test]
    fn connection_error_message() {
        let e = Error::Connection("timeout".into());
        assert_eq!(e.to_string(), "connection failed: timeout");
    }
}
