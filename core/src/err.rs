//! Error taxonomy shared by every async operation.
//!
//! Errors are values flowing through result plumbing, never unwinding.
//! Domain-specific failures (I/O errnos, compression library status codes)
//! are re-surfaced under the same enum so callers match on kinds.

pub type OpResult<T> = Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stop was requested and the operation bailed.
    #[error("operation canceled")]
    Canceled,
    #[error("parse failed")]
    ParseFailed,
    #[error("input not fully consumed")]
    InputNotFullyConsumed,
    #[error("out of bound")]
    OutOfBound,
    #[error("invalid input")]
    InvalidInput,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A compression backend failure, tagged with the codec that produced it.
    #[error("{codec}: {detail}")]
    Compr { codec: &'static str, detail: String },
    /// An HTTP protocol violation: malformed message head, framing breakage,
    /// a connection closed mid-message.
    #[error("http: {0}")]
    Http(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Canceled,
    ParseFailed,
    InputNotFullyConsumed,
    OutOfBound,
    InvalidInput,
    Io,
    Compr,
    Http,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Canceled => ErrorKind::Canceled,
            Error::ParseFailed => ErrorKind::ParseFailed,
            Error::InputNotFullyConsumed => ErrorKind::InputNotFullyConsumed,
            Error::OutOfBound => ErrorKind::OutOfBound,
            Error::InvalidInput => ErrorKind::InvalidInput,
            Error::Io(_) => ErrorKind::Io,
            Error::Compr { .. } => ErrorKind::Compr,
            Error::Http(_) => ErrorKind::Http,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}
