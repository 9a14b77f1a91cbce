//! Error types for the objectfs client
//!
//! Every fallible operation in the workspace returns [`Result`]. Server-side
//! failures keep the error type reported by the remote service so the retry
//! executor can tell transient conditions from terminal ones.

use derive_more::Display;
use std::fmt;
use thiserror::Error;

/// Common result type for objectfs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error category reported by a remote service in its response header
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ErrorType {
    /// The request was understood but denied; see the POSIX errno
    #[display("ERRNO")]
    Errno,
    /// The server could not complete the request due to an I/O problem
    #[display("IO_ERROR")]
    IoError,
    /// Unexpected failure inside the server
    #[display("INTERNAL_SERVER_ERROR")]
    InternalServerError,
    /// The request must be sent to another service instance
    #[display("REDIRECT")]
    Redirect,
    /// The client's view of the replica set is outdated
    #[display("INVALID_VIEW")]
    InvalidView,
    /// The capability or credentials presented were rejected
    #[display("AUTH_FAILED")]
    AuthFailed,
    /// The request could not be decoded
    #[display("GARBAGE_ARGS")]
    GarbageArgs,
}

/// POSIX error numbers a storage node may report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum PosixErrno {
    #[display("EPERM")]
    Eperm,
    #[display("ENOENT")]
    Enoent,
    #[display("EINTR")]
    Eintr,
    #[display("EIO")]
    Eio,
    #[display("EAGAIN")]
    Eagain,
    #[display("EACCES")]
    Eacces,
    #[display("EEXIST")]
    Eexist,
    #[display("EXDEV")]
    Exdev,
    #[display("ENODEV")]
    Enodev,
    #[display("ENOTDIR")]
    Enotdir,
    #[display("EISDIR")]
    Eisdir,
    #[display("EINVAL")]
    Einval,
    #[display("ENOSPC")]
    Enospc,
    #[display("ENOTEMPTY")]
    Enotempty,
    #[display("ENODATA")]
    Enodata,
    #[display("ETIMEDOUT")]
    Etimedout,
}

/// Error response returned by a remote service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerError {
    pub error_type: ErrorType,
    pub posix_errno: Option<PosixErrno>,
    pub message: String,
    /// Set for [`ErrorType::Redirect`] responses
    pub redirect_to_server_uuid: Option<String>,
}

impl ServerError {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            posix_errno: None,
            message: message.into(),
            redirect_to_server_uuid: None,
        }
    }

    pub fn errno(errno: PosixErrno, message: impl Into<String>) -> Self {
        Self {
            posix_errno: Some(errno),
            ..Self::new(ErrorType::Errno, message)
        }
    }

    pub fn redirect(target_uuid: impl Into<String>) -> Self {
        Self {
            redirect_to_server_uuid: Some(target_uuid.into()),
            ..Self::new(ErrorType::Redirect, "redirected to current primary")
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_type)?;
        if let Some(errno) = self.posix_errno {
            write!(f, " ({errno})")?;
        }
        if let Some(target) = &self.redirect_to_server_uuid {
            write!(f, " to {target}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Common error type for objectfs
#[derive(Debug, Error)]
pub enum Error {
    // Transport errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timeout")]
    Timeout,

    #[error("malformed frame: {0}")]
    Protocol(String),

    // Service resolution errors
    #[error("no address mapping known for UUID {0}")]
    UnknownUuid(String),

    #[error("UUID iterator is empty, no service replicas configured")]
    EmptyIterator,

    #[error("server returned an error: {0}")]
    Server(ServerError),

    #[error("capability renewal failed: {0}")]
    CapabilityRenewal(String),

    // Data path errors
    #[error(
        "object {object_number} cannot be reconstructed: {available} shards available, need {required}"
    )]
    UnrecoverableData {
        object_number: u64,
        available: usize,
        required: usize,
    },

    #[error("insufficient shards written: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("erasure coding error: {0}")]
    ErasureCoding(String),

    #[error("invalid striping policy: {0}")]
    InvalidStripingPolicy(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a framing error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Check if the failure should be retried against another replica
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::ConnectionFailed(_) | Self::Timeout | Self::UnknownUuid(_) => true,
            Self::Server(e) => matches!(
                e.error_type,
                ErrorType::IoError | ErrorType::InternalServerError
            ),
            _ => false,
        }
    }

    /// Check if the server rejected the capability attached to the request
    #[must_use]
    pub fn is_capability_invalid(&self) -> bool {
        matches!(self, Self::Server(e) if e.error_type == ErrorType::AuthFailed)
    }

    /// UUID of the service the server redirected to, if any
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Server(e) if e.error_type == ErrorType::Redirect => {
                e.redirect_to_server_uuid.as_deref()
            }
            _ => None,
        }
    }

    /// POSIX errno carried by a server error
    #[must_use]
    pub fn posix_errno(&self) -> Option<PosixErrno> {
        match self {
            Self::Server(e) => e.posix_errno,
            _ => None,
        }
    }
}

impl From<ServerError> for Error {
    fn from(e: ServerError) -> Self {
        Self::Server(e)
    }
}
