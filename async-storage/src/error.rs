use failure::{Backtrace, Context, Fail};
use std::fmt;
use std::io;

/// Error Type for the storage crate
#[derive(Debug)]
pub struct StoreError {
    inner: Context<StoreErrorKind>,
}

/// Broad classes of failure reported to callers.
///
/// A missing key is never an error: lookups report it as an absent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input, rejected before reaching the storage engine
    Validation,
    /// Failure of the underlying medium or of the machinery driving it
    Storage,
}

impl ErrorCategory {
    /// lowercase name used in bridge payloads
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of possible Errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum StoreErrorKind {
    /// Empty key
    #[fail(display = "Invalid key")]
    InvalidKey,
    /// Key longer than the configured limit
    #[fail(display = "Key too long")]
    KeyTooLong,
    /// Bridge argument of the wrong shape or type
    #[fail(display = "Invalid argument")]
    InvalidArgument,
    /// Bridge request that cannot be decoded
    #[fail(display = "Invalid request")]
    InvalidRequest,
    /// Configuration that cannot be parsed or is out of range
    #[fail(display = "Invalid configuration")]
    InvalidConfig,
    /// IoError triggered by file I/Os
    #[fail(display = "Io Error")]
    IoError,
    /// Error triggered by sled engine
    #[fail(display = "Sled Error")]
    SledError,
    /// Engine reported on-disk corruption
    #[fail(display = "Storage corrupted")]
    Corruption,
    /// Stored key is not valid UTF-8
    #[fail(display = "Stored key is not valid UTF-8")]
    CorruptedKey,
    /// Stored value is not valid UTF-8 where a string was required
    #[fail(display = "Stored value is not valid UTF-8")]
    CorruptedValue,
    /// Namespace already opened by another handle
    #[fail(display = "Store is locked by another instance")]
    StoreLocked,
    /// A thread panicked while holding a store lock
    #[fail(display = "Store lock poisoned")]
    LockPoisoned,
    /// ThreadPool Panic Error
    #[fail(display = "ThreadPool thread Panicked")]
    ThreadPanic,
    /// Rayon related error
    #[fail(display = "Rayon ThreadPool Error")]
    RayonError,
    /// The job completing an operation went away without replying
    #[fail(display = "Operation aborted before completion")]
    TaskAborted,
}

impl StoreErrorKind {
    /// which class of failure this kind belongs to
    pub fn category(self) -> ErrorCategory {
        use StoreErrorKind::*;
        match self {
            InvalidKey | KeyTooLong | InvalidArgument | InvalidRequest | InvalidConfig => {
                ErrorCategory::Validation
            }
            IoError | SledError | Corruption | CorruptedKey | CorruptedValue | StoreLocked
            | LockPoisoned | ThreadPanic | RayonError | TaskAborted => ErrorCategory::Storage,
        }
    }

    /// stable snake_case code used in bridge payloads
    pub fn code(self) -> &'static str {
        use StoreErrorKind::*;
        match self {
            InvalidKey => "invalid_key",
            KeyTooLong => "key_too_long",
            InvalidArgument => "invalid_argument",
            InvalidRequest => "invalid_request",
            InvalidConfig => "invalid_config",
            IoError => "io_error",
            SledError => "sled_error",
            Corruption => "corruption",
            CorruptedKey => "corrupted_key",
            CorruptedValue => "corrupted_value",
            StoreLocked => "store_locked",
            LockPoisoned => "lock_poisoned",
            ThreadPanic => "thread_panic",
            RayonError => "rayon_error",
            TaskAborted => "task_aborted",
        }
    }
}

impl StoreError {
    /// build an error of the given kind carrying a human readable detail
    pub fn new(kind: StoreErrorKind, detail: impl fmt::Display) -> StoreError {
        failure::err_msg(detail.to_string()).context(kind).into()
    }

    /// get the kind of the error
    pub fn kind(&self) -> StoreErrorKind {
        *self.inner.get_context()
    }

    /// shorthand for `self.kind().category()`
    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    /// message of the underlying cause, if any
    pub fn detail(&self) -> Option<String> {
        self.inner.cause().map(|cause| cause.to_string())
    }
}

impl Fail for StoreError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.cause() {
            Some(cause) => write!(f, "{}: {}", self.inner, cause),
            None => fmt::Display::fmt(&self.inner, f),
        }
    }
}

impl From<StoreErrorKind> for StoreError {
    fn from(kind: StoreErrorKind) -> StoreError {
        StoreError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<StoreErrorKind>> for StoreError {
    fn from(context: Context<StoreErrorKind>) -> StoreError {
        StoreError { inner: context }
    }
}

impl From<io::Error> for StoreError {
    fn from(error: io::Error) -> StoreError {
        error.context(StoreErrorKind::IoError).into()
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> StoreError {
        error.context(StoreErrorKind::InvalidRequest).into()
    }
}

impl From<sled::Error> for StoreError {
    fn from(error: sled::Error) -> StoreError {
        let kind = match &error {
            sled::Error::Corruption { .. } => StoreErrorKind::Corruption,
            sled::Error::Io(io_error) if is_lock_contention(io_error) => {
                StoreErrorKind::StoreLocked
            }
            _ => StoreErrorKind::SledError,
        };
        error.context(kind).into()
    }
}

// sled wraps a failed `try_lock_exclusive` in an `Other` io error, so the
// original `WouldBlock` only survives in the message
fn is_lock_contention(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.to_string().starts_with("could not acquire lock on")
}

impl From<tokio::sync::oneshot::error::RecvError> for StoreError {
    fn from(error: tokio::sync::oneshot::error::RecvError) -> StoreError {
        error.context(StoreErrorKind::TaskAborted).into()
    }
}
