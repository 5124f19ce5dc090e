//! Error taxonomy for single-file copies.
//!
//! Every failure carries the `io::Error` that caused it so callers can report
//! the OS error code. Errors are also categorized so a caller can decide
//! whether retrying the whole copy is worthwhile:
//! - Retryable: transient failures that may succeed on retry
//! - Fatal: permanent failures that will never succeed
//! - NoRetry: the request itself is wrong (bad configuration, wrong file type)

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Category of copy error for retry decision-making.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry may succeed (interrupted call, would block, etc.)
    Retryable,
    /// Permanent error - retry will never succeed (permission denied, missing file, etc.)
    Fatal,
    /// The request cannot succeed as stated; do not retry.
    NoRetry,
}

/// Which step of the copy failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyErrorKind {
    /// Opening the source, creating the destination or reading source metadata failed.
    Open,
    /// The source is a directory, device, fifo or anything else that is not a regular file.
    NotRegularFile,
    /// Re-mapping the source window failed after the transfer had begun.
    Map,
    /// Reading the source failed in the buffered strategy.
    Read,
    /// Writing the destination failed in either strategy.
    Write,
    /// The engine configuration was rejected before touching any file.
    Config,
}

impl CopyErrorKind {
    fn label(self) -> &'static str {
        match self {
            CopyErrorKind::Open => "open failed",
            CopyErrorKind::NotRegularFile => "source is not a regular file",
            CopyErrorKind::Map => "mapping source window failed",
            CopyErrorKind::Read => "read failed",
            CopyErrorKind::Write => "write failed",
            CopyErrorKind::Config => "invalid copy configuration",
        }
    }
}

/// A failed copy, tagged with the step that failed.
#[derive(Debug)]
pub struct CopyError {
    kind: CopyErrorKind,
    path: Option<PathBuf>,
    source: io::Error,
}

impl CopyError {
    pub fn new(kind: CopyErrorKind, source: io::Error) -> Self {
        Self {
            kind,
            path: None,
            source,
        }
    }

    pub(crate) fn open(path: &Path, source: io::Error) -> Self {
        Self::new(CopyErrorKind::Open, source).with_path(path)
    }

    pub(crate) fn not_regular(path: &Path) -> Self {
        // Non-regular sources report EINVAL.
        let source = io::Error::from_raw_os_error(einval());
        Self::new(CopyErrorKind::NotRegularFile, source).with_path(path)
    }

    pub(crate) fn map(source: io::Error) -> Self {
        Self::new(CopyErrorKind::Map, source)
    }

    pub(crate) fn read(source: io::Error) -> Self {
        Self::new(CopyErrorKind::Read, source)
    }

    pub(crate) fn write(source: io::Error) -> Self {
        Self::new(CopyErrorKind::Write, source)
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(
            CopyErrorKind::Config,
            io::Error::new(io::ErrorKind::InvalidInput, message.into()),
        )
    }

    /// Attach the path the error relates to, keeping an existing one.
    pub fn with_path(mut self, path: &Path) -> Self {
        if self.path.is_none() {
            self.path = Some(path.to_path_buf());
        }
        self
    }

    pub fn kind(&self) -> CopyErrorKind {
        self.kind
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn io_error(&self) -> &io::Error {
        &self.source
    }

    /// The OS error code behind this failure, when the OS produced one.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }

    /// Classify this failure for a caller that wants to retry the whole copy.
    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            CopyErrorKind::NotRegularFile | CopyErrorKind::Config => ErrorCategory::NoRetry,
            _ => categorize_io_error(&self.source),
        }
    }
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.kind.label()),
            None => f.write_str(self.kind.label()),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Categorize an IO error for retry decisions.
pub fn categorize_io_error(err: &io::Error) -> ErrorCategory {
    match err.kind() {
        // Retryable: transient conditions
        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
            ErrorCategory::Retryable
        }

        // Fatal: permanent conditions
        io::ErrorKind::PermissionDenied
        | io::ErrorKind::NotFound
        | io::ErrorKind::InvalidData
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::AlreadyExists
        | io::ErrorKind::WriteZero
        | io::ErrorKind::UnexpectedEof => ErrorCategory::Fatal,

        // Unknown errors - default to fatal to avoid retry loops
        _ => ErrorCategory::Fatal,
    }
}

/// Result type for copy operations.
pub type CopyResult<T> = std::result::Result<T, CopyError>;

#[cfg(unix)]
fn einval() -> i32 {
    libc::EINVAL
}

#[cfg(not(unix))]
fn einval() -> i32 {
    // ERROR_INVALID_PARAMETER
    87
}
