//! Error types for the LK Display hardware library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a display.
#[derive(Error, Debug)]
pub enum Error {
    /// No supported display could be opened.
    #[error("No supported display found (VID:PID 1B80:B538 or 0145:1005)")]
    NoDisplay,

    /// The device node exists but we may not open it.
    #[error("Permission denied: {0} (run as root or install the udev rule)")]
    PermissionDenied(String),

    /// Opening the device node failed for another reason.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The device went away while we were writing to it.
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// The kernel accepted fewer bytes than a full report.
    #[error("Partial write to {path}: {written}/{expected} bytes")]
    PartialWrite {
        path: String,
        written: usize,
        expected: usize,
    },

    /// Device I/O error.
    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classifies an open failure for `path`.
    pub fn from_open(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Error::PermissionDenied(path.to_string())
        } else {
            Error::Open {
                path: path.to_string(),
                source: err,
            }
        }
    }

    /// Classifies a write failure for `path`.
    ///
    /// Only `ENODEV` means the device is gone; everything else is transient.
    pub fn from_write(path: &str, err: std::io::Error) -> Self {
        if err.raw_os_error() == Some(libc::ENODEV) {
            Error::Disconnected(path.to_string())
        } else {
            Error::Io(err)
        }
    }

    /// Returns true if the handle that produced this error must be dropped.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::Disconnected(_))
    }
}
