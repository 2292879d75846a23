//! Common error types for senpai.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`SenpaiError`].
pub type SenpaiResult<T> = Result<T, SenpaiError>;

/// Common errors across the senpai crates.
#[derive(Error, Diagnostic, Debug)]
pub enum SenpaiError {
    /// The pressure-stall interface is missing or unreadable.
    #[error("Memory pressure data unavailable: {}", path.display())]
    #[diagnostic(
        code(senpai::psi::unavailable),
        help("PSI requires Linux 4.20+ with CONFIG_PSI; boot with psi=1 if it is compiled out by default")
    )]
    ObservabilityUnavailable {
        /// The pressure file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A cgroup memory attribute is missing, unreadable or unwritable.
    #[error("Cannot access cgroup file: {}", path.display())]
    #[diagnostic(
        code(senpai::cgroup::unavailable),
        help("Check that the cgroup still exists and that you can write its memory controller files (this usually needs root)")
    )]
    CgroupUnavailable {
        /// The cgroup attribute file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A cgroup attribute file held a value we could not parse.
    #[error("Malformed cgroup file {}: {content:?}", path.display())]
    #[diagnostic(code(senpai::cgroup::malformed))]
    MalformedAttribute {
        /// The cgroup attribute file involved.
        path: PathBuf,
        /// The offending content, truncated.
        content: String,
    },

    /// Invalid byte quantity format.
    #[error("Invalid byte quantity: {value}")]
    #[diagnostic(
        code(senpai::bytes::invalid_quantity),
        help("Use formats like '512M', '100Mi', '2Gi' or a plain byte count")
    )]
    InvalidByteSize {
        /// The invalid value.
        value: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(senpai::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(senpai::io))]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SenpaiError::InvalidByteSize {
            value: "12Q".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid byte quantity: 12Q");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SenpaiError = io_err.into();
        assert!(matches!(err, SenpaiError::Io(_)));
    }
}
