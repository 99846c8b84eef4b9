use thiserror::Error;

/// CLI-level failures that are not library errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file or stdin could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path, or `<stdin>`.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Input is not a frame list.
    #[error("invalid frames: {0}")]
    InvalidFrames(String),

    /// Replay verification rejected the stream.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Gateway answered with a fault.
    #[error("call failed with status {status}: {fault}")]
    CallFailed {
        /// Response status.
        status: u16,
        /// `section:code`.
        fault: String,
    },
}
