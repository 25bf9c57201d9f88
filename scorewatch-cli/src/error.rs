//! CLI-specific error types and exit code mapping

use scorewatch_ingest::IngestError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A source file could not be opened.
    #[error("cannot open '{path}': {reason}")]
    FileOpen { path: String, reason: String },

    /// Wrapped ingest engine error.
    #[error("{0}")]
    Ingest(#[from] IngestError),

    /// IO error (stdout write, signal handler install, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                  |
    /// |------|--------------------------|
    /// | 0    | Success                  |
    /// | 1    | General error            |
    /// | 2    | Source failed to open    |
    /// | 10   | IO error                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileOpen { .. } => 2,
            Self::Io(_) => 10,
            Self::Ingest(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_open_maps_to_exit_2() {
        let err = CliError::FileOpen {
            path: "/var/log/game/gone.log".to_owned(),
            reason: "No such file or directory".to_owned(),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("gone.log"));
    }

    #[test]
    fn io_maps_to_exit_10() {
        let err: CliError = std::io::Error::other("broken pipe").into();
        assert_eq!(err.exit_code(), 10);
    }
}
