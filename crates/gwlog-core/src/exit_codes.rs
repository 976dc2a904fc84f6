//! Exit codes for the gwlog CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.

use gwlog_common::Error;

/// Exit codes for gwlog operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed
    Clean = 0,

    /// Configuration or argument error
    ConfigError = 10,

    /// Fetch interrupted; resumable with the printed marker
    FetchInterrupted = 11,

    /// Local staging I/O error
    StagingError = 12,

    /// Load phase failed (parse, validation, database)
    LoadError = 13,

    /// Internal error, such as a failure to set up logging
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::InvalidDateRange { .. } => ExitCode::ConfigError,
            Error::Format { .. } | Error::Credential { .. } | Error::Transport { .. } => {
                ExitCode::FetchInterrupted
            }
            Error::StagingIo { .. } => ExitCode::StagingError,
            Error::Parse { .. } | Error::Validation { .. } | Error::Database(_) => {
                ExitCode::LoadError
            }
        }
    }
}
