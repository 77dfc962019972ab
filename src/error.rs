//! Error taxonomy for a single runner invocation.
//!
//! Configuration problems abort before anything is launched; a non-zero
//! child exit is reported after cleanup with the exact code.
use std::path::PathBuf;

/// Resolution and validation failures. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing Oracle home: set a custom or global ORACLE_HOME, or enable auto-detection")]
    MissingOracleHome,

    #[error("invalid Oracle home: {} does not exist", .0.display())]
    InvalidOracleHome(PathBuf),

    #[error("SQL*Plus executable not found under {}", .0.display())]
    SqlPlusNotFound(PathBuf),

    #[error("tnsnames.ora not found under {}", .0.display())]
    TnsNamesNotFound(PathBuf),

    #[error("missing script: provide a script body or a script path")]
    MissingScript,

    #[error("script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("invalid credentials {0}: failed to load user and password")]
    InvalidCredentials(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("SQL*Plus exited with code {code}")]
    ProcessExit { code: i32 },

    #[error("failed to launch {}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RunnerError::Io {
            context: context.into(),
            source,
        }
    }

    /// Child exit code for failed runs, `None` when nothing ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunnerError::ProcessExit { code } => Some(*code),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, RunnerError::Configuration(_))
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_only_for_process_failures() {
        let err = RunnerError::ProcessExit { code: 3 };
        assert_eq!(err.exit_code(), Some(3));
        assert!(!err.is_configuration());

        let err: RunnerError = ConfigurationError::MissingOracleHome.into();
        assert_eq!(err.exit_code(), None);
        assert!(err.is_configuration());
    }

    #[test]
    fn launch_error_keeps_source() {
        use std::error::Error as _;
        let err = RunnerError::Launch {
            program: PathBuf::from("/opt/oracle/bin/sqlplus"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "failed to launch /opt/oracle/bin/sqlplus");
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("no such file"));
    }
}
