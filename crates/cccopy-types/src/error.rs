//! Error types and handling for CCCopy
//!
//! Structured error taxonomy covering every failure surface of the
//! synchronization core, with severity levels and the exit-code mapping
//! used by CLI wrappers.

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation should be retried
    Medium,
    /// High severity - operation should be aborted
    High,
    /// Critical severity - entire process should be terminated
    Critical,
}

/// Main error type for CCCopy operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Lock acquisition exceeded the caller's timeout budget
    #[error("lock timeout on '{name}' (held by {})", .owner.as_deref().unwrap_or("unknown"))]
    LockTimeout {
        /// Lock name that could not be acquired
        name: String,
        /// User currently holding the lock, if the owner file was readable
        owner: Option<String>,
        /// Lock directory path, for the force-removal remedy
        lock_dir: String,
    },

    /// A git invocation exited non-zero
    #[error("git {command} failed (exit {code}): {stderr}")]
    Git {
        /// The git subcommand that failed
        command: String,
        /// Process exit code, or -1 when killed by a signal
        code: i32,
        /// Captured stderr from the invocation
        stderr: String,
    },

    /// Privilege restoration failed; the process must not continue
    #[error("privilege restoration failed: {message}")]
    PermissionFatal {
        /// Description of the restoration failure
        message: String,
    },

    /// Upload attempted with a modified Work `.gitignore`
    #[error(".gitignore is managed by production: {message}")]
    GitignoreViolation {
        /// Description of the violation
        message: String,
    },

    /// Project template or settings problem
    #[error("configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// One or more paths are in conflicted state
    #[error("{} conflicted path(s): {}", .paths.len(), .paths.join(", "))]
    Conflict {
        /// The conflicted relative paths
        paths: Vec<String>,
    },

    /// Operation cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

impl Error {
    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } | Self::LockTimeout { .. } | Self::Git { .. } => ErrorSeverity::Medium,
            Self::GitignoreViolation { .. } | Self::Cancelled => ErrorSeverity::Low,
            Self::Config { .. } | Self::Conflict { .. } | Self::Other { .. } => ErrorSeverity::High,
            Self::PermissionFatal { .. } => ErrorSeverity::Critical,
        }
    }

    /// Check if retrying the failed operation may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::LockTimeout { .. } | Self::GitignoreViolation { .. } => true,
            Self::Git { .. }
            | Self::PermissionFatal { .. }
            | Self::Config { .. }
            | Self::Conflict { .. }
            | Self::Cancelled
            | Self::Other { .. } => false,
        }
    }

    /// Process exit code for CLI wrappers
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LockTimeout { .. } => 2,
            Self::Git { .. } => 3,
            Self::PermissionFatal { .. } => 4,
            Self::Config { .. } => 5,
            _ => 1,
        }
    }

    /// Create a new lock-timeout error
    pub fn lock_timeout<S: Into<String>>(name: S, owner: Option<String>, lock_dir: S) -> Self {
        Self::LockTimeout {
            name: name.into(),
            owner,
            lock_dir: lock_dir.into(),
        }
    }

    /// Create a new git error
    pub fn git<S: Into<String>>(command: S, code: i32, stderr: S) -> Self {
        Self::Git {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Create a new privilege-restoration error
    pub fn permission_fatal<S: Into<String>>(message: S) -> Self {
        Self::PermissionFatal {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new gitignore-violation error
    pub fn gitignore_violation<S: Into<String>>(message: S) -> Self {
        Self::GitignoreViolation {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
