//! Result type alias for CCCopy operations

use crate::Error;

/// Result type alias for CCCopy operations
pub type Result<T> = std::result::Result<T, Error>;
