//! Error types for varchunk

use thiserror::Error;

/// Result type alias for varchunk operations
pub type Result<T> = std::result::Result<T, VarchunkError>;

/// Fatal errors that abort parsing.
///
/// Recoverable anomalies in the input (unparseable values, overlong tokens,
/// unknown keys) are never errors; they are recorded as
/// [`ParseWarning`](crate::parser::ParseWarning)s and parsing continues.
#[derive(Debug, Error)]
pub enum VarchunkError {
    /// I/O error from the underlying byte source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration
        reason: String,
    },

    /// A requested field name that is neither a fixed column, a
    /// `variants/FILTER_<NAME>` column, an INFO key nor a FORMAT key
    #[error("Unrecognized field {field:?}: expected variants/<NAME> or calldata/<NAME>")]
    UnrecognizedField {
        /// The offending field name as given in the configuration
        field: String,
    },

    /// Unparseable storage type code
    #[error("Invalid dtype code {code:?} (expected i1/i2/i4/i8, f4/f8, bool or S<n>)")]
    InvalidDtype {
        /// The offending code
        code: String,
    },

    /// Internal contract violation; indicates a bug, not bad input
    #[error("Internal parser error: {reason}")]
    Internal {
        /// Description of the violated contract
        reason: String,
    },
}
