//! Error types for rune-seer-core.

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// Configuration parsed but holds a value the service cannot run with.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while decomposing or reassembling UTF-8 sequences.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The value is a surrogate (U+D800..=U+DFFF) or lies above U+10FFFF.
    #[error("invalid code point: {code_point:#X} is not a Unicode scalar value")]
    InvalidCodePoint {
        /// The rejected value.
        code_point: u32,
    },

    /// A byte record sequence does not form a well-formed UTF-8 encoding.
    #[error("malformed UTF-8 sequence: {reason}")]
    MalformedSequence {
        /// Which structural rule was violated.
        reason: &'static str,
    },
}

/// Result type alias using [`EncodingError`].
pub type EncodingResult<T> = Result<T, EncodingError>;
