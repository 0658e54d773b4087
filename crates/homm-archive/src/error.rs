//! Error types for archive operations.

use thiserror::Error;

/// Result type returned by this crate's fallible operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Comprehensive error type for directory-table and container operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Wraps any filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload codec operation failed.
    #[error("codec error: {0}")]
    Codec(#[from] homm_codecs::CodecError),

    /// The file does not start with a recognised archive signature.
    #[error("unrecognised archive signature: {0:?}")]
    UnknownSignature(Vec<u8>),

    /// A header field did not match what its format requires.
    #[error("malformed {what} header: {detail}")]
    MalformedHeader {
        /// Which header this refers to.
        what: &'static str,
        /// Human-readable detail.
        detail: String,
    },

    /// An entry name exceeded the variant's fixed name-field width.
    #[error("file name '{name}' exceeds {max} characters for this archive type")]
    NameTooLong {
        /// Offending name.
        name: String,
        /// Maximum allowed byte length.
        max: usize,
    },

    /// Lookup by name or index found nothing.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// The directory table or a data blob was shorter than its own header claims.
    #[error("truncated {what}: declared {declared} bytes, found {found}")]
    Truncated {
        /// Which structure was short.
        what: &'static str,
        /// Declared length.
        declared: usize,
        /// Actual length available.
        found: usize,
    },

    /// Every palette id in the 1..999, 1000..9999 or 10000..32767 band this
    /// archive draws from is already taken.
    #[error("no free palette id in the requested band")]
    PaletteIdSpaceExhausted,

    /// A companion archive required to resolve an external reference
    /// (a bitmap's external `PAL%03d`, a sprite's LOD for dimensions) was
    /// not supplied.
    #[error("companion archive required to resolve '{what}' was not provided")]
    MissingCompanion {
        /// What could not be resolved without the companion.
        what: String,
    },
}
