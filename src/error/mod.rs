//! Error types for the biometric record conversion library.

use thiserror::Error;

use crate::codec::ImageKind;
use crate::config::{ImageType, Modality};

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, BdirError>;

/// Main error type for the biometric record conversion library.
#[derive(Error, Debug)]
pub enum BdirError {
    /// Malformed or truncated input record.
    #[error("{modality} record parse error at offset {offset}: expected {expected}")]
    RecordParse {
        /// Byte offset into the record where parsing failed.
        offset: usize,
        /// Field (or condition) the parser expected to find.
        expected: String,
        /// Modality of the record being parsed.
        modality: Modality,
    },

    /// Compression type code outside the modality's enumerated set.
    #[error("Unsupported {modality} compression type code: {code:#04x}")]
    UnsupportedCompressionType {
        /// Modality whose enumeration was consulted.
        modality: Modality,
        /// The offending code.
        code: u8,
    },

    /// Embedded image bytes could not be decoded.
    #[error("Failed to decode {kind} image: {cause}")]
    ImageDecode {
        /// Format the bytes were decoded as.
        kind: ImageKind,
        /// Underlying decoder message.
        cause: String,
    },

    /// Raster could not be encoded to the target format.
    #[error("Failed to encode {format} image: {cause}")]
    ImageEncode {
        /// Requested output format.
        format: ImageType,
        /// Underlying encoder message.
        cause: String,
    },

    /// The modality cannot carry the requested output format under the active policy.
    #[error("{modality} records do not accept {format} images under the active policy")]
    UnsupportedTarget {
        /// Modality of the record.
        modality: Modality,
        /// Rejected output format.
        format: ImageType,
    },

    /// Record-level business rule violated (raised only when validation is enforced).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller supplied an invalid purpose, modality or format tag.
    #[error("Input contract violation: {0}")]
    InputContract(String),

    /// Input record text is not valid url-safe base64.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BdirError {
    /// Build a parse error for the given modality.
    pub fn parse(modality: Modality, offset: usize, expected: impl Into<String>) -> Self {
        BdirError::RecordParse {
            offset,
            expected: expected.into(),
            modality,
        }
    }
}

impl From<toml::de::Error> for BdirError {
    fn from(err: toml::de::Error) -> Self {
        BdirError::Config(err.to_string())
    }
}
