//! Error types for the WSIM library.
//!
//! Fatal conditions abort decoding of the current file and surface as
//! `Err` from [`crate::WsiFile::read`]. Recoverable conditions (unknown
//! segment commands, out-of-order lines, out-of-range pixels) are logged and
//! never reach this type.

use thiserror::Error;

pub type WsiResult<T> = Result<T, WsiError>;

/// Errors that can occur while decoding or resampling a WSI file.
#[derive(Error, Debug)]
pub enum WsiError {
    /// A read ran past the end of the file buffer.
    #[error("unexpected end of data at byte {position}")]
    UnexpectedEnd {
        /// Offset of the read that failed.
        position: usize,
    },

    /// A segment did not start with the `0x00 0xF0` flag sequence.
    #[error("invalid command flags at byte {position}: {:02x} {:02x}", .found[0], .found[1])]
    InvalidFlag {
        /// Offset of the bad flag sequence.
        position: usize,
        /// The two bytes found instead of the flag sequence.
        found: [u8; 2],
    },

    /// The input buffer was empty.
    #[error("WSI file is empty")]
    EmptyInput,

    /// The calibration table did not have exactly 15 entries.
    #[error("invalid number of values in value table: {0} (must be 15)")]
    InvalidValueTable(usize),

    /// A segment body could not be interpreted.
    #[error("malformed {segment} segment: {reason}")]
    MalformedSegment {
        /// Segment name.
        segment: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// No `':'` found in the label or header text.
    #[error("no ':' found in image {0}, cannot derive data time")]
    MissingDataTime(&'static str),

    /// The date or time text around the colon could not be parsed.
    #[error("invalid data time: {0}")]
    InvalidDataTime(String),

    /// Image lines were present but no valid image size was ever given.
    #[error("file contains no valid image size segment")]
    MissingImageSize,

    /// The navigation segment was missing or had an unknown nav code.
    #[error("no valid navigation information in file")]
    NavigationUnavailable,

    /// The requested output cannot be produced for this navigation.
    #[error("unsupported output configuration: {0}")]
    UnsupportedCombination(String),

    /// Invalid parameter file contents.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
