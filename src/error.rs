//! Error types for NMEA stream decoding
//!
//! This module defines the error types that can occur while reading lines
//! from a data source, validating sentence framing, or parsing field values.
//! All of them are recoverable from the point of view of the ingestion loop;
//! the end of a stream is signalled with `Ok(None)`, never with an error.

/// Main error type for NMEA decoding and ingestion
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum NmeaError {
    /// Line does not match the sentence framing
    ///
    /// Lines like this are forwarded as raw data by the reader.
    #[error("FramingError: not a sentence: {0:?}")]
    FramingError(String),

    /// Framed sentence whose declared checksum differs from the calculated one
    #[error("ChecksumMismatch: declared {declared:02X}, calculated {calculated:02X}")]
    ChecksumMismatch { declared: u8, calculated: u8 },

    /// Valid sentence with no parser registered for its identifier
    #[error("UnsupportedSentenceType: {0}")]
    UnsupportedSentenceType(String),

    /// Field value could not be coerced to its expected type
    #[error("DataFormatError: {sentence} field '{field}': {reason}")]
    DataFormatError {
        sentence: String,
        field: &'static str,
        reason: String,
    },

    /// I/O error reported by the line source
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error while loading configuration
    #[error("SerdeError: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// A sentence window could not be composed into an event
    #[error("ProtocolError: {0}")]
    ProtocolError(&'static str),
}

impl NmeaError {
    /// Returns true if the line was not an NMEA sentence at all
    pub fn is_framing(&self) -> bool {
        matches!(self, NmeaError::FramingError(_))
    }
}
