//! NMEA 0183 sentence framing
//!
//! A sentence is one line of the form
//! `<begin><talker><id>,<field>,<field>...[*<checksum>]`, where `begin` is
//! `$` for ordinary sentences or `!` for encapsulated ones and the optional
//! checksum is the hex-encoded XOR of every character between the begin
//! marker and the `*` delimiter.
//!
//! This module validates the framing and produces a [`Sentence`] holding the
//! textual fields. Turning fields into typed records is the job of the
//! [`decoder`] and its parser registry.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::{Result, error::NmeaError};

/// Parser registry and sentence decoder
pub mod decoder;
/// Typed sentence records
pub mod message;
/// Common data types used in sentence fields
pub mod types;

/// Begin marker of ordinary sentences
pub const BEGIN_CHAR: char = '$';
/// Begin marker of encapsulated sentences (e.g. AIS `!AIVDM`)
pub const ALTERNATIVE_BEGIN_CHAR: char = '!';
/// Delimiter between sentence fields
pub const FIELD_DELIMITER: char = ',';
/// Delimiter between sentence body and checksum
pub const CHECKSUM_DELIMITER: char = '*';
/// Talker id of proprietary sentences
pub const PROPRIETARY_TALKER: &str = "P";

static RE_CHECKSUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[$!][A-Z0-9]{3,10},[\x20-\x7F]*\*[0-9A-Fa-f]{2}$")
        .expect("static sentence pattern")
});

static RE_NO_CHECKSUM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[$!][A-Z0-9]{3,10},[\x20-\x7F]*$").expect("static sentence pattern")
});

/// Computes the XOR checksum of a sentence
///
/// The begin marker is skipped if present and the computation stops at the
/// last checksum delimiter, so both a full line and a bare body can be passed.
pub fn checksum(line: &str) -> u8 {
    let body = line
        .strip_prefix([BEGIN_CHAR, ALTERNATIVE_BEGIN_CHAR])
        .unwrap_or(line);
    let body = match body.rfind(CHECKSUM_DELIMITER) {
        Some(idx) => &body[..idx],
        None => body,
    };
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Returns true if the line has the shape of a sentence
///
/// The checksum, if any, is not verified.
pub fn is_sentence(line: &str) -> bool {
    let line = trim_line(line);
    if line.contains(CHECKSUM_DELIMITER) && RE_CHECKSUM.is_match(line) {
        return true;
    }
    RE_NO_CHECKSUM.is_match(line) && !line.contains(CHECKSUM_DELIMITER)
}

/// Returns true if the line is a sentence with a matching or absent checksum
pub fn is_valid(line: &str) -> bool {
    Sentence::parse(line).is_ok()
}

/// One framed NMEA sentence
///
/// Holds the talker and sentence identifiers and the ordered textual fields.
/// Sentences are immutable once parsed; typed access to the fields goes
/// through [`Sentence::parse_field`] and [`Sentence::require_field`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Sentence {
    begin: char,
    talker: String,
    id: String,
    fields: Vec<String>,
    checksum: Option<u8>,
}

impl Sentence {
    /// Validates framing and checksum of a line and splits it into fields
    ///
    /// # Errors
    /// * `FramingError` - the line is not a sentence
    /// * `ChecksumMismatch` - the declared checksum is wrong
    pub fn parse(line: &str) -> Result<Self> {
        let line = trim_line(line);
        if !is_sentence(line) {
            return Err(NmeaError::FramingError(line.to_string()));
        }

        let (body, checksum) = match line.rfind(CHECKSUM_DELIMITER) {
            Some(idx) => {
                let declared = u8::from_str_radix(&line[idx + 1..], 16)
                    .map_err(|_| NmeaError::FramingError(line.to_string()))?;
                let calculated = checksum(line);
                if declared != calculated {
                    return Err(NmeaError::ChecksumMismatch {
                        declared,
                        calculated,
                    });
                }
                (&line[1..idx], Some(declared))
            }
            None => (&line[1..], None),
        };

        // is_sentence guarantees a non-empty address followed by a comma
        let begin = line.chars().next().unwrap_or(BEGIN_CHAR);
        let (address, fields) = body
            .split_once(FIELD_DELIMITER)
            .ok_or_else(|| NmeaError::FramingError(line.to_string()))?;

        let (talker, id) = if address.starts_with(PROPRIETARY_TALKER) {
            address.split_at(1)
        } else {
            address.split_at(2)
        };

        Ok(Sentence {
            begin,
            talker: talker.to_string(),
            id: id.to_string(),
            fields: fields.split(FIELD_DELIMITER).map(str::to_string).collect(),
            checksum,
        })
    }

    /// Begin marker, `$` or `!`
    pub fn begin(&self) -> char {
        self.begin
    }

    /// Talker identifier, e.g. `GP` or `GN`, or `P` for proprietary sentences
    pub fn talker(&self) -> &str {
        &self.talker
    }

    /// Sentence identifier, e.g. `GSA`
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Checksum as declared in the line, if it had one
    pub fn checksum(&self) -> Option<u8> {
        self.checksum
    }

    /// All data fields in order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the field at `index`, or `None` if it is missing or empty
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields
            .get(index)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Parses an optional field
    ///
    /// Missing and empty fields yield `Ok(None)`; a value that cannot be
    /// parsed yields a `DataFormatError` naming the sentence and field.
    pub fn parse_field<T>(&self, index: usize, name: &'static str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.field(index) {
            Some(value) => value.parse::<T>().map(Some).map_err(|e| {
                self.format_error(name, format!("cannot parse {value:?}: {e}"))
            }),
            None => Ok(None),
        }
    }

    /// Parses a field that must be present
    pub fn require_field<T>(&self, index: usize, name: &'static str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse_field(index, name)?
            .ok_or_else(|| self.format_error(name, "missing value".into()))
    }

    /// Builds a `DataFormatError` for a field of this sentence
    pub fn format_error(&self, field: &'static str, reason: String) -> NmeaError {
        NmeaError::DataFormatError {
            sentence: format!("{}{}", self.talker, self.id),
            field,
            reason,
        }
    }
}

impl std::fmt::Display for Sentence {
    /// Writes the sentence back as a line with a freshly computed checksum
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = format!(
            "{}{}{}{}",
            self.talker,
            self.id,
            FIELD_DELIMITER,
            self.fields.join(",")
        );
        write!(
            f,
            "{}{}{}{:02X}",
            self.begin,
            body,
            CHECKSUM_DELIMITER,
            checksum(&body)
        )
    }
}

impl std::str::FromStr for Sentence {
    type Err = NmeaError;

    fn from_str(s: &str) -> Result<Self> {
        Sentence::parse(s)
    }
}
