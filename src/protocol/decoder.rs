//! Sentence decoder and parser dispatch
//!
//! The [`Decoder`] validates a line with [`Sentence::parse`] and hands the
//! result to the parser registered for its sentence identifier. The
//! [`ParserRegistry`] is filled once when the decoder is built and is
//! read-only afterwards, so a decoder can be moved into a reader thread
//! without any shared state.

use std::collections::HashMap;

use serde::Serialize;

use super::{
    Sentence,
    message::{Gga, Gsa, Gsv, Hdm, Message, Rmc},
};
use crate::{Result, error::NmeaError};

/// Parser function turning a validated sentence into a typed record
pub type ParseFn = fn(&Sentence) -> Result<Message>;

/// Mapping from sentence identifier to parser
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, ParseFn>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.parsers.keys()).finish()
    }
}

impl ParserRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with parsers for GGA, GSA, GSV, HDM and RMC
    pub fn standard() -> Self {
        Self::new()
            .register("GGA", |s| Gga::parse(s).map(Message::Gga))
            .register("GSA", |s| Gsa::parse(s).map(Message::Gsa))
            .register("GSV", |s| Gsv::parse(s).map(Message::Gsv))
            .register("HDM", |s| Hdm::parse(s).map(Message::Hdm))
            .register("RMC", |s| Rmc::parse(s).map(Message::Rmc))
    }

    /// Registers a parser, replacing any previous one for the same id
    pub fn register<S: AsRef<str>>(mut self, id: S, parser: ParseFn) -> Self {
        self.parsers.insert(id.as_ref().to_string(), parser);
        self
    }

    /// Returns the parser for a sentence id
    pub fn get(&self, id: &str) -> Option<ParseFn> {
        self.parsers.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parsers.contains_key(id)
    }

    /// Registered sentence ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }
}

/// A validated sentence together with its typed record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    pub sentence: Sentence,
    pub message: Message,
}

/// Line decoder with a fixed parser registry
#[derive(Debug, Clone)]
pub struct Decoder {
    registry: ParserRegistry,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new(ParserRegistry::standard())
    }
}

impl Decoder {
    pub fn new(registry: ParserRegistry) -> Self {
        Decoder { registry }
    }

    /// Decodes one line
    ///
    /// # Errors
    /// * `FramingError` - the line is not a sentence
    /// * `ChecksumMismatch` - the declared checksum is wrong
    /// * `UnsupportedSentenceType` - no parser is registered for the id
    /// * `DataFormatError` - a field value has the wrong type
    pub fn decode(&self, line: &str) -> Result<Decoded> {
        let sentence = Sentence::parse(line)?;
        let message = self.parse(&sentence)?;
        Ok(Decoded { sentence, message })
    }

    /// Dispatches an already validated sentence to its parser
    pub fn parse(&self, sentence: &Sentence) -> Result<Message> {
        let parser = self
            .registry
            .get(sentence.id())
            .ok_or_else(|| NmeaError::UnsupportedSentenceType(sentence.id().to_string()))?;
        parser(sentence)
    }

    /// Returns true if sentences with this id can be parsed
    pub fn is_supported(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dispatch() {
        let decoder = Decoder::default();
        let decoded = decoder
            .decode("$GPGSA,A,3,02,,,07,,09,24,26,,,,,1.6,1.6,1.0*3D")
            .unwrap();
        assert_eq!(decoded.sentence.id(), "GSA");
        assert!(matches!(decoded.message, Message::Gsa(_)));

        let decoded = decoder.decode("$GPHDM,90.0,M").unwrap();
        assert_eq!(decoded.message, Message::Hdm(Hdm { heading: 90.0 }));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let decoder = Decoder::default();
        let line = "$GPRMC,120044.567,A,6011.552,N,02501.941,E,000.0,360.0,160705,006.1,E,A*0B";
        assert_eq!(decoder.decode(line).unwrap(), decoder.decode(line).unwrap());
    }

    #[test]
    fn test_decode_errors() {
        let decoder = Decoder::default();
        assert!(matches!(
            decoder.decode("hello world"),
            Err(NmeaError::FramingError(_))
        ));
        assert!(matches!(
            decoder.decode("$GPGSA,A,3,02,,,07,,09,24,26,,,,,1.6,1.6,1.0*3C"),
            Err(NmeaError::ChecksumMismatch { .. })
        ));
        match decoder.decode("$GPXTE,A,A,0.67,L,N") {
            Err(NmeaError::UnsupportedSentenceType(id)) => assert_eq!(id, "XTE"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            decoder.decode("$GPHDM,north,M"),
            Err(NmeaError::DataFormatError { field: "heading", .. })
        ));
    }

    #[test]
    fn test_custom_registry() {
        let registry = ParserRegistry::new().register("XTE", |_| Ok(Message::Other));
        let decoder = Decoder::new(registry);
        assert!(decoder.is_supported("XTE"));
        assert!(!decoder.is_supported("GSA"));
        assert_eq!(
            decoder.decode("$GPXTE,A,A,0.67,L,N").unwrap().message,
            Message::Other
        );
        assert_eq!(decoder.registry().ids().collect::<Vec<_>>(), ["XTE"]);
    }
}
