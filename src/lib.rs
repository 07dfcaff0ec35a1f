//! # nmea-stream
//!
//! A Rust library for decoding NMEA 0183 sentence streams from GPS receivers
//! and other marine instruments.
//!
//! ## Overview
//!
//! NMEA 0183 devices emit one ASCII sentence per line, e.g.
//! `$GPGSA,A,3,02,,,07,,09,24,26,,,,,1.6,1.6,1.0*3D`: a `$` or `!`, a talker
//! and sentence id, comma separated fields and an optional XOR checksum.
//!
//! This library is built from three layers:
//!
//! - [`protocol`]: sentence framing, checksum validation and typed records
//!   for GGA, GSA, GSV, HDM and RMC, dispatched through a parser registry.
//! - [`reader`]: an ingestion loop that reads lines from a source, decodes
//!   them and publishes sentence, raw data, error and lifecycle events. It
//!   runs on a tokio task or, in [`reader::blocking`], on its own thread.
//! - [`provider`]: aggregation engines that buffer related sentences and
//!   publish composite events, such as all satellites in view.
//!
//! ## Example
//!
//! ```no_run
//! use nmea_stream::reader::{ReaderEvent, blocking::{LineReader, SentenceReader}};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = std::fs::File::open("/dev/ttyUSB0")?;
//!     let mut reader = SentenceReader::new(LineReader::from_read(port));
//!
//!     reader.add_listener(|event: &ReaderEvent| match event {
//!         ReaderEvent::Sentence(s) => println!("{}: {:?}", s.id(), s.message),
//!         ReaderEvent::Error(err) => eprintln!("{err}"),
//!         _ => {}
//!     });
//!
//!     let handle = reader.start()?;
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     handle.stop();
//!     handle.join();
//!     Ok(())
//! }
//! ```

use crate::error::NmeaError;

/// Error types used throughout the library
pub mod error;

/// Sentence framing, typed records and decoding
pub mod protocol;

/// Composite events built from groups of sentences
pub mod provider;

/// Stream ingestion loops and listener fan-out
pub mod reader;

/// Convenience type alias for Results with NmeaError
pub type Result<T> = core::result::Result<T, NmeaError>;
