//! Typed NMEA sentence records
//!
//! Each record is built from a validated [`Sentence`] by a parser function
//! registered in the [`ParserRegistry`](super::decoder::ParserRegistry).
//! Parsers check field types eagerly: a value that cannot be coerced is
//! reported as a `DataFormatError` instead of being dropped silently.
//!
//! Field positions follow NMEA 0183 v4.11.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use super::{Sentence, types::*};
use crate::Result;

/// Global Positioning System fix data (GGA)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gga {
    /// UTC time of the fix
    pub time: Option<NaiveTime>,
    pub position: Option<Position>,
    pub fix_quality: GpsFixQuality,
    /// Number of satellites in use
    pub satellites_in_use: Option<u32>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Antenna altitude above mean sea level in meters
    pub altitude: Option<f64>,
    /// Height of the geoid above the WGS84 ellipsoid in meters
    pub geoid_separation: Option<f64>,
    /// Age of DGPS corrections in seconds
    pub dgps_age: Option<f64>,
    pub dgps_station: Option<String>,
}

impl Gga {
    pub fn parse(s: &Sentence) -> Result<Self> {
        Ok(Gga {
            time: parse_time(s, 0)?,
            position: Position::from_fields(s, 1)?,
            fix_quality: s.require_field(5, "fix_quality")?,
            satellites_in_use: s.parse_field(6, "satellites_in_use")?,
            hdop: s.parse_field(7, "hdop")?,
            altitude: s.parse_field(8, "altitude")?,
            geoid_separation: s.parse_field(10, "geoid_separation")?,
            dgps_age: s.parse_field(12, "dgps_age")?,
            dgps_station: s.field(13).map(str::to_string),
        })
    }
}

/// GNSS DOP and active satellites (GSA)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gsa {
    pub mode: SelectionMode,
    pub fix_type: GpsFixType,
    /// Ids of the satellites used in the solution
    pub satellite_ids: Vec<String>,
    /// Position dilution of precision
    pub pdop: Option<f64>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Vertical dilution of precision
    pub vdop: Option<f64>,
    /// GNSS system id (NMEA 4.10 and later)
    pub system_id: Option<u8>,
}

impl Gsa {
    /// Number of satellite id slots in a GSA sentence
    pub const SATELLITE_SLOTS: usize = 12;

    pub fn parse(s: &Sentence) -> Result<Self> {
        let first = 2;
        let last = first + Self::SATELLITE_SLOTS;
        let satellite_ids = (first..last)
            .filter_map(|idx| s.field(idx))
            .map(str::to_string)
            .collect();

        Ok(Gsa {
            mode: s.require_field(0, "mode")?,
            fix_type: s.require_field(1, "fix_type")?,
            satellite_ids,
            pdop: s.parse_field(last, "pdop")?,
            hdop: s.parse_field(last + 1, "hdop")?,
            vdop: s.parse_field(last + 2, "vdop")?,
            system_id: s.parse_field(last + 3, "system_id")?,
        })
    }
}

/// GNSS satellites in view (GSV)
///
/// A full satellite picture is spread over `sentence_count` consecutive GSV
/// sentences with `sentence_index` running from 1 to `sentence_count`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gsv {
    /// Total number of sentences in this group
    pub sentence_count: u32,
    /// One-based index of this sentence within the group
    pub sentence_index: u32,
    /// Total number of satellites in view
    pub satellite_count: u32,
    /// Up to four satellites
    pub satellites: Vec<SatelliteInfo>,
}

impl Gsv {
    pub fn parse(s: &Sentence) -> Result<Self> {
        let mut satellites = Vec::with_capacity(4);
        let mut idx = 3;
        // A trailing odd field is the NMEA 4.10 signal id
        while idx + 3 < s.field_count() {
            if let Some(id) = s.field(idx) {
                satellites.push(SatelliteInfo {
                    id: id.to_string(),
                    elevation: s.parse_field(idx + 1, "elevation")?,
                    azimuth: s.parse_field(idx + 2, "azimuth")?,
                    noise: s.parse_field(idx + 3, "noise")?,
                });
            }
            idx += 4;
        }

        Ok(Gsv {
            sentence_count: s.require_field(0, "sentence_count")?,
            sentence_index: s.require_field(1, "sentence_index")?,
            satellite_count: s.require_field(2, "satellite_count")?,
            satellites,
        })
    }

    /// Returns true if this is the first sentence of its group
    pub fn is_first(&self) -> bool {
        self.sentence_index == 1
    }

    /// Returns true if this is the last sentence of its group
    pub fn is_last(&self) -> bool {
        self.sentence_index == self.sentence_count
    }

    /// Returns true if index and count describe a possible group position
    pub fn is_consistent(&self) -> bool {
        self.sentence_count > 0
            && self.sentence_index > 0
            && self.sentence_index <= self.sentence_count
    }
}

/// Heading, magnetic (HDM)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hdm {
    /// Heading in degrees relative to magnetic north
    pub heading: f64,
}

impl Hdm {
    pub fn parse(s: &Sentence) -> Result<Self> {
        let heading: f64 = s.require_field(0, "heading")?;
        if !(0.0..=360.0).contains(&heading) {
            return Err(s.format_error("heading", format!("out of range: {heading}")));
        }
        Ok(Hdm { heading })
    }
}

/// Recommended minimum specific GNSS data (RMC)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rmc {
    /// UTC time of the fix
    pub time: Option<NaiveTime>,
    pub status: DataStatus,
    pub position: Option<Position>,
    /// Speed over ground in knots
    pub speed: Option<f64>,
    /// Course over ground in degrees true
    pub course: Option<f64>,
    pub date: Option<NaiveDate>,
    /// Magnetic variation in degrees, negative to the west
    pub variation: Option<f64>,
    /// Mode indicator (NMEA 2.3 and later)
    pub mode: Option<FaaMode>,
}

impl Rmc {
    pub fn parse(s: &Sentence) -> Result<Self> {
        let variation = match s.parse_field::<f64>(9, "variation")? {
            Some(value) => match s.parse_field::<char>(10, "variation")? {
                Some('W') => Some(-value),
                Some('E') | None => Some(value),
                Some(h) => {
                    return Err(s.format_error("variation", format!("invalid direction: {h}")));
                }
            },
            None => None,
        };

        Ok(Rmc {
            time: parse_time(s, 0)?,
            status: s.require_field(1, "status")?,
            position: Position::from_fields(s, 2)?,
            speed: s.parse_field(6, "speed")?,
            course: s.parse_field(7, "course")?,
            date: parse_date(s, 8)?,
            variation,
            mode: s.parse_field(11, "mode")?,
        })
    }
}

/// Parsed sentence record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// GPS fix data
    Gga(Gga),
    /// DOP and active satellites
    Gsa(Gsa),
    /// Satellites in view
    Gsv(Gsv),
    /// Magnetic heading
    Hdm(Hdm),
    /// Recommended minimum data
    Rmc(Rmc),
    /// Sentence accepted by a registered parser without a typed record
    Other,
}

/// Parses `hhmmss[.sss]` UTC time
fn parse_time(s: &Sentence, index: usize) -> Result<Option<NaiveTime>> {
    s.field(index)
        .map(|value| {
            NaiveTime::parse_from_str(value, "%H%M%S%.f")
                .map_err(|e| s.format_error("time", format!("cannot parse {value:?}: {e}")))
        })
        .transpose()
}

/// Parses `ddmmyy` date
fn parse_date(s: &Sentence, index: usize) -> Result<Option<NaiveDate>> {
    s.field(index)
        .map(|value| {
            NaiveDate::parse_from_str(value, "%d%m%y")
                .map_err(|e| s.format_error("date", format!("cannot parse {value:?}: {e}")))
        })
        .transpose()
}
