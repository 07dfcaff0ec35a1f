use serde::Serialize;
use serde_repr::Serialize_repr;

use crate::{Result, protocol::Sentence};

/// GSA fix type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr)]
#[repr(u8)]
pub enum GpsFixType {
    NoFix = 1,
    Fix2D = 2,
    Fix3D = 3,
}

impl std::str::FromStr for GpsFixType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1" => Ok(GpsFixType::NoFix),
            "2" => Ok(GpsFixType::Fix2D),
            "3" => Ok(GpsFixType::Fix3D),
            _ => Err(format!("invalid fix type: {s}")),
        }
    }
}

/// GGA fix quality indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr)]
#[repr(u8)]
pub enum GpsFixQuality {
    Invalid = 0,
    Normal = 1,
    /// with DGPS
    Dgps = 2,
    Pps = 3,
    /// with RTK Fixed
    Rtk = 4,
    /// with RTK Float
    FloatRtk = 5,
    /// dead reckoning
    Estimated = 6,
    Manual = 7,
    Simulated = 8,
}

impl std::str::FromStr for GpsFixQuality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "0" => Ok(GpsFixQuality::Invalid),
            "1" => Ok(GpsFixQuality::Normal),
            "2" => Ok(GpsFixQuality::Dgps),
            "3" => Ok(GpsFixQuality::Pps),
            "4" => Ok(GpsFixQuality::Rtk),
            "5" => Ok(GpsFixQuality::FloatRtk),
            "6" => Ok(GpsFixQuality::Estimated),
            "7" => Ok(GpsFixQuality::Manual),
            "8" => Ok(GpsFixQuality::Simulated),
            _ => Err(format!("invalid fix quality: {s}")),
        }
    }
}

/// RMC data status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataStatus {
    Active,
    Void,
}

impl std::str::FromStr for DataStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "A" => Ok(DataStatus::Active),
            "V" => Ok(DataStatus::Void),
            _ => Err(format!("invalid data status: {s}")),
        }
    }
}

/// GSA satellite selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SelectionMode {
    Automatic,
    Manual,
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "A" => Ok(SelectionMode::Automatic),
            "M" => Ok(SelectionMode::Manual),
            _ => Err(format!("invalid selection mode: {s}")),
        }
    }
}

/// FAA mode indicator (NMEA 2.3 and later)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FaaMode {
    Autonomous,
    Differential,
    Estimated,
    Float,
    Manual,
    None,
    Precise,
    Rtk,
    Simulated,
}

impl std::str::FromStr for FaaMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "A" => Ok(FaaMode::Autonomous),
            "D" => Ok(FaaMode::Differential),
            "E" => Ok(FaaMode::Estimated),
            "F" => Ok(FaaMode::Float),
            "M" => Ok(FaaMode::Manual),
            "N" => Ok(FaaMode::None),
            "P" => Ok(FaaMode::Precise),
            "R" => Ok(FaaMode::Rtk),
            "S" => Ok(FaaMode::Simulated),
            _ => Err(format!("invalid FAA mode: {s}")),
        }
    }
}

/// Geographic position in signed decimal degrees (positive = North/East)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Reads `lat,N|S,lon,E|W` starting at field `index`
    ///
    /// Returns `Ok(None)` if any of the four fields is empty.
    pub fn from_fields(sentence: &Sentence, index: usize) -> Result<Option<Position>> {
        let latitude = coordinate(sentence, index, "latitude", 'N', 'S', 90.0)?;
        let longitude = coordinate(sentence, index + 2, "longitude", 'E', 'W', 180.0)?;

        Ok(latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Position {
                latitude,
                longitude,
            }))
    }
}

/// Converts a `[d]ddmm.mmmm` value and its hemisphere into decimal degrees
fn coordinate(
    sentence: &Sentence,
    index: usize,
    name: &'static str,
    positive: char,
    negative: char,
    limit: f64,
) -> Result<Option<f64>> {
    let Some(value) = sentence.parse_field::<f64>(index, name)? else {
        return Ok(None);
    };
    let Some(hemisphere) = sentence.parse_field::<char>(index + 1, name)? else {
        return Ok(None);
    };

    let degrees = (value / 100.0).trunc();
    let minutes = value - degrees * 100.0;
    if !(0.0..60.0).contains(&minutes) {
        return Err(sentence.format_error(name, format!("invalid minutes in {value}")));
    }

    let decimal = degrees + minutes / 60.0;
    if decimal > limit {
        return Err(sentence.format_error(name, format!("out of range: {decimal}")));
    }

    match hemisphere {
        h if h == positive => Ok(Some(decimal)),
        h if h == negative => Ok(Some(-decimal)),
        h => Err(sentence.format_error(name, format!("invalid hemisphere: {h}"))),
    }
}

/// Satellite in view, as reported in GSV sentences
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SatelliteInfo {
    /// Satellite id (PRN)
    pub id: String,
    /// Elevation in degrees, 0-90
    pub elevation: Option<i32>,
    /// Azimuth in degrees from true north, 0-359
    pub azimuth: Option<i32>,
    /// Signal-to-noise ratio in dB-Hz
    pub noise: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_fields() {
        let s = Sentence::parse("$GPGLL,6011.552,N,02501.941,E,120045,A").unwrap();
        let pos = Position::from_fields(&s, 0).unwrap().unwrap();
        assert!((pos.latitude - 60.1925333).abs() < 1e-6);
        assert!((pos.longitude - 25.0323500).abs() < 1e-6);

        let s = Sentence::parse("$GPGLL,3345.000,S,07030.000,W,120045,A").unwrap();
        let pos = Position::from_fields(&s, 0).unwrap().unwrap();
        assert_eq!(pos.latitude, -33.75);
        assert_eq!(pos.longitude, -70.5);
    }

    #[test]
    fn test_position_missing_or_invalid() {
        let s = Sentence::parse("$GPGLL,,,,,120045,V").unwrap();
        assert_eq!(Position::from_fields(&s, 0).unwrap(), None);

        let s = Sentence::parse("$GPGLL,6011.552,X,02501.941,E,120045,A").unwrap();
        assert!(Position::from_fields(&s, 0).is_err());

        let s = Sentence::parse("$GPGLL,6075.000,N,02501.941,E,120045,A").unwrap();
        assert!(Position::from_fields(&s, 0).is_err());
    }

    #[test]
    fn test_enum_codes() {
        assert_eq!("3".parse::<GpsFixType>(), Ok(GpsFixType::Fix3D));
        assert_eq!("2".parse::<GpsFixQuality>(), Ok(GpsFixQuality::Dgps));
        assert_eq!("V".parse::<DataStatus>(), Ok(DataStatus::Void));
        assert_eq!("M".parse::<SelectionMode>(), Ok(SelectionMode::Manual));
        assert_eq!("R".parse::<FaaMode>(), Ok(FaaMode::Rtk));
        assert!("9".parse::<GpsFixQuality>().is_err());
        assert_eq!(serde_json::to_string(&GpsFixType::Fix2D).unwrap(), "2");
    }
}
