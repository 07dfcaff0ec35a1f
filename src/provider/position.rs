use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use super::AggregationPolicy;
use crate::{
    Result,
    error::NmeaError,
    protocol::{
        message::{Gga, Message, Rmc},
        types::{DataStatus, FaaMode, GpsFixQuality, Position},
    },
    reader::SentenceEvent,
};

/// Position fix combined from RMC and GGA
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEvent {
    /// Time of the last sentence in the group
    pub timestamp: DateTime<Utc>,
    pub position: Position,
    /// Altitude above mean sea level in meters
    pub altitude: Option<f64>,
    /// UTC time of the fix
    pub time: Option<NaiveTime>,
    pub date: Option<NaiveDate>,
    /// Speed over ground in knots
    pub speed: Option<f64>,
    /// Course over ground in degrees true
    pub course: Option<f64>,
    pub fix_quality: GpsFixQuality,
    pub mode: Option<FaaMode>,
}

/// Groups RMC and GGA sentences of the same fix into [`PositionEvent`]s
///
/// The window is ready once its latest RMC and latest GGA report the same
/// fix time, so a stream that starts mid-epoch or drops a sentence realigns
/// on the next complete pair. A window is discarded when it contains a void
/// RMC, a GGA without fix, or sentences from more than two fix times.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionPolicy;

/// Fix times a window may span: the pending epoch and the current one
const MAX_FIX_TIMES: usize = 2;

fn fix_time(message: &Message) -> Option<Option<NaiveTime>> {
    match message {
        Message::Rmc(rmc) => Some(rmc.time),
        Message::Gga(gga) => Some(gga.time),
        _ => None,
    }
}

fn latest<'a, T>(
    window: &'a [SentenceEvent],
    select: impl Fn(&'a Message) -> Option<&'a T>,
) -> Option<&'a T> {
    window.iter().rev().find_map(|e| select(&e.message))
}

fn as_rmc(message: &Message) -> Option<&Rmc> {
    match message {
        Message::Rmc(rmc) => Some(rmc),
        _ => None,
    }
}

fn as_gga(message: &Message) -> Option<&Gga> {
    match message {
        Message::Gga(gga) => Some(gga),
        _ => None,
    }
}

impl AggregationPolicy for PositionPolicy {
    type Output = PositionEvent;

    fn sentence_ids(&self) -> &[&'static str] {
        &["GGA", "RMC"]
    }

    fn is_valid(&self, window: &[SentenceEvent]) -> bool {
        let mut times: Vec<Option<NaiveTime>> = Vec::with_capacity(MAX_FIX_TIMES);

        for event in window {
            match &event.message {
                Message::Rmc(rmc) if rmc.status == DataStatus::Void => return false,
                Message::Gga(gga) if gga.fix_quality == GpsFixQuality::Invalid => return false,
                _ => {}
            }
            if let Some(time) = fix_time(&event.message) {
                if !times.contains(&time) {
                    times.push(time);
                }
            }
        }
        times.len() <= MAX_FIX_TIMES
    }

    fn is_ready(&self, window: &[SentenceEvent]) -> bool {
        match (latest(window, as_rmc), latest(window, as_gga)) {
            (Some(rmc), Some(gga)) => rmc.time == gga.time,
            _ => false,
        }
    }

    fn compose(&self, window: &[SentenceEvent]) -> Result<PositionEvent> {
        let (Some(rmc), Some(gga)) = (latest(window, as_rmc), latest(window, as_gga)) else {
            return Err(NmeaError::ProtocolError("position group without RMC and GGA"));
        };
        if rmc.time != gga.time {
            return Err(NmeaError::ProtocolError("position group with mismatched fix times"));
        }
        let position = rmc
            .position
            .or(gga.position)
            .ok_or(NmeaError::ProtocolError("position group without coordinates"))?;

        Ok(PositionEvent {
            timestamp: window.last().map_or_else(Utc::now, |e| e.timestamp),
            position,
            altitude: gga.altitude,
            time: rmc.time.or(gga.time),
            date: rmc.date,
            speed: rmc.speed,
            course: rmc.course,
            fix_quality: gga.fix_quality,
            mode: rmc.mode,
        })
    }
}

/// Engine emitting [`PositionEvent`]s
pub type PositionProvider = super::AggregationEngine<PositionPolicy>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AggregationEngine, tests::event};
    use std::sync::{Arc, Mutex};

    const RMC: &str =
        "$GPRMC,120044.567,A,6011.552,N,02501.941,E,000.0,360.0,160705,006.1,E,A*0B";
    const GGA: &str =
        "$GPGGA,120044.567,6011.552,N,02501.941,E,1,00,2.0,28.0,M,19.6,M,,0000*63";

    fn provider() -> (Arc<Mutex<Vec<PositionEvent>>>, PositionProvider) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        let mut engine = AggregationEngine::new(PositionPolicy);
        engine.add_listener(move |e: &PositionEvent| sink.lock().unwrap().push(e.clone()));
        (out, engine)
    }

    #[test]
    fn test_position_composed() {
        let (out, mut engine) = provider();
        engine.accept(&event(RMC));
        assert!(out.lock().unwrap().is_empty());
        engine.accept(&event(GGA));

        let out = out.lock().unwrap();
        assert_eq!(out.len(), 1);
        let fix = &out[0];
        assert!((fix.position.latitude - 60.1925333).abs() < 1e-6);
        assert_eq!(fix.altitude, Some(28.0));
        assert_eq!(fix.time, NaiveTime::from_hms_milli_opt(12, 0, 44, 567));
        assert_eq!(fix.date, NaiveDate::from_ymd_opt(2005, 7, 16));
        assert_eq!(fix.fix_quality, GpsFixQuality::Normal);
        assert_eq!(fix.mode, Some(FaaMode::Autonomous));
    }

    #[test]
    fn test_position_discards_void_fix() {
        let (out, mut engine) = provider();
        engine.accept(&event("$GPRMC,120044.567,V,,,,,,,160705,,"));
        assert_eq!(engine.window_len(), 0);
        engine.accept(&event(
            "$GPGGA,120044.567,6011.552,N,02501.941,E,0,00,2.0,28.0,M,19.6,M,,0000",
        ));
        assert_eq!(engine.window_len(), 0);
        assert!(out.lock().unwrap().is_empty());
    }

    fn rmc_at(time: &str) -> SentenceEvent {
        event(&format!(
            "$GPRMC,{time},A,6011.552,N,02501.941,E,000.0,360.0,160705,006.1,E,A"
        ))
    }

    fn gga_at(time: &str) -> SentenceEvent {
        event(&format!(
            "$GPGGA,{time},6011.552,N,02501.941,E,1,00,2.0,28.0,M,19.6,M,,0000"
        ))
    }

    fn times(out: &[PositionEvent]) -> Vec<String> {
        out.iter()
            .filter_map(|e| e.time)
            .map(|t| t.format("%H%M%S").to_string())
            .collect()
    }

    #[test]
    fn test_position_mid_epoch_start() {
        let (out, mut engine) = provider();
        engine.accept(&gga_at("120000"));
        for time in ["120001", "120002", "120003", "120004", "120005"] {
            engine.accept(&rmc_at(time));
            engine.accept(&gga_at(time));
        }

        assert_eq!(
            times(&out.lock().unwrap()),
            ["120001", "120002", "120003", "120004", "120005"]
        );
        assert_eq!(engine.window_len(), 0);
    }

    #[test]
    fn test_position_dropped_sentences() {
        let (out, mut engine) = provider();
        // GGA of 120000 lost
        engine.accept(&rmc_at("120000"));
        engine.accept(&rmc_at("120001"));
        engine.accept(&gga_at("120001"));
        // RMC of 120002 lost
        engine.accept(&gga_at("120002"));
        engine.accept(&rmc_at("120003"));
        engine.accept(&gga_at("120003"));

        assert_eq!(times(&out.lock().unwrap()), ["120001", "120003"]);
    }

    #[test]
    fn test_position_window_bounded() {
        let policy = PositionPolicy;
        let window = [rmc_at("120000"), rmc_at("120001"), rmc_at("120002")];
        assert!(policy.is_valid(&window[..2]));
        assert!(!policy.is_ready(&window[..2]));
        assert!(!policy.is_valid(&window));

        let (_, mut engine) = provider();
        for time in ["120000", "120001", "120002", "120003", "120004"] {
            engine.accept(&rmc_at(time));
            assert!(engine.window_len() <= MAX_FIX_TIMES);
        }
    }

    #[test]
    fn test_position_requires_matching_pair() {
        let policy = PositionPolicy;
        let window = [gga_at("120000"), rmc_at("120001")];
        assert!(policy.is_valid(&window));
        assert!(!policy.is_ready(&window));
        assert!(matches!(
            policy.compose(&window),
            Err(NmeaError::ProtocolError(_))
        ));
    }
}
