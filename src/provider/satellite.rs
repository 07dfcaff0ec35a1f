use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AggregationPolicy;
use crate::{
    Result,
    error::NmeaError,
    protocol::{message::Gsa, message::Message, types::SatelliteInfo},
    reader::SentenceEvent,
};

/// Satellites in view together with the active satellite summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatelliteInfoEvent {
    /// Time of the last sentence in the group
    pub timestamp: DateTime<Utc>,
    /// First GSA of the group, holding the satellite ids of all of them
    pub gsa: Gsa,
    /// Satellites from all GSV sentences, in arrival order
    pub satellites: Vec<SatelliteInfo>,
}

/// Groups GSA and GSV sentences into [`SatelliteInfoEvent`]s
///
/// Multi-constellation receivers interleave talkers freely, e.g.
/// `GNGSA, GNGSA, GPGSV.., GLGSV..` or `GPGSV.., GLGSV.., GPGSA`, and some
/// send a single GSA for several GSV groups. A window is ready once it holds
/// at least one GSA, every GSV group that was opened has been closed, and
/// there are at least as many GSV groups as GSA sentences.
///
/// A window is discarded when a GSV group is broken: an index out of range,
/// a sentence of a group that was never opened or skips an index, or a new
/// group opened by a talker whose previous group is still open. This drops
/// the remains of a lost sentence instead of waiting for a group that will
/// never close.
#[derive(Debug, Clone, Copy, Default)]
pub struct SatelliteInfoPolicy;

/// Upper bound for one window, far above a full multi-constellation cycle
const MAX_WINDOW: usize = 64;

impl AggregationPolicy for SatelliteInfoPolicy {
    type Output = SatelliteInfoEvent;

    fn sentence_ids(&self) -> &[&'static str] {
        &["GSA", "GSV"]
    }

    fn is_valid(&self, window: &[SentenceEvent]) -> bool {
        if window.len() > MAX_WINDOW {
            return false;
        }

        // Index of the last sentence of each talker's open group
        let mut open: HashMap<&str, u32> = HashMap::new();
        for event in window {
            let Message::Gsv(gsv) = &event.message else {
                continue;
            };
            if !gsv.is_consistent() {
                return false;
            }

            let talker = event.sentence.talker();
            let expected = open.get(talker).map_or(1, |index| index + 1);
            if gsv.sentence_index != expected {
                return false;
            }
            if gsv.is_last() {
                open.remove(talker);
            } else {
                open.insert(talker, gsv.sentence_index);
            }
        }
        true
    }

    fn is_ready(&self, window: &[SentenceEvent]) -> bool {
        let mut gsa_count = 0;
        let mut first_count = 0;
        let mut last_count = 0;

        for event in window {
            match &event.message {
                Message::Gsa(_) => gsa_count += 1,
                Message::Gsv(gsv) => {
                    if !gsv.is_consistent() {
                        return false;
                    }
                    first_count += usize::from(gsv.is_first());
                    last_count += usize::from(gsv.is_last());
                }
                _ => {}
            }
        }

        gsa_count > 0 && first_count == last_count && first_count >= gsa_count
    }

    fn compose(&self, window: &[SentenceEvent]) -> Result<SatelliteInfoEvent> {
        let mut gsa: Option<Gsa> = None;
        let mut satellites = Vec::new();

        for event in window {
            match &event.message {
                Message::Gsa(next) => match gsa.as_mut() {
                    // Redundant GSAs carry per-constellation subsets
                    Some(first) => first.satellite_ids.extend_from_slice(&next.satellite_ids),
                    None => gsa = Some(next.clone()),
                },
                Message::Gsv(gsv) => satellites.extend_from_slice(&gsv.satellites),
                _ => {}
            }
        }

        let gsa = gsa.ok_or(NmeaError::ProtocolError("satellite group without GSA"))?;
        let timestamp = window.last().map_or_else(Utc::now, |e| e.timestamp);
        Ok(SatelliteInfoEvent {
            timestamp,
            gsa,
            satellites,
        })
    }
}

/// Engine emitting [`SatelliteInfoEvent`]s
pub type SatelliteInfoProvider = super::AggregationEngine<SatelliteInfoPolicy>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AggregationEngine, tests::event};
    use std::sync::{Arc, Mutex};

    const GSA_12: &str = "$GPGSA,A,3,1,2,,,,,,,,,,,1.6,1.6,1.0";
    const GSA_34: &str = "$GLGSA,A,3,3,4,,,,,,,,,,,1.6,1.6,1.0";
    const GPGSV: &str = "$GPGSV,1,1,02,1,10,100,30,2,20,200,40";
    const GLGSV: &str = "$GLGSV,1,1,02,3,30,300,35,4,40,40,45";

    fn window(lines: &[&str]) -> Vec<SentenceEvent> {
        lines.iter().map(|line| event(line)).collect()
    }

    #[test]
    fn test_ready_after_full_groups() {
        let policy = SatelliteInfoPolicy;
        let events = window(&[GPGSV, GLGSV, GSA_12]);
        assert!(!policy.is_ready(&events[..1]));
        assert!(!policy.is_ready(&events[..2]));
        assert!(policy.is_ready(&events));
    }

    #[test]
    fn test_ready_single_gsa_for_two_groups() {
        let policy = SatelliteInfoPolicy;
        assert!(policy.is_ready(&window(&[GSA_12, GPGSV])));
        assert!(policy.is_ready(&window(&[GSA_12, GPGSV, GLGSV])));
        assert!(!policy.is_ready(&window(&[GSA_12, GSA_34, GPGSV])));
    }

    #[test]
    fn test_ready_waits_for_open_group() {
        let policy = SatelliteInfoPolicy;
        let events = window(&[
            GSA_12,
            "$GPGSV,2,1,05,1,10,100,30,2,20,200,40,5,50,50,50,6,60,60,60",
        ]);
        assert!(!policy.is_ready(&events));

        let mut events = events;
        events.push(event("$GPGSV,2,2,05,7,70,70,20"));
        assert!(policy.is_ready(&events));
    }

    #[test]
    fn test_ready_rejects_inconsistent_group() {
        let policy = SatelliteInfoPolicy;
        let events = window(&[GSA_12, "$GPGSV,1,2,02,1,10,100,30"]);
        assert!(!policy.is_ready(&events));
        let events = window(&[GSA_12, "$GPGSV,0,0,00"]);
        assert!(!policy.is_ready(&events));
    }

    #[test]
    fn test_valid_rejects_broken_group() {
        let policy = SatelliteInfoPolicy;
        let open = "$GPGSV,2,1,05,1,10,100,30,2,20,200,40,5,50,50,50,6,60,60,60";
        let close = "$GPGSV,2,2,05,7,70,70,20";

        assert!(policy.is_valid(&window(&[GSA_12, open, GLGSV, close])));
        // closing sentence lost, next group opens
        assert!(!policy.is_valid(&window(&[GSA_12, open, GSA_12, open])));
        // group joined halfway
        assert!(!policy.is_valid(&window(&[close])));
        assert!(!policy.is_valid(&window(&[GSA_12, "$GPGSV,1,2,02,1,10,100,30"])));
    }

    #[test]
    fn test_engine_resumes_after_lost_group_end() {
        let out = Arc::new(Mutex::new(0));
        let sink = out.clone();
        let mut engine = AggregationEngine::new(SatelliteInfoPolicy);
        engine.add_listener(move |_: &SatelliteInfoEvent| *sink.lock().unwrap() += 1);

        let open = "$GPGSV,2,1,05,1,10,100,30,2,20,200,40,5,50,50,50,6,60,60,60";
        let close = "$GPGSV,2,2,05,7,70,70,20";
        engine.accept(&event(GSA_12));
        engine.accept(&event(open));
        for _ in 0..100 {
            for line in [GSA_12, open, close] {
                engine.accept(&event(line));
            }
        }

        // the first full cycle is spent resynchronising
        assert_eq!(*out.lock().unwrap(), 99);
        assert_eq!(engine.window_len(), 0);
    }

    #[test]
    fn test_window_bounded_without_gsa() {
        let mut engine = AggregationEngine::new(SatelliteInfoPolicy);
        for _ in 0..200 {
            engine.accept(&event(GPGSV));
            assert!(engine.window_len() <= MAX_WINDOW);
        }
    }

    #[test]
    fn test_engine_merges_gsa() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        let mut engine = AggregationEngine::new(SatelliteInfoPolicy);
        engine.add_listener(move |e: &SatelliteInfoEvent| sink.lock().unwrap().push(e.clone()));

        for line in [GSA_12, GSA_34, GPGSV] {
            engine.accept(&event(line));
        }
        assert!(out.lock().unwrap().is_empty());
        engine.accept(&event(GLGSV));

        let out = out.lock().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].gsa.satellite_ids, ["1", "2", "3", "4"]);
        let ids: Vec<_> = out[0].satellites.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
        assert_eq!(engine.window_len(), 0);
    }

    #[test]
    fn test_compose_without_gsa() {
        let policy = SatelliteInfoPolicy;
        assert!(matches!(
            policy.compose(&window(&[GPGSV])),
            Err(NmeaError::ProtocolError(_))
        ));
    }
}
