//! Composite event providers
//!
//! An [`AggregationEngine`] buffers sentence events of interest in a window
//! and asks its [`AggregationPolicy`] when the window holds a complete,
//! consistent group. Ready windows are composed into one event, published to
//! the engine's listeners, and cleared.
//!
//! The engine is a [`SentenceListener`], so it is usually registered on a
//! reader and runs on the reader's thread or task:
//!
//! ```no_run
//! use nmea_stream::provider::{AggregationEngine, satellite::SatelliteInfoPolicy};
//! use nmea_stream::reader::blocking::{LineReader, SentenceReader};
//!
//! let mut engine = AggregationEngine::new(SatelliteInfoPolicy);
//! engine.add_listener(|event| println!("{} satellites in view", event.satellites.len()));
//!
//! let mut reader = SentenceReader::new(LineReader::from_read(std::io::stdin()));
//! reader.add_listener(engine);
//! reader.run();
//! ```

use std::collections::HashSet;

use tracing::{trace, warn};

use crate::{
    Result,
    reader::{ReaderEvent, SentenceEvent, SentenceListener},
};

/// Fix data from RMC and GGA
pub mod position;
/// Satellites in view from GSA and GSV
pub mod satellite;

/// Domain rules of an aggregation engine
///
/// Predicates see the window in arrival order and must not fail; a window
/// they cannot judge yet is simply not ready.
pub trait AggregationPolicy: Send {
    /// Composite event type
    type Output: Send;

    /// Sentence ids buffered by the engine; read once at construction
    fn sentence_ids(&self) -> &[&'static str];

    /// Returns false if the window can never become a consistent event
    fn is_valid(&self, window: &[SentenceEvent]) -> bool {
        let _ = window;
        true
    }

    /// Returns true if the window holds a complete group
    fn is_ready(&self, window: &[SentenceEvent]) -> bool;

    /// Builds the composite event from a ready window
    fn compose(&self, window: &[SentenceEvent]) -> Result<Self::Output>;
}

type CompositeListener<T> = Box<dyn FnMut(&T) + Send>;

/// Generic sentence window driven by a policy
pub struct AggregationEngine<P: AggregationPolicy> {
    policy: P,
    interest: HashSet<String>,
    window: Vec<SentenceEvent>,
    listeners: Vec<CompositeListener<P::Output>>,
}

impl<P: AggregationPolicy> AggregationEngine<P> {
    pub fn new(policy: P) -> Self {
        let interest = policy
            .sentence_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        AggregationEngine {
            policy,
            interest,
            window: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Registers a listener for composite events
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&P::Output) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns true if sentences with this id are buffered
    pub fn is_interested(&self, id: &str) -> bool {
        self.interest.contains(id)
    }

    /// Number of buffered sentence events
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Discards the buffered sentence events
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Feeds one sentence event through the window
    pub fn accept(&mut self, event: &SentenceEvent) {
        if !self.is_interested(event.id()) {
            return;
        }
        self.window.push(event.clone());

        if !self.policy.is_valid(&self.window) {
            trace!(len = self.window.len(), "discarding inconsistent window");
            self.window.clear();
            return;
        }
        if !self.policy.is_ready(&self.window) {
            return;
        }

        match self.policy.compose(&self.window) {
            Ok(output) => {
                for listener in self.listeners.iter_mut() {
                    listener(&output);
                }
            }
            Err(err) => warn!(len = self.window.len(), "composite event dropped: {err}"),
        }
        self.window.clear();
    }
}

impl<P: AggregationPolicy> SentenceListener for AggregationEngine<P> {
    fn on_event(&mut self, event: &ReaderEvent) {
        match event {
            ReaderEvent::Sentence(sentence) => self.accept(sentence),
            // A group never spans a gap in the stream
            ReaderEvent::Started | ReaderEvent::Paused | ReaderEvent::Stopped => self.reset(),
            ReaderEvent::Data(_) | ReaderEvent::Error(_) => {}
        }
    }
}

impl<P: AggregationPolicy + std::fmt::Debug> std::fmt::Debug for AggregationEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("policy", &self.policy)
            .field("window", &self.window.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
