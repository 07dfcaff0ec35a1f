//! Sentence stream ingestion
//!
//! A reader owns a line source and runs a loop that reads one line at a time,
//! decodes it and publishes the outcome to registered listeners:
//!
//! - a valid sentence becomes a [`ReaderEvent::Sentence`],
//! - a line that is not a sentence at all becomes [`ReaderEvent::Data`],
//! - a sentence with a wrong checksum becomes a [`ReaderEvent::Error`] and
//!   reading continues at once,
//! - any other decode failure or a read failure becomes a
//!   [`ReaderEvent::Error`], after which the loop waits for the configured
//!   retry interval before reading again.
//!
//! The loop ends when the source reports end of stream or when
//! [`StopHandle::stop`] is called. The stop flag is checked between
//! iterations only: a read that is blocked waiting for input delays the exit
//! until it returns. [`ReaderEvent::Stopped`] is always the last event a
//! reader publishes.
//!
//! This module provides the async reader for the tokio runtime. For a
//! dedicated-thread reader, see the `blocking` submodule.
//!
//! # Example
//!
//! ```no_run
//! use nmea_stream::reader::{LineReader, ReaderEvent, SentenceReader};
//!
//! # async fn example(stream: tokio::net::TcpStream) {
//! let mut reader = SentenceReader::new(LineReader::from_tokio(stream));
//! reader.add_listener(|event: &ReaderEvent| {
//!     if let ReaderEvent::Sentence(sentence) = event {
//!         println!("{:?}", sentence.message);
//!     }
//! });
//!
//! let task = reader.spawn();
//! // ...
//! task.stop();
//! # }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{debug, info, trace, warn};

use crate::{
    Result,
    error::NmeaError,
    protocol::{
        Sentence,
        decoder::{Decoded, Decoder},
        message::Message,
    },
    reader::monitor::{Activity, ActivityMonitor},
};

/// Blocking (thread based) reader implementation
pub mod blocking;
/// Stall detection
pub mod monitor;

/// Default wait after a failed read or decode
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

/// Default source name attached to sentence events
pub const DEFAULT_SOURCE: &str = "nmea";

/// Configuration of a sentence reader
///
/// Loadable from JSON, where both intervals are given in milliseconds:
///
/// ```
/// # use nmea_stream::reader::ReaderOptions;
/// let opts = ReaderOptions::from_json(r#"{"source": "gps0", "retry_interval_ms": 250}"#).unwrap();
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    source: String,
    #[serde(rename = "retry_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    retry_interval: Duration,
    #[serde(rename = "stall_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    stall_timeout: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            source: DEFAULT_SOURCE.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            stall_timeout: monitor::DEFAULT_STALL_TIMEOUT,
        }
    }
}

impl ReaderOptions {
    /// Parses options from a JSON object; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the name reported as the source of sentence events
    pub fn source<S: AsRef<str>>(mut self, source: S) -> Self {
        self.source = source.as_ref().into();
        self
    }

    /// Sets the wait after a failed read or decode
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the time without decoded sentences after which the reader
    /// reports [`ReaderEvent::Paused`]
    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }
}

/// A decoded sentence as delivered to listeners
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceEvent {
    /// Name of the reader that decoded the sentence
    pub source: String,
    /// Time the sentence was decoded
    pub timestamp: DateTime<Utc>,
    pub sentence: Sentence,
    pub message: Message,
}

impl SentenceEvent {
    pub fn new<S: AsRef<str>>(source: S, decoded: Decoded) -> Self {
        SentenceEvent {
            source: source.as_ref().into(),
            timestamp: Utc::now(),
            sentence: decoded.sentence,
            message: decoded.message,
        }
    }

    /// Sentence identifier, e.g. `GSV`
    pub fn id(&self) -> &str {
        self.sentence.id()
    }
}

/// Notification published by a reader
#[derive(Debug)]
pub enum ReaderEvent {
    /// Sentences are flowing: first decoded sentence after start or stall
    Started,
    /// No sentence was decoded within the stall timeout
    Paused,
    /// The loop has exited; no further events follow
    Stopped,
    /// A sentence was decoded
    Sentence(SentenceEvent),
    /// A line that is not a sentence
    Data(String),
    /// A read or decode failure
    Error(NmeaError),
}

/// Receiver of reader events
///
/// Listeners are called synchronously on the reader's thread or task, in
/// registration order. Any `FnMut(&ReaderEvent)` closure is a listener.
pub trait SentenceListener: Send {
    fn on_event(&mut self, event: &ReaderEvent);
}

impl<F> SentenceListener for F
where
    F: FnMut(&ReaderEvent) + Send,
{
    fn on_event(&mut self, event: &ReaderEvent) {
        self(event)
    }
}

struct Subscription {
    ids: Option<Vec<String>>,
    listener: Box<dyn SentenceListener>,
}

impl Subscription {
    /// Filtered subscriptions get matching sentences and lifecycle events
    fn accepts(&self, event: &ReaderEvent) -> bool {
        let Some(ids) = &self.ids else {
            return true;
        };
        match event {
            ReaderEvent::Sentence(e) => ids.iter().any(|id| id == e.id()),
            ReaderEvent::Data(_) | ReaderEvent::Error(_) => false,
            ReaderEvent::Started | ReaderEvent::Paused | ReaderEvent::Stopped => true,
        }
    }
}

/// Cloneable handle to stop a running reader
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    fn new() -> Self {
        StopHandle {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Requests the reader to exit before its next iteration
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Returns false once a stop was requested or the source was exhausted
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// What the loop does after an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Retry,
    Exhausted,
}

/// Loop state shared by the async and blocking readers
///
/// Everything here is owned by the reading thread or task; only the stop
/// flag inside `stop` is shared.
struct ReaderCore {
    source: String,
    retry_interval: Duration,
    decoder: Decoder,
    monitor: ActivityMonitor,
    subscriptions: Vec<Subscription>,
    stop: StopHandle,
}

impl ReaderCore {
    fn new(options: ReaderOptions) -> Self {
        ReaderCore {
            source: options.source,
            retry_interval: options.retry_interval,
            decoder: Decoder::default(),
            monitor: ActivityMonitor::new(options.stall_timeout),
            subscriptions: Vec::new(),
            stop: StopHandle::new(),
        }
    }

    fn subscribe(&mut self, ids: Option<Vec<String>>, listener: Box<dyn SentenceListener>) {
        self.subscriptions.push(Subscription { ids, listener });
    }

    fn fire(&mut self, event: &ReaderEvent) {
        for sub in self.subscriptions.iter_mut() {
            if sub.accepts(event) {
                sub.listener.on_event(event);
            }
        }
    }

    /// Classifies one read result and publishes it
    fn handle(&mut self, read: std::io::Result<Option<String>>) -> Step {
        let step = match read {
            Ok(None) => {
                debug!(source = %self.source, "data source exhausted");
                return Step::Exhausted;
            }
            Ok(Some(line)) => match self.decoder.decode(&line) {
                Ok(decoded) => {
                    if let Some(Activity::Started) = self.monitor.refresh() {
                        info!(source = %self.source, "reading started");
                        self.fire(&ReaderEvent::Started);
                    }
                    let event = SentenceEvent::new(&self.source, decoded);
                    self.fire(&ReaderEvent::Sentence(event));
                    Step::Continue
                }
                Err(err) if err.is_framing() => {
                    trace!(source = %self.source, "non-sentence data: {line:?}");
                    self.fire(&ReaderEvent::Data(line));
                    Step::Continue
                }
                // Line noise on a framed sentence; the source itself is fine
                Err(err @ NmeaError::ChecksumMismatch { .. }) => {
                    warn!(source = %self.source, "sentence rejected: {err}");
                    self.fire(&ReaderEvent::Error(err));
                    Step::Continue
                }
                Err(err) => {
                    warn!(source = %self.source, "sentence decode failed: {err}");
                    self.fire(&ReaderEvent::Error(err));
                    Step::Retry
                }
            },
            Err(err) => {
                warn!(source = %self.source, "data read failed: {err}");
                self.fire(&ReaderEvent::Error(NmeaError::IoError(err)));
                Step::Retry
            }
        };

        if let Some(Activity::Stalled) = self.monitor.tick() {
            info!(source = %self.source, timeout = ?self.monitor.timeout(), "reading paused");
            self.fire(&ReaderEvent::Paused);
        }
        step
    }

    /// Last acts of every loop, however it ended
    fn finish(&mut self) {
        self.monitor.reset();
        debug!(source = %self.source, "reading stopped");
        self.fire(&ReaderEvent::Stopped);
    }
}

/// Asynchronous source of text lines
///
/// `Ok(None)` means the source is exhausted and will never produce more
/// data; errors are treated as transient.
pub trait AsyncLineSource: Send {
    fn read_line(
        &mut self,
    ) -> impl std::future::Future<Output = std::io::Result<Option<String>>> + Send;
}

/// Line source over any async buffered reader
///
/// Lines are split at `\n`, decoded as lossy UTF-8 and stripped of line
/// endings.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R> LineReader<R>
where
    R: futures_io::AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        LineReader {
            reader,
            buf: Vec::new(),
        }
    }

    /// Returns the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(feature = "tokio")]
impl<T> LineReader<futures_util::io::BufReader<tokio_util::compat::Compat<T>>>
where
    T: tokio::io::AsyncRead + Unpin + Send,
{
    /// Creates a line source over a tokio reader, e.g. a `TcpStream`
    pub fn from_tokio(reader: T) -> Self {
        use tokio_util::compat::TokioAsyncReadCompatExt;

        LineReader::new(futures_util::io::BufReader::new(reader.compat()))
    }
}

impl<R> AsyncLineSource for LineReader<R>
where
    R: futures_io::AsyncBufRead + Unpin + Send,
{
    fn read_line(
        &mut self,
    ) -> impl std::future::Future<Output = std::io::Result<Option<String>>> + Send {
        async move {
            use futures_util::AsyncBufReadExt;

            self.buf.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.buf).await?;
            if bytes_read == 0 {
                return Ok(None); // EOF reached
            }
            Ok(Some(
                String::from_utf8_lossy(&self.buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string(),
            ))
        }
    }
}

/// Async sentence reader running on the tokio runtime
///
/// # Type Parameters
/// * `S` - The line source, e.g. a [`LineReader`]
#[cfg(feature = "tokio")]
pub struct SentenceReader<S> {
    source: S,
    core: ReaderCore,
}

#[cfg(feature = "tokio")]
impl<S> SentenceReader<S>
where
    S: AsyncLineSource,
{
    /// Creates a reader with default options and the standard decoder
    pub fn new(source: S) -> Self {
        Self::with_options(source, ReaderOptions::default())
    }

    pub fn with_options(source: S, options: ReaderOptions) -> Self {
        SentenceReader {
            source,
            core: ReaderCore::new(options),
        }
    }

    /// Replaces the decoder, e.g. one with a custom parser registry
    pub fn decoder(mut self, decoder: Decoder) -> Self {
        self.core.decoder = decoder;
        self
    }

    /// Registers a listener for all events
    pub fn add_listener<L: SentenceListener + 'static>(&mut self, listener: L) {
        self.core.subscribe(None, Box::new(listener));
    }

    /// Registers a listener for sentences with the given ids and lifecycle events
    pub fn add_sentence_listener<L, I, T>(&mut self, ids: I, listener: L)
    where
        L: SentenceListener + 'static,
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let ids = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
        self.core.subscribe(Some(ids), Box::new(listener));
    }

    /// Returns a handle that stops this reader
    pub fn stop_handle(&self) -> StopHandle {
        self.core.stop.clone()
    }

    /// Runs the loop on the current task until stopped or exhausted
    pub async fn run(mut self) {
        debug!(source = %self.core.source, "reader loop starting");
        while self.core.stop.is_running() {
            let read = self.source.read_line().await;
            match self.core.handle(read) {
                Step::Continue => {}
                Step::Retry => tokio::time::sleep(self.core.retry_interval).await,
                Step::Exhausted => {
                    self.core.stop.stop();
                    break;
                }
            }
        }
        self.core.finish();
    }

    /// Spawns the loop as a tokio task
    pub fn spawn(self) -> ReaderTask
    where
        S: 'static,
    {
        let handle = self.stop_handle();
        let join = tokio::spawn(self.run());
        ReaderTask { handle, join }
    }
}

/// Handle of a spawned async reader
#[cfg(feature = "tokio")]
#[derive(Debug)]
pub struct ReaderTask {
    handle: StopHandle,
    join: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "tokio")]
impl ReaderTask {
    /// Requests the reader to exit before its next iteration
    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.handle.clone()
    }

    /// Waits for the loop to exit
    pub async fn join(self) -> std::result::Result<(), tokio::task::JoinError> {
        self.join.await
    }
}
