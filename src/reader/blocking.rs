//! Blocking (thread based) sentence reader
//!
//! Same loop as the async reader, driven by a dedicated thread over a
//! synchronous line source such as a serial port, a file or a `TcpStream`.
//! A read that blocks waiting for input delays [`ReaderHandle::stop`] until
//! it returns.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::{ReaderCore, ReaderOptions, SentenceListener, Step, StopHandle};
use crate::{Result, protocol::decoder::Decoder};

/// Synchronous source of text lines
///
/// `Ok(None)` means the source is exhausted and will never produce more
/// data; errors are treated as transient.
pub trait LineSource: Send {
    fn read_line(&mut self) -> std::io::Result<Option<String>>;
}

/// Line source over any buffered reader
///
/// Lines are split at `\n`, decoded as lossy UTF-8 and stripped of line
/// endings.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
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

impl<R: std::io::Read> LineReader<std::io::BufReader<R>> {
    /// Wraps an unbuffered reader, e.g. a `TcpStream`
    pub fn from_read(reader: R) -> Self {
        LineReader::new(std::io::BufReader::new(reader))
    }
}

impl<R: BufRead + Send> LineSource for LineReader<R> {
    fn read_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None); // EOF reached
        }
        Ok(Some(
            String::from_utf8_lossy(&self.buf)
                .trim_end_matches(['\r', '\n'])
                .to_string(),
        ))
    }
}

/// Sentence reader running on its own thread
///
/// # Example
///
/// ```no_run
/// use nmea_stream::reader::{ReaderEvent, blocking::{LineReader, SentenceReader}};
///
/// let port = std::fs::File::open("/dev/ttyUSB0").unwrap();
/// let mut reader = SentenceReader::new(LineReader::from_read(port));
/// reader.add_sentence_listener(["RMC"], |event: &ReaderEvent| println!("{event:?}"));
///
/// let handle = reader.start().unwrap();
/// // ...
/// handle.stop();
/// handle.join();
/// ```
pub struct SentenceReader<S> {
    source: S,
    core: ReaderCore,
}

impl<S> SentenceReader<S>
where
    S: LineSource,
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

    /// Runs the loop on the calling thread until stopped or exhausted
    pub fn run(mut self) {
        debug!(source = %self.core.source, "reader loop starting");
        while self.core.stop.is_running() {
            let read = self.source.read_line();
            match self.core.handle(read) {
                Step::Continue => {}
                Step::Retry => thread::sleep(self.core.retry_interval),
                Step::Exhausted => {
                    self.core.stop.stop();
                    break;
                }
            }
        }
        self.core.finish();
    }

    /// Starts the loop on a new thread named after the source
    pub fn start(self) -> Result<ReaderHandle>
    where
        S: 'static,
    {
        let stop = self.stop_handle();
        let join = thread::Builder::new()
            .name(format!("nmea-reader-{}", self.core.source))
            .spawn(move || self.run())?;
        Ok(ReaderHandle { stop, join })
    }
}

/// Handle of a reader thread
#[derive(Debug)]
pub struct ReaderHandle {
    stop: StopHandle,
    join: JoinHandle<()>,
}

impl ReaderHandle {
    /// Requests the reader to exit before its next iteration
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_running()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Waits for the reader thread to exit
    ///
    /// Returns false if the thread panicked, e.g. in a listener.
    pub fn join(self) -> bool {
        self.join.join().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::tests::{BAD_CHECKSUM, HDM, recorder};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays scripted read results, then reports end of stream
    struct Script(VecDeque<std::io::Result<Option<String>>>);

    impl LineSource for Script {
        fn read_line(&mut self) -> std::io::Result<Option<String>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    /// Endless source returning the same line
    struct Repeat(&'static str);

    impl LineSource for Repeat {
        fn read_line(&mut self) -> std::io::Result<Option<String>> {
            thread::sleep(Duration::from_millis(5));
            Ok(Some(self.0.to_string()))
        }
    }

    fn fast() -> ReaderOptions {
        ReaderOptions::default().retry_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_line_reader() {
        let data: &[u8] = b"$GPHDM,90.0,M\r\n\r\nnoise";
        let mut source = LineReader::new(data);
        assert_eq!(source.read_line().unwrap().as_deref(), Some(HDM));
        assert_eq!(source.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(source.read_line().unwrap().as_deref(), Some("noise"));
        assert_eq!(source.read_line().unwrap(), None);
    }

    #[test]
    fn test_reader_exhaustion() {
        let data = format!("{HDM}\nhello\n{BAD_CHECKSUM}\n");
        let source = LineReader::new(std::io::Cursor::new(data));
        let mut reader = SentenceReader::with_options(source, fast());
        let (log, listener) = recorder();
        reader.add_listener(listener);

        let handle = reader.start().unwrap();
        let stop = handle.stop_handle();
        assert!(handle.join());
        assert!(!stop.is_running());
        assert_eq!(
            *log.lock().unwrap(),
            [
                "started",
                "sentence:HDM",
                "data:hello",
                "error:checksum",
                "stopped"
            ]
        );
    }

    #[test]
    fn test_reader_recovers_after_read_error() {
        let script = Script(VecDeque::from([
            Err(std::io::Error::other("framing lost")),
            Ok(Some(HDM.to_string())),
        ]));
        let mut reader = SentenceReader::with_options(script, fast());
        let (log, listener) = recorder();
        reader.add_listener(listener);
        reader.run();

        assert_eq!(
            *log.lock().unwrap(),
            ["error:io", "started", "sentence:HDM", "stopped"]
        );
    }

    #[test]
    fn test_reader_no_backoff_after_bad_checksum() {
        let script = Script(VecDeque::from([
            Ok(Some(BAD_CHECKSUM.to_string())),
            Ok(Some(BAD_CHECKSUM.to_string())),
            Ok(Some(HDM.to_string())),
        ]));
        let options = ReaderOptions::default().retry_interval(Duration::from_secs(10));
        let mut reader = SentenceReader::with_options(script, options);
        let (log, listener) = recorder();
        reader.add_listener(listener);

        let begin = std::time::Instant::now();
        reader.run();
        assert!(begin.elapsed() < Duration::from_secs(5));
        assert_eq!(
            *log.lock().unwrap(),
            [
                "error:checksum",
                "error:checksum",
                "started",
                "sentence:HDM",
                "stopped"
            ]
        );
    }

    #[test]
    fn test_reader_stop() {
        let mut reader = SentenceReader::with_options(Repeat(HDM), fast());
        let (log, listener) = recorder();
        reader.add_sentence_listener(["GSA"], listener);

        let handle = reader.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(handle.is_running());
        handle.stop();
        assert!(!handle.is_running());
        assert!(handle.join());

        // HDM sentences are filtered out; lifecycle events are not
        assert_eq!(*log.lock().unwrap(), ["started", "stopped"]);
    }

    #[test]
    fn test_reader_stalls_on_noise() {
        let mut lines: VecDeque<_> = VecDeque::from([Ok(Some(HDM.to_string()))]);
        lines.extend((0..20).map(|_| Ok(Some("noise".to_string()))));
        let options = fast().stall_timeout(Duration::from_millis(1));

        struct Slow(Script);
        impl LineSource for Slow {
            fn read_line(&mut self) -> std::io::Result<Option<String>> {
                thread::sleep(Duration::from_millis(2));
                self.0.read_line()
            }
        }

        let mut reader = SentenceReader::with_options(Slow(Script(lines)), options);
        let (log, listener) = recorder();
        reader.add_listener(listener);
        reader.run();

        let log = log.lock().unwrap();
        assert_eq!(log.iter().filter(|l| *l == "paused").count(), 1);
        assert_eq!(log.iter().filter(|l| *l == "started").count(), 1);
        assert_eq!(log.last().map(String::as_str), Some("stopped"));
    }
}
