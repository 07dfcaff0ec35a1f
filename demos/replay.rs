use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use nmea_stream::{
    provider::{
        AggregationEngine, position::PositionEvent, position::PositionPolicy,
        satellite::SatelliteInfoEvent, satellite::SatelliteInfoPolicy,
    },
    reader::{self, ReaderEvent, ReaderOptions, SentenceListener, blocking},
};
use tracing_subscriber::EnvFilter;

/// Decodes an NMEA 0183 stream and prints composite events as JSON lines
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log file to replay; reads stdin when omitted
    path: Option<PathBuf>,
    /// Read from a TCP NMEA server instead, e.g. 127.0.0.1:10110
    #[arg(short, long, conflicts_with = "path")]
    tcp: Option<String>,
    /// Also print every decoded sentence
    #[arg(short, long)]
    verbose: bool,
    /// Wait after a failed read or decode, in milliseconds
    #[arg(long, default_value = "1000")]
    retry_ms: u64,
    /// Inactivity before the stream counts as paused, in milliseconds
    #[arg(long, default_value = "5000")]
    stall_ms: u64,
}

type Output = Arc<Mutex<std::io::Stdout>>;

fn print_json<T: serde::Serialize>(out: &Output, value: &T) {
    if let Ok(line) = serde_json::to_string(value) {
        let _ = writeln!(out.lock().unwrap(), "{line}");
    }
}

/// Feeds both providers and reports stream state on stderr
fn listener(out: &Output, verbose: bool) -> impl FnMut(&ReaderEvent) + Send + 'static {
    let mut satellites = AggregationEngine::new(SatelliteInfoPolicy);
    let sink = out.clone();
    satellites.add_listener(move |e: &SatelliteInfoEvent| print_json(&sink, e));

    let mut position = AggregationEngine::new(PositionPolicy);
    let sink = out.clone();
    position.add_listener(move |e: &PositionEvent| print_json(&sink, e));

    let sink = out.clone();
    move |event: &ReaderEvent| {
        satellites.on_event(event);
        position.on_event(event);
        match event {
            ReaderEvent::Sentence(e) if verbose => print_json(&sink, e),
            ReaderEvent::Started => eprintln!("stream started"),
            ReaderEvent::Paused => eprintln!("stream paused"),
            ReaderEvent::Stopped => eprintln!("stream stopped"),
            _ => {}
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("NMEA_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let options = ReaderOptions::default()
        .retry_interval(Duration::from_millis(args.retry_ms))
        .stall_timeout(Duration::from_millis(args.stall_ms));
    let out: Output = Arc::new(Mutex::new(std::io::stdout()));
    let verbose = args.verbose;

    if let Some(addr) = args.tcp {
        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(async move {
            let stream = tokio::net::TcpStream::connect(&addr).await?;
            let source = reader::LineReader::from_tokio(stream);
            let mut reader = reader::SentenceReader::with_options(source, options.source(&addr));
            reader.add_listener(listener(&out, verbose));

            let task = reader.spawn();
            let stop = task.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.stop();
                }
            });
            task.join().await?;
            Ok::<_, Box<dyn std::error::Error>>(())
        });
    }

    let source: Box<dyn std::io::Read + Send> = match &args.path {
        Some(path) => Box::new(std::fs::File::open(path)?),
        None => Box::new(std::io::stdin()),
    };
    let name = args
        .path
        .as_ref()
        .map_or("stdin".to_string(), |p| p.display().to_string());

    let source = blocking::LineReader::from_read(source);
    let mut reader = blocking::SentenceReader::with_options(source, options.source(name));
    reader.add_listener(listener(&out, verbose));
    reader.run();
    Ok(())
}
