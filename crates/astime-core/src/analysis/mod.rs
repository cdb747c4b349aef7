use std::path::Path;

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{info, warn};

use crate::protocols::avtp::error::AvtpError;
use crate::protocols::avtp::{AvtpPacket, parse_avtp_stream};
use crate::samples::{CsvDirectory, CsvSampleWriter, SampleError, SampleSink, SinkFactory};
use crate::source::{PacketEvent, PacketSource, PcapFileSource, SourceError};
use crate::{DEFAULT_COUNT, ExtractSummary, MacAddr};

mod link;
mod streams;
mod unwrap;

use streams::{StreamAccumulator, StreamTable};

pub use link::error::LinkError;
pub use link::{LinkFrame, parse_link_frame};
pub use unwrap::{SequenceCheck, SequenceTracker, TIMESTAMP_MODULUS, TimestampUnwrapper};

/// Streams to discover before unpacking starts.
pub const DISCOVER_STREAMS: usize = 2;
/// Consecutive certain timestamps that must be exceeded before unpacking.
pub const WARMUP_CERTAIN_TIMESTAMPS: u64 = 2;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Sample output error: {0}")]
    Sample(#[from] SampleError),
}

#[derive(Debug, Error)]
enum DecodeError {
    #[error("link layer: {0}")]
    Link(#[from] LinkError),
    #[error("AVTP header: {0}")]
    Avtp(#[from] AvtpError),
}

/// Options of a multi-stream extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Samples to write per stream.
    pub count: u64,
    /// Unpacking starts once this many destinations have been seen.
    pub streams: usize,
    /// Unpacking needs more than this many consecutive certain timestamps.
    pub warmup: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            streams: DISCOVER_STREAMS,
            warmup: WARMUP_CERTAIN_TIMESTAMPS,
        }
    }
}

impl ExtractOptions {
    pub fn with_count(count: u64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// Samples to write across all streams before stopping.
    pub fn target(&self) -> u64 {
        self.count.saturating_mul(self.streams as u64)
    }
}

/// Extract every AVTP stream of a capture into `seq<n>.csv` files in `out_dir`.
pub fn extract_capture_file(
    path: &Path,
    out_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractSummary, ExtractError> {
    let source = PcapFileSource::open(path)?;
    extract_streams(source, CsvDirectory::new(out_dir), options)
}

/// Extract the stream sent to `dst` into a single CSV file.
pub fn extract_capture_stream(
    path: &Path,
    output: &Path,
    dst: MacAddr,
    count: u64,
) -> Result<ExtractSummary, ExtractError> {
    let source = PcapFileSource::open(path)?;
    let sink = CsvSampleWriter::create(output)?;
    extract_single_stream(source, sink, output.display().to_string(), dst, count)
}

/// Discover AVTP streams by destination MAC and unwrap their timestamps.
///
/// Unpacking starts once `options.streams` destinations are known and more
/// than `options.warmup` consecutive data packets carried a certain
/// timestamp; an uncertain one restarts the warm-up. The run stops after
/// `options.target()` samples or at the end of the capture.
pub fn extract_streams<S: PacketSource, F: SinkFactory>(
    mut source: S,
    factory: F,
    options: &ExtractOptions,
) -> Result<ExtractSummary, ExtractError> {
    let mut stats = CaptureStats::default();
    let mut table = StreamTable::new(factory);
    let mut certain_run = 0u64;
    let target = options.target();
    let mut written = 0u64;

    info!(count = options.count, "searching for timestamped AVTP packets");
    while written < target {
        let Some(event) = source.next_packet()? else {
            break;
        };
        let Some((dst, packet)) = stats.decode(&event) else {
            continue;
        };

        table.get_or_create(dst, event.frame)?.observe(&packet);
        if packet.is_timestamp_uncertain() {
            certain_run = 0;
        } else {
            certain_run += 1;
        }

        if table.len() != options.streams || certain_run <= options.warmup {
            continue;
        }
        if let Some(stream) = table.get_mut(&dst) {
            if !stream.has_started() {
                info!(frame = event.frame, dst = %dst, "start unpacking AVTP stream");
            }
            if stream.unpack(event.frame, &packet)? {
                written += 1;
            }
        }
    }

    let streams = table.finish()?;
    Ok(stats.into_summary(target, written, streams))
}

/// Unwrap the timestamps of the single stream sent to `dst`.
pub fn extract_single_stream<S: PacketSource, K: SampleSink>(
    mut source: S,
    sink: K,
    output: String,
    dst: MacAddr,
    count: u64,
) -> Result<ExtractSummary, ExtractError> {
    let mut stats = CaptureStats::default();
    let mut stream = StreamAccumulator::new(0, dst, output, sink);
    let mut seen = false;

    info!(count, dst = %dst, "searching for timestamped AVTP packets");
    while stream.samples_written < count {
        let Some(event) = source.next_packet()? else {
            break;
        };
        let Some((packet_dst, packet)) = stats.decode(&event) else {
            continue;
        };
        if packet_dst != dst {
            continue;
        }
        if !seen {
            info!(frame = event.frame, dst = %dst, "found AVTP stream");
            seen = true;
        }
        stream.observe(&packet);
        stream.unpack(event.frame, &packet)?;
    }

    let written = stream.samples_written;
    let streams = if seen {
        vec![stream.finish()?]
    } else {
        stream.finish()?;
        Vec::new()
    };
    Ok(stats.into_summary(count, written, streams))
}

#[derive(Debug, Default)]
struct CaptureStats {
    packets_total: u64,
    avtp_packets: u64,
    decode_errors: u64,
    first_ts: Option<f64>,
    last_ts: Option<f64>,
}

impl CaptureStats {
    /// Count the frame and return its AVTP stream data header, if it has one.
    fn decode(&mut self, event: &PacketEvent) -> Option<(MacAddr, AvtpPacket)> {
        self.packets_total += 1;
        update_ts_bounds(&mut self.first_ts, &mut self.last_ts, event.ts);
        match decode_stream_data(event) {
            Ok(Some(decoded)) => {
                self.avtp_packets += 1;
                Some(decoded)
            }
            Ok(None) => None,
            Err(err) => {
                self.decode_errors += 1;
                warn!(frame = event.frame, error = %err, "skipping undecodable packet");
                None
            }
        }
    }

    fn into_summary(
        self,
        requested: u64,
        written: u64,
        streams: Vec<crate::StreamSummary>,
    ) -> ExtractSummary {
        let complete = written >= requested;
        if !complete {
            warn!(
                requested,
                written, "capture ended before the requested number of timestamps"
            );
        }
        ExtractSummary {
            packets_total: self.packets_total,
            avtp_packets: self.avtp_packets,
            decode_errors: self.decode_errors,
            time_start: ts_to_rfc3339(self.first_ts),
            time_end: ts_to_rfc3339(self.last_ts),
            requested,
            samples_written: written,
            complete,
            streams,
        }
    }
}

fn decode_stream_data(event: &PacketEvent) -> Result<Option<(MacAddr, AvtpPacket)>, DecodeError> {
    let frame = parse_link_frame(event.linktype, &event.data)?;
    if !frame.is_avtp() {
        return Ok(None);
    }
    let packet = parse_avtp_stream(frame.payload)?;
    if !packet.is_stream_data() {
        return Ok(None);
    }
    Ok(Some((frame.dst, packet)))
}

fn update_ts_bounds(first: &mut Option<f64>, last: &mut Option<f64>, ts: Option<f64>) {
    let Some(ts) = ts else {
        return;
    };
    if first.is_none_or(|existing| ts < existing) {
        *first = Some(ts);
    }
    if last.is_none_or(|existing| ts > existing) {
        *last = Some(ts);
    }
}

fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

#[cfg(test)]
mod tests {
    use super::{ExtractOptions, extract_single_stream, extract_streams, update_ts_bounds};
    use crate::fixtures::AvtpFrame;
    use crate::samples::{SampleError, SinkFactory};
    use crate::source::{PacketEvent, PacketSource, SourceError};
    use crate::{MacAddr, TimestampSample};
    use pcap_parser::Linktype;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    const STREAM_A: MacAddr = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x00]);
    const STREAM_B: MacAddr = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x01]);

    struct VecSource(VecDeque<PacketEvent>);

    impl VecSource {
        fn new(frames: Vec<Vec<u8>>) -> Self {
            let events = frames
                .into_iter()
                .enumerate()
                .map(|(idx, data)| PacketEvent {
                    frame: idx as u64 + 1,
                    ts: Some(idx as f64 * 0.000_125),
                    linktype: Linktype::ETHERNET,
                    data,
                })
                .collect();
            Self(events)
        }
    }

    impl PacketSource for VecSource {
        fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default, Clone)]
    struct SharedSink(Rc<RefCell<Vec<TimestampSample>>>);

    impl crate::samples::SampleSink for SharedSink {
        fn write_sample(&mut self, sample: TimestampSample) -> Result<(), SampleError> {
            self.0.borrow_mut().push(sample);
            Ok(())
        }
    }

    #[derive(Default)]
    struct SharedFactory(Vec<SharedSink>);

    impl SinkFactory for SharedFactory {
        type Sink = SharedSink;

        fn create(
            &mut self,
            ordinal: usize,
            _dst: MacAddr,
        ) -> Result<(Self::Sink, String), SampleError> {
            let sink = SharedSink::default();
            self.0.push(sink.clone());
            Ok((sink, format!("seq{ordinal}.csv")))
        }
    }

    fn interleaved(pairs: u32, step: u32) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for k in 0..pairs {
            let seq = k as u8;
            frames.push(AvtpFrame::timestamped(STREAM_A, seq, 1_000 + k * step).to_bytes());
            frames.push(AvtpFrame::timestamped(STREAM_B, seq, 5_000 + k * step).to_bytes());
        }
        frames
    }

    #[test]
    fn discovery_waits_for_two_streams_and_warmup() {
        let source = VecSource::new(interleaved(20, 125_000));
        let mut factory = SharedFactory::default();
        let sinks = {
            let summary =
                extract_streams(source, &mut factory, &ExtractOptions::with_count(3)).unwrap();
            assert!(summary.complete);
            assert_eq!(summary.samples_written, 6);
            assert_eq!(summary.streams.len(), 2);
            assert_eq!(summary.streams[0].output, "seq0.csv");
            factory.0.clone()
        };

        let a = sinks[0].0.borrow();
        let rows: Vec<(u64, u64)> = a.iter().map(|s| (s.index, s.timestamp)).collect();
        // A is handed over from its second packet on; that one is the baseline.
        assert_eq!(rows, vec![(1, 251_000), (2, 376_000), (3, 501_000)]);
    }

    #[test]
    fn uncertain_timestamp_restarts_warmup() {
        let mut frames = interleaved(2, 125_000);
        let mut uncertain = AvtpFrame::timestamped(STREAM_A, 2, 251_000);
        uncertain.timestamp_uncertain = 1;
        frames.push(uncertain.to_bytes());
        for k in 3..12u32 {
            frames.push(AvtpFrame::timestamped(STREAM_A, k as u8, 1_000 + k * 125_000).to_bytes());
        }

        let mut factory = SharedFactory::default();
        let summary = extract_streams(
            VecSource::new(frames),
            &mut factory,
            &ExtractOptions::with_count(100),
        )
        .unwrap();
        assert!(!summary.complete);
        assert_eq!(summary.streams[0].uncertain, 1);
        // k=3 and k=4 rebuild the certain run, k=5..=11 are unpacked.
        assert_eq!(summary.streams[0].timestamps, 8);
        assert_eq!(summary.streams[0].samples_written, 7);
        assert_eq!(summary.streams[0].sequence_errors, 1);
    }

    #[test]
    fn third_destination_stops_unpacking() {
        let stream_c = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x02]);
        let mut frames = interleaved(3, 125_000);
        frames.push(AvtpFrame::timestamped(stream_c, 0, 9_000).to_bytes());
        for k in 3..7u32 {
            let seq = k as u8;
            frames.push(AvtpFrame::timestamped(STREAM_A, seq, 1_000 + k * 125_000).to_bytes());
            frames.push(AvtpFrame::timestamped(STREAM_B, seq, 5_000 + k * 125_000).to_bytes());
        }

        let mut factory = SharedFactory::default();
        let summary = extract_streams(
            VecSource::new(frames),
            &mut factory,
            &ExtractOptions::with_count(100),
        )
        .unwrap();

        assert!(!summary.complete);
        assert_eq!(summary.samples_written, 2);
        assert_eq!(summary.streams.len(), 3);
        assert_eq!(summary.streams[2].dst, stream_c.to_string());
        for stream in &summary.streams[..2] {
            assert_eq!(stream.avtp_packets, 7);
            assert_eq!(stream.timestamps, 2);
            assert_eq!(stream.samples_written, 1);
        }
        assert_eq!(summary.streams[2].samples_written, 0);
        assert_eq!(factory.0[0].0.borrow().len(), 1);
        assert_eq!(factory.0[1].0.borrow().len(), 1);
        assert!(factory.0[2].0.borrow().is_empty());
    }

    #[test]
    fn undecodable_and_foreign_frames_are_skipped() {
        let mut frames = vec![vec![0x01, 0x02, 0x03]];
        let mut ipv4 = AvtpFrame::timestamped(STREAM_A, 0, 0).to_bytes();
        ipv4[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
        frames.push(ipv4);
        let mut control = AvtpFrame::timestamped(STREAM_A, 0, 0);
        control.control_data = 0xfc;
        frames.push(control.to_bytes());
        let mut short = AvtpFrame::timestamped(STREAM_A, 0, 0).to_bytes();
        short.truncate(short.len() - 20);
        frames.push(short);

        let summary = extract_streams(
            VecSource::new(frames),
            SharedFactory::default(),
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.packets_total, 4);
        assert_eq!(summary.decode_errors, 2);
        assert_eq!(summary.avtp_packets, 0);
        assert!(summary.streams.is_empty());
        assert!(summary.time_start.is_some());
    }

    #[test]
    fn single_stream_filters_on_destination() {
        let source = VecSource::new(interleaved(10, 125_000));
        let mut samples: Vec<TimestampSample> = Vec::new();
        let summary = extract_single_stream(
            source,
            &mut samples,
            "out.csv".to_string(),
            STREAM_B,
            4,
        )
        .unwrap();

        assert!(summary.complete);
        assert_eq!(summary.streams.len(), 1);
        assert_eq!(summary.streams[0].dst, STREAM_B.to_string());
        assert_eq!(summary.streams[0].avtp_packets, 5);
        let timestamps: Vec<u64> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![130_000, 255_000, 380_000, 505_000]);
    }

    #[test]
    fn single_stream_missing_destination_is_incomplete() {
        let source = VecSource::new(interleaved(3, 125_000));
        let summary = extract_single_stream(
            source,
            Vec::<TimestampSample>::new(),
            "out.csv".to_string(),
            MacAddr([2, 0, 0, 0, 0, 1]),
            4,
        )
        .unwrap();
        assert!(!summary.complete);
        assert!(summary.streams.is_empty());
        assert_eq!(summary.avtp_packets, 6);
    }

    #[test]
    fn ts_bounds_track_min_and_max() {
        let (mut first, mut last) = (None, None);
        for ts in [Some(2.0), None, Some(1.0), Some(3.0)] {
            update_ts_bounds(&mut first, &mut last, ts);
        }
        assert_eq!(first, Some(1.0));
        assert_eq!(last, Some(3.0));
    }
}
