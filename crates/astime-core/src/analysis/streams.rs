use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{info, warn};

use crate::protocols::avtp::AvtpPacket;
use crate::samples::{SampleError, SampleSink, SinkFactory};
use crate::{MacAddr, StreamSummary};

use super::unwrap::{SequenceCheck, SequenceTracker, TimestampUnwrapper};

/// Per-destination state of one AVTP stream.
pub(crate) struct StreamAccumulator<S> {
    pub ordinal: usize,
    pub dst: MacAddr,
    pub output: String,
    pub avtp_packets: u64,
    pub uncertain: u64,
    pub sequence_errors: u64,
    pub samples_written: u64,
    sequence: SequenceTracker,
    unwrapper: TimestampUnwrapper,
    sink: S,
}

impl<S: SampleSink> StreamAccumulator<S> {
    pub fn new(ordinal: usize, dst: MacAddr, output: String, sink: S) -> Self {
        Self {
            ordinal,
            dst,
            output,
            avtp_packets: 0,
            uncertain: 0,
            sequence_errors: 0,
            samples_written: 0,
            sequence: SequenceTracker::default(),
            unwrapper: TimestampUnwrapper::new(),
            sink,
        }
    }

    /// Count a data packet addressed to this stream.
    pub fn observe(&mut self, packet: &AvtpPacket) {
        self.avtp_packets += 1;
        if packet.is_timestamp_uncertain() {
            self.uncertain += 1;
        }
    }

    pub fn has_started(&self) -> bool {
        self.sequence.last().is_some()
    }

    /// Validate the sequence number and unwrap the presentation time.
    ///
    /// Returns whether a sample was written.
    pub fn unpack(&mut self, frame: u64, packet: &AvtpPacket) -> Result<bool, SampleError> {
        match self.sequence.check(packet.sequence) {
            SequenceCheck::WrapError { last, current } => {
                self.sequence_errors += 1;
                warn!(frame, dst = %self.dst, last, current, "sequence wrap error");
            }
            SequenceCheck::Gap { last, current } => {
                self.sequence_errors += 1;
                warn!(frame, dst = %self.dst, last, current, "sequence error");
            }
            SequenceCheck::First | SequenceCheck::InOrder => {}
        }

        if !packet.has_valid_timestamp() {
            return Ok(false);
        }
        match self.unwrapper.push(packet.avtp_timestamp) {
            Some(sample) => {
                self.sink.write_sample(sample)?;
                self.samples_written += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn finish(mut self) -> Result<StreamSummary, SampleError> {
        self.sink.finish()?;
        Ok(StreamSummary {
            dst: self.dst.to_string(),
            output: self.output,
            avtp_packets: self.avtp_packets,
            timestamps: self.unwrapper.consumed(),
            samples_written: self.samples_written,
            uncertain: self.uncertain,
            sequence_errors: self.sequence_errors,
        })
    }
}

/// Streams keyed by destination MAC, created lazily on first sight.
pub(crate) struct StreamTable<F: SinkFactory> {
    factory: F,
    streams: HashMap<MacAddr, StreamAccumulator<F::Sink>>,
}

impl<F: SinkFactory> StreamTable<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            streams: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn get_or_create(
        &mut self,
        dst: MacAddr,
        frame: u64,
    ) -> Result<&mut StreamAccumulator<F::Sink>, SampleError> {
        let ordinal = self.streams.len();
        match self.streams.entry(dst) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let (sink, output) = self.factory.create(ordinal, dst)?;
                info!(frame, dst = %dst, output = %output, "found AVTP stream");
                Ok(entry.insert(StreamAccumulator::new(ordinal, dst, output, sink)))
            }
        }
    }

    pub fn get_mut(&mut self, dst: &MacAddr) -> Option<&mut StreamAccumulator<F::Sink>> {
        self.streams.get_mut(dst)
    }

    /// Flush every stream and return summaries in discovery order.
    pub fn finish(self) -> Result<Vec<StreamSummary>, SampleError> {
        let mut streams: Vec<_> = self.streams.into_values().collect();
        streams.sort_by_key(|stream| stream.ordinal);
        streams.into_iter().map(StreamAccumulator::finish).collect()
    }
}
