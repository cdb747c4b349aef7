//! astime core library for offline AVTP presentation-time analysis.
//!
//! Two pipelines live here. The extractor reads a PCAP/PCAPNG capture,
//! decodes the Ethernet link layer and the AVTP stream header
//! (layout/reader/parser), demultiplexes streams by destination MAC and turns
//! the 32-bit wrapping 802.1AS presentation time into a monotonic 64-bit
//! series written to CSV. The fitter reads such a series back, fits a
//! least-squares line, builds a residual histogram and, for two files,
//! compares the two clocks.
//!
//! Parsing is byte-oriented and side-effect free; capture I/O is isolated in
//! `source`, CSV I/O in `samples`.
//!
//! Invariants:
//! - The unwrapped timestamp of a stream never decreases (one wrap at most
//!   between two consecutive timestamps).
//! - Sequence anomalies are reported, never corrected.
//! - Histogram counts always add up to the number of fitted points.
//!
//! Version française (résumé):
//! La crate fournit deux chaînes hors ligne : extraction des horodatages AVTP
//! d'une capture (déroulement du compteur 32 bits, un fichier CSV par flux) et
//! ajustement linéaire par moindres carrés avec histogramme des écarts et
//! comparaison de deux horloges (PPB, décalage en échantillons).
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use astime_core::{ExtractOptions, fit_file};
//!
//! let summary = astime_core::extract_capture_file(
//!     Path::new("capture.pcap"),
//!     Path::new("."),
//!     &ExtractOptions::default(),
//! )?;
//! println!("samples written: {}", summary.samples_written);
//!
//! let fit = fit_file(Path::new("seq0.csv"), 100)?;
//! println!("slope: {}", fit.slope);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod analysis;
pub mod fit;
#[doc(hidden)]
pub mod fixtures;
mod mac;
mod protocols;
pub mod samples;
mod source;

pub use analysis::{
    ExtractError, ExtractOptions, LinkError, LinkFrame, SequenceCheck, SequenceTracker,
    TIMESTAMP_MODULUS, TimestampUnwrapper, extract_capture_file, extract_capture_stream,
    extract_single_stream, extract_streams, parse_link_frame,
};
pub use fit::plot::{PlotError, PlotFiles, render_plots};
pub use fit::{
    Comparison, DEFAULT_SAMPLE_RATE, FitError, FitOptions, FitReport, Histogram, LineFit,
    compare_fits, fit_file, fit_points,
};
pub use mac::{MacAddr, MacParseError};
pub use protocols::avtp::error::AvtpError;
pub use protocols::avtp::{AvtpPacket, CipHeader, parse_avtp_stream};
pub use samples::{CsvDirectory, CsvSampleWriter, SampleError, SampleSink, SinkFactory};
pub use source::{PacketEvent, PacketSource, PcapFileSource, SourceError};

/// Default number of timestamps to extract, or rows to fit.
pub const DEFAULT_COUNT: u64 = 100;

/// One unwrapped presentation time written to the sample output.
///
/// # Examples
/// ```
/// use astime_core::TimestampSample;
///
/// let sample = TimestampSample { index: 1, timestamp: 4_294_967_396 };
/// assert!(sample.timestamp > u64::from(u32::MAX));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSample {
    /// Position of the timestamp within its stream (the baseline is 0).
    pub index: u64,
    /// Unwrapped presentation time in nanoseconds.
    pub timestamp: u64,
}

/// Result of one extraction run.
///
/// # Examples
/// ```
/// use astime_core::ExtractSummary;
///
/// let summary = ExtractSummary::default();
/// assert!(summary.streams.is_empty());
/// assert!(!summary.complete);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractSummary {
    /// Frames read from the capture before extraction stopped.
    pub packets_total: u64,
    /// AVTP stream data frames (control frames excluded).
    pub avtp_packets: u64,
    /// Frames skipped because the link layer or AVTP header did not decode.
    pub decode_errors: u64,
    /// RFC3339 timestamp of the first frame read (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// RFC3339 timestamp of the last frame read (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    /// Number of samples the run was asked to write.
    pub requested: u64,
    /// Number of samples written across all streams.
    pub samples_written: u64,
    /// Whether the requested number of samples was reached.
    pub complete: bool,
    /// Per-stream summaries in discovery order.
    pub streams: Vec<StreamSummary>,
}

/// Counters of a single AVTP stream, keyed by destination MAC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Destination MAC address (lowercase, colon separated).
    pub dst: String,
    /// Where the samples of this stream were written.
    pub output: String,
    /// AVTP data frames seen for this destination.
    pub avtp_packets: u64,
    /// Presentation timestamps consumed, including the baseline.
    pub timestamps: u64,
    /// Samples written to the output.
    pub samples_written: u64,
    /// Frames flagged with an uncertain timestamp.
    pub uncertain: u64,
    /// Sequence wrap errors and gaps.
    pub sequence_errors: u64,
}

/// Fit reports for one or two files, plus their comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitlineReport {
    pub fits: Vec<FitReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
}
