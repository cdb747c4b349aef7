//! Sample I/O.
//!
//! Extracted timestamps are written as headerless two-column CSV
//! (`index,timestamp_ns`), one row per sample. The fitter reads the same
//! format back; whitespace around fields is tolerated and columns past the
//! second are ignored.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};
use thiserror::Error;

use crate::{MacAddr, TimestampSample};

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// Destination for the samples of one stream.
pub trait SampleSink {
    fn write_sample(&mut self, sample: TimestampSample) -> Result<(), SampleError>;

    /// Flush buffered samples. Called once, when the stream is done.
    fn finish(&mut self) -> Result<(), SampleError> {
        Ok(())
    }
}

/// Creates a sink for every stream discovered in a capture.
pub trait SinkFactory {
    type Sink: SampleSink;

    /// Returns the sink and a label describing where the samples go.
    fn create(
        &mut self,
        ordinal: usize,
        dst: MacAddr,
    ) -> Result<(Self::Sink, String), SampleError>;
}

impl<S: SampleSink + ?Sized> SampleSink for &mut S {
    fn write_sample(&mut self, sample: TimestampSample) -> Result<(), SampleError> {
        (**self).write_sample(sample)
    }

    fn finish(&mut self) -> Result<(), SampleError> {
        (**self).finish()
    }
}

impl<F: SinkFactory + ?Sized> SinkFactory for &mut F {
    type Sink = F::Sink;

    fn create(
        &mut self,
        ordinal: usize,
        dst: MacAddr,
    ) -> Result<(Self::Sink, String), SampleError> {
        (**self).create(ordinal, dst)
    }
}

impl SampleSink for Vec<TimestampSample> {
    fn write_sample(&mut self, sample: TimestampSample) -> Result<(), SampleError> {
        self.push(sample);
        Ok(())
    }
}

pub struct CsvSampleWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSampleWriter<File> {
    pub fn create(path: &Path) -> Result<Self, SampleError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> CsvSampleWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: WriterBuilder::new().has_headers(false).from_writer(inner),
        }
    }

    pub fn into_inner(self) -> Result<W, SampleError> {
        self.writer.into_inner().map_err(|err| {
            let io = err.error();
            SampleError::Io(std::io::Error::new(io.kind(), io.to_string()))
        })
    }
}

impl<W: Write> SampleSink for CsvSampleWriter<W> {
    fn write_sample(&mut self, sample: TimestampSample) -> Result<(), SampleError> {
        self.writer.serialize((sample.index, sample.timestamp))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SampleError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes each discovered stream to `seq<ordinal>.csv` inside a directory.
pub struct CsvDirectory {
    dir: PathBuf,
}

impl CsvDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ordinal: usize) -> PathBuf {
        self.dir.join(format!("seq{ordinal}.csv"))
    }
}

impl SinkFactory for CsvDirectory {
    type Sink = CsvSampleWriter<File>;

    fn create(
        &mut self,
        ordinal: usize,
        _dst: MacAddr,
    ) -> Result<(Self::Sink, String), SampleError> {
        let path = self.path_for(ordinal);
        let sink = CsvSampleWriter::create(&path)?;
        Ok((sink, path.display().to_string()))
    }
}

/// Read up to `limit` leading `(x, y)` rows from a sample file.
pub fn read_points(path: &Path, limit: usize) -> Result<Vec<(f64, f64)>, SampleError> {
    read_points_from(File::open(path)?, limit)
}

pub fn read_points_from<R: Read>(input: R, limit: usize) -> Result<Vec<(f64, f64)>, SampleError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let mut points = Vec::with_capacity(limit.min(1 << 20));
    for (idx, record) in reader.records().take(limit).enumerate() {
        let record = record?;
        let row = idx + 1;
        let x = parse_cell(record.get(0), row, "x")?;
        let y = parse_cell(record.get(1), row, "y")?;
        points.push((x, y));
    }
    Ok(points)
}

fn parse_cell(cell: Option<&str>, row: usize, column: &str) -> Result<f64, SampleError> {
    let cell = cell.ok_or_else(|| SampleError::InvalidRow {
        row,
        reason: format!("missing {column} column"),
    })?;
    let value: f64 = cell.parse().map_err(|_| SampleError::InvalidRow {
        row,
        reason: format!("{column} value '{cell}' is not a number"),
    })?;
    if !value.is_finite() {
        return Err(SampleError::InvalidRow {
            row,
            reason: format!("{column} value '{cell}' is not finite"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{CsvSampleWriter, SampleError, SampleSink, read_points_from};
    use crate::TimestampSample;

    #[test]
    fn writer_emits_headerless_rows() {
        let mut writer = CsvSampleWriter::from_writer(Vec::new());
        writer
            .write_sample(TimestampSample {
                index: 1,
                timestamp: 4_294_967_396,
            })
            .unwrap();
        writer
            .write_sample(TimestampSample {
                index: 2,
                timestamp: 4_295_092_396,
            })
            .unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "1,4294967396\n2,4295092396\n"
        );
    }

    #[test]
    fn reader_accepts_spaced_fields() {
        let input = "0, 1000\n1, 1100\n2,1200\n";
        let points = read_points_from(input.as_bytes(), 10).unwrap();
        assert_eq!(points, vec![(0.0, 1000.0), (1.0, 1100.0), (2.0, 1200.0)]);
    }

    #[test]
    fn reader_stops_at_limit() {
        let input = "0,1\n1,2\nnot,a number\n";
        let points = read_points_from(input.as_bytes(), 2).unwrap();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn reader_rejects_single_column() {
        let input = "0,1\n7\n";
        let err = read_points_from(input.as_bytes(), 5).unwrap_err();
        assert!(matches!(err, SampleError::InvalidRow { row: 2, .. }));
    }

    #[test]
    fn reader_rejects_non_numeric() {
        let err = read_points_from("0,abc\n".as_bytes(), 5).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }
}
