//! Semicolon-delimited statistics rows.
//!
//! One row per time difference of a cycle; a cycle without time differences
//! still writes a single row with an empty `TimeDifference` column.

use crate::record::CycleRecord;
use crate::Result;
use csv::WriterBuilder;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tandem_core::Channel;
use tracing::debug;

pub const STATISTICS_HEADER: [&str; 18] = [
    "Cycle",
    "Time",
    "Elapsed",
    "A",
    "B",
    "TotA",
    "TotB",
    "RateA",
    "RateB",
    "Cnc",
    "TotCnc",
    "ElapsedCncRate",
    "SampleCncRate",
    "TimeDifference",
    "APulseHeight",
    "BPulseHeight",
    "SampleSize",
    "Chn",
];

/// Semicolon-delimited writer without a csv-managed header.
pub(crate) fn delimited<W: Write>(writer: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_writer(writer)
}

/// Open `path` for appending and report whether it was empty.
pub(crate) fn open_append(path: &Path) -> Result<(File, bool)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;
    Ok((file, is_empty))
}

pub struct StatisticsWriter<W: Write = File> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl StatisticsWriter<File> {
    /// Append to `path`, writing the header when the file is new or empty.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (file, is_empty) = open_append(path)?;

        let mut writer = Self::new(file);
        if is_empty {
            writer.write_header()?;
        }
        debug!("Statistics file opened: {}", path.display());
        Ok(writer)
    }
}

impl<W: Write> StatisticsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: delimited(writer),
            rows: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_record(STATISTICS_HEADER)?;
        Ok(())
    }

    pub fn write_record(&mut self, record: &CycleRecord) -> Result<()> {
        if record.time_differences.is_empty() {
            self.write_row(record, None)?;
        } else {
            for &td in &record.time_differences {
                self.write_row(record, Some(td))?;
            }
        }
        Ok(())
    }

    fn write_row(&mut self, record: &CycleRecord, time_difference: Option<i64>) -> Result<()> {
        let timestamp = record.timestamp.timestamp_millis() as f64 / 1000.0;
        let time_difference = time_difference.map(|td| td.to_string()).unwrap_or_default();
        let channel = match record.trigger_channel {
            Channel::A => 0,
            Channel::B => 1,
        };

        self.writer.write_record([
            record.cycle.to_string(),
            timestamp.to_string(),
            record.elapsed_seconds.to_string(),
            record.counts.0.to_string(),
            record.counts.1.to_string(),
            record.totals.0.to_string(),
            record.totals.1.to_string(),
            record.rates.0.to_string(),
            record.rates.1.to_string(),
            (record.counts.0 * record.counts.1).to_string(),
            record.coincidence_count.to_string(),
            record.background_elapsed_rate.to_string(),
            record.background_sample_rate.to_string(),
            time_difference,
            record.pulse_heights.0.to_string(),
            record.pulse_heights.1.to_string(),
            record.buffer_duration_seconds.to_string(),
            channel.to_string(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}
