//! CSV price source and marker writer.

use std::fs::File;
use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::backtest::parse_timestamp;
use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::lifecycle::OrderMarker;
use crate::ports::marker_port::MarkerPort;
use crate::ports::price_port::PriceSource;

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(alias = "date", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Streams `timestamp,open,high,low,close,volume` rows one tick at a time.
///
/// Ordering is checked as rows are read, not up front. Rows that cannot be
/// parsed, carry non-finite prices or go back in time are skipped with a
/// warning; only I/O failures end the stream with an error.
pub struct CsvPriceSource<R: io::Read> {
    rows: csv::DeserializeRecordsIntoIter<R, PriceRow>,
    newest: Option<NaiveDateTime>,
    row: usize,
    skipped: usize,
}

impl CsvPriceSource<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        Ok(Self::with_reader(reader))
    }
}

impl<R: io::Read> CsvPriceSource<R> {
    pub fn from_reader(rdr: R) -> Self {
        let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
        Self::with_reader(reader)
    }

    fn with_reader(reader: csv::Reader<R>) -> Self {
        CsvPriceSource {
            rows: reader.into_deserialize(),
            newest: None,
            row: 0,
            skipped: 0,
        }
    }

    /// Rows dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn to_candle(&self, row: PriceRow) -> Result<Candle, String> {
        let timestamp = parse_timestamp(&row.timestamp)
            .ok_or_else(|| format!("invalid timestamp '{}'", row.timestamp))?;
        if let Some(newest) = self.newest {
            if timestamp < newest {
                return Err(format!("{} is older than the previous row {}", timestamp, newest));
            }
        }
        let candle = Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !candle.is_finite() {
            return Err(format!("non-finite price or volume at {}", timestamp));
        }
        Ok(candle)
    }
}

impl<R: io::Read> PriceSource for CsvPriceSource<R> {
    fn next_bar(&mut self) -> Result<Option<Candle>, EngineError> {
        while let Some(record) = self.rows.next() {
            self.row += 1;
            let parsed = match record {
                Ok(row) => self.to_candle(row),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => Err(e.to_string()),
            };
            match parsed {
                Ok(candle) => {
                    self.newest = Some(candle.timestamp);
                    return Ok(Some(candle));
                }
                Err(reason) => {
                    warn!(row = self.row, %reason, "price row skipped");
                    self.skipped += 1;
                }
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Serialize)]
struct MarkerRow<'a> {
    timestamp: String,
    action: &'a str,
    size: i64,
}

/// Writes `timestamp,action,size` rows.
pub struct CsvMarkerWriter<W: io::Write> {
    writer: csv::Writer<W>,
}

impl CsvMarkerWriter<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        Ok(CsvMarkerWriter {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: io::Write> CsvMarkerWriter<W> {
    pub fn from_writer(wtr: W) -> Self {
        CsvMarkerWriter {
            writer: csv::Writer::from_writer(wtr),
        }
    }
}

impl<W: io::Write> MarkerPort for CsvMarkerWriter<W> {
    fn write_markers(&mut self, markers: &[OrderMarker]) -> Result<(), EngineError> {
        for marker in markers {
            self.writer.serialize(MarkerRow {
                timestamp: marker.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                action: marker.action.as_str(),
                size: marker.size,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
