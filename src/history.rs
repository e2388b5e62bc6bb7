//! Step size history of accepted steps.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// One accepted step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Time reached by the step
    pub time: f64,
    /// Size of the step
    pub stepsize: f64,
    /// Number of stages of the step (Runge-Kutta-Chebyshev only)
    pub stages: Option<usize>,
}

/// Receives a record for every accepted step when saving of the history is enabled.
pub trait HistorySink {
    fn record(&mut self, record: &HistoryRecord) -> io::Result<()>;
}

/// Sink discarding all records.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHistory;

impl HistorySink for NoHistory {
    fn record(&mut self, _record: &HistoryRecord) -> io::Result<()> {
        Ok(())
    }
}

impl HistorySink for Vec<HistoryRecord> {
    fn record(&mut self, record: &HistoryRecord) -> io::Result<()> {
        self.push(*record);
        Ok(())
    }
}

/// Writes one line `time stepsize [stages]` per accepted step.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> HistorySink for WriterSink<W> {
    fn record(&mut self, record: &HistoryRecord) -> io::Result<()> {
        write!(self.writer, "{:18.12e} {:18.12e}", record.time, record.stepsize)?;
        if let Some(stages) = record.stages {
            write!(self.writer, " {}", stages)?;
        }
        writeln!(self.writer)
    }
}
