//! Append-only CSV history sink.
//!
//! Writes the header once when the file is new or empty, then one line per
//! record through a `BufWriter`.  A write failure is logged once and the
//! sink goes quiet; the control tick never sees it.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::app::ports::HistorySink;
use crate::calibration::history::{HEADER, HistoryRecord};

pub struct HistoryFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
    failed: bool,
}

impl HistoryFileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening history log {}", path.display()))?;
        let empty = file
            .metadata()
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len()
            == 0;
        let mut writer = BufWriter::new(file);
        if empty {
            writeln!(writer, "{HEADER}").context("writing history header")?;
        }
        info!("HistoryFileSink: appending to {}", path.display());
        Ok(Self {
            path,
            writer,
            written: 0,
            failed: false,
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("flushing {}", self.path.display()))
    }

    pub fn records_written(&self) -> u64 {
        self.written
    }
}

impl HistorySink for HistoryFileSink {
    fn record(&mut self, record: &HistoryRecord) {
        if self.failed {
            return;
        }
        if let Err(e) = writeln!(self.writer, "{}", record.to_line()) {
            warn!("HistoryFileSink: write to {} failed: {e}", self.path.display());
            self.failed = true;
            return;
        }
        self.written += 1;
    }
}

impl Drop for HistoryFileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
