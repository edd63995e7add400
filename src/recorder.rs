//! Append-only tab-separated sample log.
//!
//! The layout is gnuplot-friendly: `#` comment lines for the header and
//! footer, one sample per line, and two blank lines between sweep legs so
//! that each leg is addressable as its own `index` block.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::Local;

const TIMESTAMP_FORMAT: &str = "%a %b %e %T %Y";

/// One measurement row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Minutes since the acquisition loop started.
    pub elapsed_min: f64,
    /// Measured output voltage in volts.
    pub volt: f64,
    /// Measured output current in amperes.
    pub amp: f64,
}

/// Writer for one acquisition log file.
pub struct Recorder {
    out: BufWriter<File>,
    samples: u64,
}

impl Recorder {
    /// Create the file and write the header block.
    pub fn create(path: &Path, comment: &str) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(
            out,
            "# {} V{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(out, "# {comment}")?;
        writeln!(out, "# Start: {}", Local::now().format(TIMESTAMP_FORMAT))?;
        writeln!(out, "# min\tVolt\tAmpere")?;
        Ok(Self { out, samples: 0 })
    }

    /// Append one sample line.
    pub fn append(&mut self, sample: &Sample) -> io::Result<()> {
        writeln!(
            self.out,
            "{:.4}\t{:.4}\t{:.4}",
            sample.elapsed_min, sample.volt, sample.amp
        )?;
        self.samples += 1;
        Ok(())
    }

    /// Two blank lines: gnuplot treats what follows as a new data block.
    pub fn segment_break(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out)
    }

    /// Number of samples appended so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Push buffered lines out and force them to disk.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_data()
    }

    /// Write the stop timestamp footer and flush, consuming the recorder.
    ///
    /// Not called when a run dies on an error, so a truncated log is
    /// recognizable by its missing footer.
    pub fn finish(mut self) -> io::Result<()> {
        writeln!(self.out, "# Stop: {}", Local::now().format(TIMESTAMP_FORMAT))?;
        self.flush()
    }
}
