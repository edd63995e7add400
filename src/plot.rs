//! Live plotting through a pipe to an external gnuplot process.
//!
//! Updates are done crudely but robustly: every refresh re-issues a full
//! `plot` command, making gnuplot reread the data file. Sweep runs plot
//! current against voltage; timed runs plot both readings against time on
//! split y axes.

use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Stream of gnuplot commands over any writer, so tests can capture the
/// script instead of driving a real process.
pub struct PlotSink<W: Write> {
    pipe: W,
    data_file: String,
    sweep: bool,
}

impl<W: Write> PlotSink<W> {
    pub fn new(pipe: W, data_file: &str, sweep: bool) -> Self {
        Self {
            pipe,
            data_file: data_file.to_owned(),
            sweep,
        }
    }

    /// Send the one-time display settings.
    pub fn setup(&mut self) -> io::Result<()> {
        writeln!(
            self.pipe,
            "set mouse;set mouse labels; set style data lines; set title '{}'",
            self.data_file
        )?;
        writeln!(self.pipe, "set grid xt; set grid yt")?;
        if self.sweep {
            writeln!(self.pipe, "set xlabel 'V'; set ylabel 'A'")?;
        } else {
            writeln!(
                self.pipe,
                "set xlabel 'min'; set ylabel 'V'; set y2label 'A'; set y2tics"
            )?;
        }
        self.pipe.flush()
    }

    /// Re-issue the plot command so the display catches up with the file.
    ///
    /// `second_segment` selects the two-block form once a dual sweep has
    /// turned around.
    pub fn refresh(&mut self, second_segment: bool) -> io::Result<()> {
        if self.sweep {
            if second_segment {
                writeln!(
                    self.pipe,
                    "plot '{0}' using 2:3 index 0 ti 'I vs. U (1)', '' u 2:3 index 1 ti 'I vs. U (2)'",
                    self.data_file
                )?;
            } else {
                writeln!(
                    self.pipe,
                    "plot '{}' using 2:3 ti 'I vs. U (1)'",
                    self.data_file
                )?;
            }
        } else {
            writeln!(
                self.pipe,
                "plot '{}' using 1:2 title 'Voltage', '' u 1:3 axis x1y2 title 'Current'",
                self.data_file
            )?;
        }
        self.pipe.flush()
    }

    /// Hand the pipe back, consuming the sink.
    pub fn into_pipe(self) -> W {
        self.pipe
    }
}

/// Handle on a spawned gnuplot process.
///
/// Dropping it reaps the child; close the command pipe first so gnuplot
/// sees end-of-file and exits.
pub struct Gnuplot {
    child: Child,
}

impl Gnuplot {
    /// Launch `executable` with its stdin piped.
    pub fn spawn(executable: &str) -> io::Result<(Self, ChildStdin)> {
        let mut child = Command::new(executable).stdin(Stdio::piped()).spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("gnuplot stdin unavailable"))?;
        Ok((Self { child }, stdin))
    }
}

impl Drop for Gnuplot {
    fn drop(&mut self) {
        let _ = self.child.wait();
    }
}
