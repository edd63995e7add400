//! Control and data logging for the HP663[2,3,4]A bench power supplies
//! over GPIB.
//!
//! The crate programs an operating point (voltage, current limit,
//! overvoltage ceiling, overcurrent behaviour), optionally sweeps the
//! output voltage in millivolt steps, and logs timed voltage/current
//! readings to a tab-separated file that an external gnuplot process
//! replots while the run progresses.
//!
//! The instruments speak plain ASCII over the bus: newline-terminated
//! commands such as `VSET 12.0000`, and fixed-width CR/LF-terminated
//! query replies. [`supply::Hp663x`] implements that protocol over any
//! [`link::InstrumentLink`], [`ramp::RampController`] drives the sweep,
//! and [`acquire::run`] ties them to the log and the plot.

pub mod acquire;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod link;
pub mod plot;
pub mod ramp;
pub mod recorder;
pub mod supply;

#[cfg(test)]
mod mock_link;
