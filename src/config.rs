//! Supply model variants and validation of the requested operating point.

use std::fmt;

use clap::ValueEnum;
use strum_macros::EnumIter;
use thiserror::Error;

/// Highest valid GPIB primary address.
pub const MAX_ADDRESS: u8 = 30;
/// Longest sample interval, in tenths of a second.
pub const MAX_INTERVAL_TENTHS: u16 = 600;
/// Largest ramp increment magnitude, in millivolts.
pub const MAX_STEP_MV: i32 = 1000;
/// Largest flush interval, in samples.
pub const MAX_FLUSH_EVERY: u64 = 10_000;

/// The supply models, differing only in output ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, EnumIter)]
pub enum SupplyModel {
    /// HP6632A, 25 V / 4 A.
    Hp6632,
    /// HP6633A, 50 V / 2 A.
    Hp6633,
    /// HP6634A, 100 V / 1 A.
    Hp6634,
}

impl SupplyModel {
    /// Maximum programmable output voltage in volts.
    pub fn max_volt(self) -> f64 {
        match self {
            SupplyModel::Hp6632 => 25.0,
            SupplyModel::Hp6633 => 50.0,
            SupplyModel::Hp6634 => 100.0,
        }
    }

    /// Maximum programmable output current in amperes.
    pub fn max_amp(self) -> f64 {
        match self {
            SupplyModel::Hp6632 => 4.0,
            SupplyModel::Hp6633 => 2.0,
            SupplyModel::Hp6634 => 1.0,
        }
    }
}

impl fmt::Display for SupplyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SupplyModel::Hp6632 => "HP6632A",
            SupplyModel::Hp6633 => "HP6633A",
            SupplyModel::Hp6634 => "HP6634A",
        })
    }
}

/// A rejected parameter. All of these abort the program before the
/// instrument is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("output voltage must be in the range 0...{max} V")]
    VoltageRange { max: String },
    #[error("current limit must be in the range 0...{max} A")]
    CurrentRange { max: String },
    #[error("voltage limiter must be in the range 0...{max} V")]
    LimiterRange { max: String },
    #[error("ramp increment must be 1...{MAX_STEP_MV} mV in magnitude")]
    StepRange,
    #[error("upper ramp voltage must not be below the start voltage")]
    RampBoundsOrder,
    #[error("upper ramp voltage must be in the range 0...{max} V")]
    RampCeiling { max: String },
    #[error("upper ramp voltage must not exceed the voltage limiter")]
    RampAboveLimiter,
    #[error("GPIB primary address must be 0...{MAX_ADDRESS}")]
    AddressRange,
    #[error("sample interval must be 0...{MAX_INTERVAL_TENTHS} tenths of a second")]
    IntervalRange,
    #[error("flush interval must be 1...{MAX_FLUSH_EVERY} samples")]
    FlushRange,
}

/// The operating point programmed into the supply before a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupplyConfig {
    /// Output voltage setpoint in volts.
    pub volt: f64,
    /// Current limit in amperes.
    pub amp: f64,
    /// Overvoltage protection ceiling in volts.
    pub limiter_volt: f64,
    /// Trip the output on overcurrent instead of limiting.
    pub ocp: bool,
}

impl SupplyConfig {
    /// Check every field against the ceilings of `model`.
    pub fn validate(&self, model: SupplyModel) -> Result<(), ConfigError> {
        if !(0.0..=model.max_volt()).contains(&self.volt) {
            return Err(ConfigError::VoltageRange {
                max: model.max_volt().to_string(),
            });
        }
        if !(0.0..=model.max_amp()).contains(&self.amp) {
            return Err(ConfigError::CurrentRange {
                max: model.max_amp().to_string(),
            });
        }
        if !(0.0..=model.max_volt()).contains(&self.limiter_volt) {
            return Err(ConfigError::LimiterRange {
                max: model.max_volt().to_string(),
            });
        }
        Ok(())
    }
}

/// A voltage sweep request.
///
/// A positive increment climbs from `start` towards `end`, a negative one
/// descends from `end` towards `start`. With `dual` set the sweep turns
/// around at the far bound and retraces itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPlan {
    /// Lower sweep bound in volts.
    pub start: f64,
    /// Upper sweep bound in volts.
    pub end: f64,
    /// Increment per tick in millivolts, sign giving the direction.
    pub step_mv: i32,
    /// Retrace the sweep in the opposite direction after the first leg.
    pub dual: bool,
}

impl RampPlan {
    /// Check the sweep bounds against the model and the limiter ceiling.
    pub fn validate(&self, model: SupplyModel, limiter_volt: f64) -> Result<(), ConfigError> {
        if self.step_mv == 0 || self.step_mv.abs() > MAX_STEP_MV {
            return Err(ConfigError::StepRange);
        }
        if !(0.0..=model.max_volt()).contains(&self.end) {
            return Err(ConfigError::RampCeiling {
                max: model.max_volt().to_string(),
            });
        }
        if self.end < self.start {
            return Err(ConfigError::RampBoundsOrder);
        }
        if self.end > limiter_volt {
            return Err(ConfigError::RampAboveLimiter);
        }
        Ok(())
    }
}

/// Knobs of the acquisition loop itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Delay between samples in tenths of a second; 0 configures and exits.
    pub interval_tenths: u16,
    /// A durable flush and plot refresh every this many samples.
    pub flush_every: u64,
    /// Reset the supply when opening and closing the session.
    pub reset: bool,
    /// Echo a live status line to the console on every sample.
    pub echo: bool,
    /// Leave the finished plot up until the operator presses a key.
    pub hold_plot: bool,
}

/// Check a GPIB primary address.
pub fn validate_address(address: u8) -> Result<(), ConfigError> {
    if address > MAX_ADDRESS {
        return Err(ConfigError::AddressRange);
    }
    Ok(())
}

/// Check a sample interval in tenths of a second.
pub fn validate_interval(tenths: u16) -> Result<(), ConfigError> {
    if tenths > MAX_INTERVAL_TENTHS {
        return Err(ConfigError::IntervalRange);
    }
    Ok(())
}

/// Check a flush interval in samples.
pub fn validate_flush(every: u64) -> Result<(), ConfigError> {
    if every == 0 || every > MAX_FLUSH_EVERY {
        return Err(ConfigError::FlushRange);
    }
    Ok(())
}
