//! The acquisition engine: timed sampling, sweep stepping, logging and
//! plot refreshes, with cooperative cancellation.

use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::{RampPlan, RunOptions, SupplyConfig};
use crate::error::{Error, Result};
use crate::link::InstrumentLink;
use crate::plot::PlotSink;
use crate::ramp::{RampController, RampStep};
use crate::recorder::{Recorder, Sample};
use crate::supply::{Hp663x, Measurement};

/// Non-blocking cancellation source, polled once per tick.
pub trait CancelPoll {
    /// True when the operator asked to stop. Takes effect at the next tick
    /// boundary; the tick in progress always completes.
    fn cancel_requested(&mut self) -> bool;

    /// Block until the operator acknowledges the finished plot.
    fn wait_for_acknowledge(&mut self) {}
}

/// How a run came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operating point was programmed; no sampling was requested.
    ConfigureOnly,
    /// The operator stopped the run.
    Cancelled,
    /// The sweep covered its programmed range.
    SweepFinished,
}

/// Program the supply and, unless `opts.interval_tenths` is zero, run the
/// sampling loop until the sweep finishes, the operator cancels, or an
/// error aborts the run.
///
/// On a fatal error the log file is closed as-is (no footer) and the
/// instrument is still shut down on a best-effort basis.
pub fn run<L, W, C>(
    supply: &mut Hp663x<L>,
    config: &SupplyConfig,
    plan: Option<&RampPlan>,
    out_path: Option<&Path>,
    comment: &str,
    mut plot: Option<&mut PlotSink<W>>,
    cancel: &mut C,
    opts: &RunOptions,
) -> Result<Outcome, L::Error>
where
    L: InstrumentLink,
    W: Write,
    C: CancelPoll,
{
    supply.initialize(opts.reset)?;

    let mut ramp = plan.map(RampController::new);
    // A sweep starts from its own cursor, not from the plain setpoint.
    let initial_volt = ramp
        .as_ref()
        .map_or(config.volt, RampController::current_voltage);
    supply.configure(initial_volt, config.amp, config.limiter_volt, config.ocp)?;

    if opts.interval_tenths == 0 {
        debug!("interval is zero, configure-only run");
        return Ok(Outcome::ConfigureOnly);
    }

    let path = out_path.expect("an output path is required when sampling");
    let mut recorder = match Recorder::create(path, comment) {
        Ok(recorder) => recorder,
        Err(e) => {
            best_effort_shutdown(supply, opts.reset);
            return Err(Error::File(e));
        }
    };
    if let Some(sink) = plot.as_deref_mut() {
        if let Err(e) = sink.setup() {
            warn!("plot setup failed, continuing without graphics: {e}");
            plot = None;
        }
    }

    let mut second_segment = false;
    let outcome = sample_loop(
        supply,
        ramp.as_mut(),
        &mut recorder,
        &mut plot,
        cancel,
        opts,
        &mut second_segment,
    );
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            // Close the log without a footer so the truncation is visible.
            drop(recorder);
            best_effort_shutdown(supply, opts.reset);
            return Err(e);
        }
    };

    debug!("run finished with {} samples: {outcome:?}", recorder.samples());
    if let Err(e) = recorder.finish() {
        best_effort_shutdown(supply, opts.reset);
        return Err(Error::File(e));
    }

    supply.shutdown(opts.reset)?;

    if let Some(sink) = plot.as_deref_mut() {
        if let Err(e) = sink.refresh(second_segment) {
            warn!("final plot refresh failed: {e}");
        } else if opts.hold_plot {
            cancel.wait_for_acknowledge();
        }
    }
    Ok(outcome)
}

fn sample_loop<L, W, C>(
    supply: &mut Hp663x<L>,
    mut ramp: Option<&mut RampController>,
    recorder: &mut Recorder,
    plot: &mut Option<&mut PlotSink<W>>,
    cancel: &mut C,
    opts: &RunOptions,
    second_segment: &mut bool,
) -> Result<Outcome, L::Error>
where
    L: InstrumentLink,
    W: Write,
    C: CancelPoll,
{
    let interval = Duration::from_millis(u64::from(opts.interval_tenths) * 100);
    let started = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        if let Some(ramp) = ramp.as_deref_mut() {
            match ramp.advance() {
                RampStep::Set(volt) => supply.set_voltage(volt)?,
                RampStep::NewLeg(volt) => {
                    recorder.segment_break()?;
                    *second_segment = true;
                    supply.set_voltage(volt)?;
                }
                RampStep::Finished => return Ok(Outcome::SweepFinished),
            }
        }

        thread::sleep(interval);

        let elapsed_min = started.elapsed().as_secs_f64() / 60.0;
        let volt = supply.read_measurement(Measurement::OutputVoltage)?;
        let amp = supply.read_measurement(Measurement::OutputCurrent)?;
        recorder.append(&Sample {
            elapsed_min,
            volt,
            amp,
        })?;
        ticks += 1;

        if opts.echo {
            print!("{ticks:10} {elapsed_min:10.2} min {volt:10.4} V {amp:10.4} A\r");
            let _ = io::stdout().flush();
        }

        if ticks % opts.flush_every == 0 {
            recorder.flush()?;
            refresh_plot(plot, *second_segment);
        }

        if cancel.cancel_requested() {
            return Ok(Outcome::Cancelled);
        }
    }
}

/// Refresh the live plot, dropping the sink after a pipe failure so a dead
/// gnuplot cannot stall the rest of the run.
fn refresh_plot<W: Write>(plot: &mut Option<&mut PlotSink<W>>, second_segment: bool) {
    if let Some(sink) = plot.as_deref_mut() {
        if let Err(e) = sink.refresh(second_segment) {
            warn!("plot refresh failed, continuing without graphics: {e}");
            *plot = None;
        }
    }
}

fn best_effort_shutdown<L: InstrumentLink>(supply: &mut Hp663x<L>, reset: bool) {
    if let Err(e) = supply.shutdown(reset) {
        warn!("instrument shutdown failed after an earlier error: {e}");
    }
}
