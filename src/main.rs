//! Command-line front end for the HP663XA supply controller.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, warn};

use hp663x::acquire::{self, Outcome};
use hp663x::config::{
    self, ConfigError, RampPlan, RunOptions, SupplyConfig, SupplyModel,
};
use hp663x::keyboard::{Keyboard, RawModeGuard};
use hp663x::link::VisaLink;
use hp663x::plot::{Gnuplot, PlotSink};
use hp663x::supply::Hp663x;

const EXIT_BAD_ARGS: u8 = 1;
const EXIT_INSTRUMENT: u8 = 5;

const GPIB_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(
    name = "hp663x",
    version,
    about = "Control of the HP663[2,3,4]A power supply over GPIB",
    after_help = "Stop a running acquisition with 'q' or ESC."
)]
struct Cli {
    /// GPIB primary address of the supply
    #[arg(short = 'a', long, default_value_t = 5)]
    address: u8,

    /// GPIB board number
    #[arg(short = 'b', long, default_value_t = 0)]
    board: u8,

    /// Supply model, which fixes the voltage and current ceilings
    #[arg(short = 'm', long, value_enum, default_value = "hp6633")]
    model: SupplyModel,

    /// Output voltage in volts (the lower sweep bound when ramping)
    #[arg(short = 'u', long, default_value_t = 0.0)]
    voltage: f64,

    /// Upper sweep voltage in volts
    #[arg(short = 'U', long, default_value_t = 0.0)]
    upper: f64,

    /// Voltage limiter ceiling in volts [default: the model maximum]
    #[arg(short = 'M', long)]
    limiter: Option<f64>,

    /// Current limit in amperes [default: the model maximum]
    #[arg(short = 'i', long)]
    current: Option<f64>,

    /// Trip the output on overcurrent instead of limiting
    #[arg(short = 'I', long)]
    ocp: bool,

    /// Sweep increment in millivolts per tick, sign giving the direction
    #[arg(short = 'r', long, default_value_t = 0, allow_hyphen_values = true)]
    ramp: i32,

    /// Retrace the sweep in the opposite direction after the first leg
    #[arg(short = 'R', long)]
    dual: bool,

    /// Delay between samples in tenths of a second; 0 configures and exits
    #[arg(short = 't', long, default_value_t = 10)]
    interval: u16,

    /// Do not reset the supply when opening and closing the session
    #[arg(short = 'k', long)]
    keep: bool,

    /// Do not wait for a keypress before closing the plot
    #[arg(short = 'K', long)]
    no_wait: bool,

    /// Force a durable write and a plot refresh every this many samples
    #[arg(short = 'w', long, default_value_t = 100)]
    flush: u64,

    /// Overwrite an existing output file without asking
    #[arg(short = 'f', long)]
    force: bool,

    /// Comment text for the log header
    #[arg(short = 'c', long, default_value = "")]
    comment: String,

    /// Path of the gnuplot executable
    #[arg(short = 'g', long, default_value = "gnuplot")]
    gnuplot: String,

    /// Disable the live plot
    #[arg(short = 'n', long)]
    no_graph: bool,

    /// Output data file (required unless the interval is 0)
    outfile: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_BAD_ARGS);
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(cli)
}

fn run(cli: Cli) -> ExitCode {
    println!(
        "hp663x V{} - control of the HP663[2,3,4]A power supply over GPIB",
        env!("CARGO_PKG_VERSION")
    );

    let model = cli.model;
    let config = SupplyConfig {
        volt: cli.voltage,
        amp: cli.current.unwrap_or_else(|| model.max_amp()),
        limiter_volt: cli.limiter.unwrap_or_else(|| model.max_volt()),
        ocp: cli.ocp,
    };
    let plan = (cli.ramp != 0).then(|| RampPlan {
        start: cli.voltage,
        end: cli.upper,
        step_mv: cli.ramp,
        dual: cli.dual,
    });

    if let Err(e) = validate(&cli, &config, plan.as_ref(), model) {
        error!("{e}");
        return ExitCode::from(EXIT_BAD_ARGS);
    }

    // With no sampling there is nothing to plot and nothing worth a reset.
    let sampling = cli.interval > 0;
    let graph = sampling && !cli.no_graph;
    let reset = sampling && !cli.keep;

    let out_path = if sampling {
        let Some(path) = cli.outfile.clone() else {
            error!("please specify an output data file");
            return ExitCode::from(EXIT_BAD_ARGS);
        };
        if path.exists() && !cli.force && !confirm_overwrite(&path) {
            return ExitCode::from(EXIT_BAD_ARGS);
        }
        Some(path)
    } else {
        None
    };

    let link = match VisaLink::open(cli.board, cli.address, GPIB_TIMEOUT) {
        Ok(link) => link,
        Err(e) => {
            error!("cannot open the supply at GPIB address {}: {e}", cli.address);
            return ExitCode::from(EXIT_INSTRUMENT);
        }
    };
    let mut supply = Hp663x::new(link);

    let mut gnuplot = None;
    let mut sink = None;
    if graph {
        match Gnuplot::spawn(&cli.gnuplot) {
            Ok((process, stdin)) => {
                let data_file = out_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                sink = Some(PlotSink::new(stdin, &data_file, plan.is_some()));
                gnuplot = Some(process);
            }
            Err(e) => warn!("cannot launch '{}', continuing without graphics: {e}", cli.gnuplot),
        }
    }

    if sampling {
        print_summary(&cli, &config, plan.as_ref());
    }

    // Raw mode lasts for the rest of the run; the guard restores the
    // terminal on drop even when the run errors out.
    let _raw = if sampling {
        match RawModeGuard::enter() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("cannot switch the terminal to raw mode: {e}");
                None
            }
        }
    } else {
        None
    };
    let mut keyboard = Keyboard::new();

    let opts = RunOptions {
        interval_tenths: cli.interval,
        flush_every: cli.flush,
        reset,
        echo: sampling,
        hold_plot: !cli.no_wait,
    };
    let result = acquire::run(
        &mut supply,
        &config,
        plan.as_ref(),
        out_path.as_deref(),
        &cli.comment,
        sink.as_mut(),
        &mut keyboard,
        &opts,
    );
    drop(sink);
    drop(gnuplot);

    match result {
        Ok(outcome) => {
            if outcome != Outcome::ConfigureOnly {
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn validate(
    cli: &Cli,
    config: &SupplyConfig,
    plan: Option<&RampPlan>,
    model: SupplyModel,
) -> Result<(), ConfigError> {
    config::validate_address(cli.address)?;
    config::validate_interval(cli.interval)?;
    config::validate_flush(cli.flush)?;
    config.validate(model)?;
    if let Some(plan) = plan {
        plan.validate(model, config.limiter_volt)?;
    }
    Ok(())
}

fn confirm_overwrite(path: &std::path::Path) -> bool {
    inquire::Confirm::new(&format!("'{}' exists, overwrite it?", path.display()))
        .with_default(false)
        .prompt()
        .unwrap_or(false)
}

fn print_summary(cli: &Cli, config: &SupplyConfig, plan: Option<&RampPlan>) {
    println!("Supply:   {} at GPIB {}::{}", cli.model, cli.board, cli.address);
    match plan {
        Some(plan) => println!(
            "Sweep:    {:.4} V ... {:.4} V in {} mV steps{}",
            plan.start,
            plan.end,
            plan.step_mv,
            if plan.dual { ", dual" } else { "" }
        ),
        None => println!("Voltage:  {:.4} V", config.volt),
    }
    println!(
        "Current:  {:.4} A ({})",
        config.amp,
        if config.ocp { "OCP trips" } else { "limiting" }
    );
    println!("Limiter:  {:.4} V", config.limiter_volt);
    println!("Interval: {:.1} s", f64::from(cli.interval) / 10.0);
    if let Some(path) = &cli.outfile {
        println!("Logging:  {}", path.display());
    }
    println!("Stop:     press 'q' or ESC");
}
