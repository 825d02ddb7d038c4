use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};

use edvs_patchflow::{Event, FlowConfig, FlowEngine, MotionEstimator, ReichardtFlow, SliceMethod};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Estimator {
    /// Slice histograms and block matching
    Patch,
    /// Per-pixel timestamp correlation
    Reichardt,
}

/// Estimate optical flow from eDVS events on stdin.
///
/// Reads tab-separated events (x y timestamp polarity) from stdin and writes
/// one flow record (x y timestamp vx vy speed) per accepted event to stdout.
#[derive(Parser, Debug)]
#[command(name = "edvs-flow", version, about, long_about = None)]
struct Args {
    /// Sensor width
    #[arg(long, default_value_t = 128)]
    width: u32,

    /// Sensor height
    #[arg(long, default_value_t = 128)]
    height: u32,

    /// TOML configuration file; command-line values override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Estimator::Patch)]
    estimator: Estimator,

    /// Match window half-width and search range, in subsampled pixels
    #[arg(long)]
    search_distance: Option<u32>,

    /// Right shift applied to sensor coordinates
    #[arg(long)]
    subsample_shift: Option<u32>,

    /// "constant_duration" or "constant_event_number"
    #[arg(long)]
    slice_method: Option<SliceMethod>,

    #[arg(long)]
    slice_duration_us: Option<i64>,

    #[arg(long)]
    slice_event_count: Option<u32>,

    #[arg(long)]
    scale_factor: Option<f32>,

    /// Maximum timestamp gap for the reichardt estimator
    #[arg(long)]
    max_dt_us: Option<i64>,
}

impl Args {
    fn flow_config(&self) -> edvs_patchflow::Result<FlowConfig> {
        let mut config = match &self.config {
            Some(path) => FlowConfig::load(path)?,
            None => FlowConfig::default(),
        };
        if let Some(v) = self.search_distance {
            config.search_distance = v;
        }
        if let Some(v) = self.subsample_shift {
            config.subsample_shift = v;
        }
        if let Some(v) = self.slice_method {
            config.slice_method = v;
        }
        if let Some(v) = self.slice_duration_us {
            config.slice_duration_us = v;
        }
        if let Some(v) = self.slice_event_count {
            config.slice_event_count = v;
        }
        if let Some(v) = self.scale_factor {
            config.scale_factor = v;
        }
        if let Some(v) = self.max_dt_us {
            config.max_dt_us = v;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_event(line: &str) -> Option<Event> {
    let mut parts = line.split('\t').map(str::trim);
    let x: u16 = parts.next()?.parse().ok()?;
    let y: u16 = parts.next()?.parse().ok()?;
    let ts: i64 = parts.next()?.parse().ok()?;
    let pol: i8 = parts.next()?.parse().ok()?;
    Some(Event::new(x, y, ts, pol))
}

fn build_estimator(args: &Args, config: FlowConfig) -> edvs_patchflow::Result<Box<dyn MotionEstimator>> {
    Ok(match args.estimator {
        Estimator::Patch => Box::new(FlowEngine::with_sensor(config, args.width, args.height)?),
        Estimator::Reichardt => {
            if args.width == 0
                || args.height == 0
                || args.width > edvs_patchflow::MAX_SENSOR_DIM
                || args.height > edvs_patchflow::MAX_SENSOR_DIM
            {
                return Err(edvs_patchflow::FlowError::InvalidDimensions {
                    width: args.width,
                    height: args.height,
                    search_distance: config.search_distance,
                });
            }
            Box::new(ReichardtFlow::from_config(args.width, args.height, &config))
        }
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = match args.flow_config() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "estimator {:?}, sensor {}x{}, {:?}",
        args.estimator, args.width, args.height, config
    );
    let mut estimator = match build_estimator(&args, config) {
        Ok(est) => est,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    let mut total: u64 = 0;
    let mut emitted: u64 = 0;
    let mut malformed: u64 = 0;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(event) = parse_event(line) else {
            malformed += 1;
            continue;
        };
        total += 1;

        if let Some(record) = estimator.flow(&event) {
            emitted += 1;
            if writeln!(out, "{}", record).is_err() {
                break;
            }
        }
    }
    if let Err(e) = out.flush() {
        warn!("failed to flush output: {}", e);
    }

    info!(
        "{}/{} events produced flow ({:.1}%), {} malformed lines",
        emitted,
        total,
        if total > 0 {
            100.0 * emitted as f64 / total as f64
        } else {
            0.0
        },
        malformed
    );
    ExitCode::SUCCESS
}
