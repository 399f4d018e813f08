use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use uwb_nav::algorithms::ScaleCalibrator;
use uwb_nav::api::{ApiError, CalibrationPlan, ErrorResponse, EstimationMethod, NavigationApi, PositionQuery};
use uwb_nav::{ConfigurationManager, Point2, RangeVector, RouteRequest, StreamRangeProvider};

/// UWB tag positioning and obstacle-aware routing
#[derive(Parser)]
#[command(name = "uwb-nav", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate the tag position from one epoch of ranges
    Locate(LocateArgs),
    /// Plan a route between two points
    Route(RouteArgs),
    /// Calibrate the map scale with the tag held at anchor 0
    Calibrate(CalibrateArgs),
}

#[derive(Args)]
struct LocateArgs {
    #[arg(long)]
    config: PathBuf,
    /// Comma-separated ranges in metres, in anchor order; `-` marks a failed reading
    #[arg(long, conflicts_with = "device", required_unless_present = "device")]
    ranges: Option<String>,
    /// Read one epoch from a ranging device or capture file instead
    #[arg(long)]
    device: Option<PathBuf>,
    /// linear, nonlinear or refined (default: refined, or linear with --planar)
    #[arg(long)]
    method: Option<EstimationMethod>,
    #[arg(long)]
    planar: bool,
    #[arg(long)]
    no_gdop: bool,
}

#[derive(Args)]
struct RouteArgs {
    #[arg(long)]
    config: PathBuf,
    /// x,y
    #[arg(long, value_parser = parse_point)]
    start: Point2,
    /// x,y
    #[arg(long, value_parser = parse_point)]
    destination: Point2,
}

#[derive(Args)]
struct CalibrateArgs {
    #[arg(long)]
    config: PathBuf,
    #[arg(long)]
    device: PathBuf,
    #[arg(long, default_value_t = 1)]
    first_anchor: usize,
    #[arg(long, default_value_t = 2)]
    second_anchor: usize,
    /// Map offset x,y of the first anchor from anchor 0
    #[arg(long, value_parser = parse_point)]
    first_offset: Point2,
    /// Map offset x,y of the second anchor from anchor 0
    #[arg(long, value_parser = parse_point)]
    second_offset: Point2,
    #[arg(long, default_value_t = 10)]
    samples: usize,
    #[arg(long, default_value_t = 200)]
    max_epochs: usize,
    /// Write the calibrated frame back to the configuration file
    #[arg(long)]
    save: bool,
}

fn parse_point(s: &str) -> Result<Point2, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(format!("expected x,y but got '{}'", s));
    }
    let x = parts[0].parse::<f64>().map_err(|e| format!("bad x '{}': {}", parts[0], e))?;
    let y = parts[1].parse::<f64>().map_err(|e| format!("bad y '{}': {}", parts[1], e))?;
    Ok(Point2::new(x, y))
}

fn parse_ranges(s: &str) -> Result<RangeVector, String> {
    s.split(',')
        .map(str::trim)
        .map(|part| match part {
            "-" | "" => Ok(None),
            value => value
                .parse::<f64>()
                .map(Some)
                .map_err(|e| format!("bad range '{}': {}", value, e)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(RangeVector::new)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<Result<(), ApiError>, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Locate(args) => {
            let manager = ConfigurationManager::from_file(&args.config)?;
            let api = NavigationApi::from_config(&manager)?;
            let query = PositionQuery {
                method: args.method.unwrap_or(if args.planar {
                    EstimationMethod::Linear
                } else {
                    EstimationMethod::Refined
                }),
                planar: args.planar,
                include_gdop: !args.no_gdop,
                initial_guess: None,
            };

            let result = match (&args.ranges, &args.device) {
                (Some(ranges), _) => api.locate(&parse_ranges(ranges)?, &query),
                (None, Some(device)) => {
                    let mut provider = StreamRangeProvider::new(File::open(device)?);
                    api.locate_from(&mut provider, &query)
                }
                (None, None) => return Err("either --ranges or --device is required".into()),
            };
            match result {
                Ok(response) => print_json(&response).map(Ok),
                Err(e) => Ok(Err(e)),
            }
        }
        Command::Route(args) => {
            let manager = ConfigurationManager::from_file(&args.config)?;
            let api = NavigationApi::from_config(&manager)?;
            let request = RouteRequest {
                start: args.start,
                destination: Some(args.destination),
            };
            match api.route(&request) {
                Ok(response) => print_json(&response).map(Ok),
                Err(e) => Ok(Err(e)),
            }
        }
        Command::Calibrate(args) => {
            let mut manager = ConfigurationManager::from_file(&args.config)?;
            let mut api = NavigationApi::from_config(&manager)?;
            let mut provider = StreamRangeProvider::new(File::open(&args.device)?);
            let plan = CalibrationPlan {
                first_anchor: args.first_anchor,
                second_anchor: args.second_anchor,
                first_offset: args.first_offset,
                second_offset: args.second_offset,
                max_epochs: args.max_epochs,
            };

            let frame = match api.calibrate_scale(&mut provider, &plan, ScaleCalibrator::new(args.samples, 0.1)) {
                Ok(frame) => frame,
                Err(e) => return Ok(Err(e)),
            };
            print_json(&frame)?;
            if args.save {
                manager.set_frame(frame);
                manager.save_to_file(&args.config)?;
                info!("calibrated frame written to {}", args.config.display());
            }
            Ok(Ok(()))
        }
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli)? {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            print_json(&ErrorResponse::from(&e))?;
            Ok(ExitCode::FAILURE)
        }
    }
}
