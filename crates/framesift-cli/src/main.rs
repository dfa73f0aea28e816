//! framesift CLI — curate camera frame dumps into training datasets.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use framesift_core::{curate, load_intrinsics, CurateConfig, Error};

#[derive(Parser)]
#[command(name = "framesift")]
#[command(about = "Select every Nth camera frame into a dataset, optionally undistorting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Curate frames from source directories into a dataset directory.
    Curate(CliCurateArgs),

    /// Load a calibration file and print the camera model.
    CalibInfo {
        /// Path to the ROS camera_info calibration YAML.
        #[arg(long)]
        calibration: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliCurateArgs {
    /// Source directory with frames; repeat to process several in order.
    #[arg(long = "source-dir", required = true)]
    source_dirs: Vec<PathBuf>,

    /// Keep one out of every N eligible frames.
    #[arg(long, default_value = "1")]
    keep_every: usize,

    /// Directory that receives the curated frames (created if needed).
    #[arg(long)]
    dest: PathBuf,

    /// Prefix for emitted file names ("{prefix}_{count}.png").
    #[arg(long, default_value = "frame")]
    prefix: String,

    /// Undistort each kept frame through the calibration model.
    #[arg(long, requires = "calibration")]
    rectify: bool,

    /// Path to the ROS camera_info calibration YAML.
    #[arg(long)]
    calibration: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Curate(args) => run_curate(&args),
        Commands::CalibInfo { calibration } => run_calib_info(&calibration),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Map fatal errors onto process exit codes; a missing calibration file
/// gets the distinct code 3.
fn exit_code(err: &Error) -> u8 {
    match err {
        Error::MissingCalibration(_) => 3,
        _ => 1,
    }
}

// ── curate ─────────────────────────────────────────────────────────────

fn run_curate(args: &CliCurateArgs) -> Result<(), Error> {
    let model = if args.rectify {
        let path = args
            .calibration
            .as_deref()
            .expect("clap enforces --calibration with --rectify");
        Some(load_intrinsics(path)?)
    } else {
        None
    };

    std::fs::create_dir_all(&args.dest)?;

    let config = CurateConfig {
        source_dirs: args.source_dirs.clone(),
        keep_every: args.keep_every,
        destination_dir: args.dest.clone(),
        name_prefix: args.prefix.clone(),
        rectify: args.rectify,
        calibration_path: args.calibration.clone(),
    };

    let summary = curate(&config, model.as_ref())?;
    tracing::info!(
        "done: {} scanned, {} selected, {} copied, {} rectified, {} decode failures, {} directories skipped",
        summary.scanned,
        summary.selected,
        summary.copied,
        summary.rectified,
        summary.decode_failures,
        summary.skipped_dirs
    );
    Ok(())
}

// ── calib-info ─────────────────────────────────────────────────────────

fn run_calib_info(calibration: &Path) -> Result<(), Error> {
    let model = load_intrinsics(calibration)?;

    println!("calibration: {}", calibration.display());
    println!("distortion model: {}", model.distortion_model);
    println!("camera matrix K:");
    for r in 0..3 {
        println!(
            "  [{:10.4} {:10.4} {:10.4}]",
            model.camera_matrix[(r, 0)],
            model.camera_matrix[(r, 1)],
            model.camera_matrix[(r, 2)]
        );
    }
    println!(
        "distortion D: [{:.6}, {:.6}, {:.6}, {:.6}, {:.6}]",
        model.distortion[0],
        model.distortion[1],
        model.distortion[2],
        model.distortion[3],
        model.distortion[4]
    );
    println!("rectification R:");
    for r in 0..3 {
        println!(
            "  [{:10.4} {:10.4} {:10.4}]",
            model.rectification[(r, 0)],
            model.rectification[(r, 1)],
            model.rectification[(r, 2)]
        );
    }
    println!("projection P:");
    for r in 0..3 {
        println!(
            "  [{:10.4} {:10.4} {:10.4} {:10.4}]",
            model.projection[(r, 0)],
            model.projection[(r, 1)],
            model.projection[(r, 2)],
            model.projection[(r, 3)]
        );
    }
    Ok(())
}
