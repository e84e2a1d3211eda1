//! camcal CLI: calibrate a camera from checkerboard views.

use camcal::core::{init_with_level, ImageSize};
use camcal::{CalibrationResult, ProgressEvent, Session, SessionConfig};
use clap::Parser;
use log::LevelFilter;
use std::error::Error;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "camcal")]
#[command(about = "Estimate camera intrinsics from checkerboard images, videos or capture devices")]
#[command(version)]
struct Cli {
    /// Directory of images, video file or capture device.
    input: PathBuf,

    /// Destination path of the calibration report (JSON).
    out: PathBuf,

    /// Session config (JSON). Flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to receive one annotated image per analysed frame.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Correspondence cache path, written after detection.
    #[arg(short = 'c', long)]
    corners: Option<PathBuf>,

    /// Load views from the --corners cache instead of scanning the input.
    #[arg(long, requires = "corners")]
    reuse_corners: bool,

    /// Interior corners along the board height [default: 9].
    #[arg(long = "pattern_height", visible_alias = "ph")]
    pattern_height: Option<u32>,

    /// Interior corners along the board width [default: 6].
    #[arg(long = "pattern_width", visible_alias = "pw")]
    pattern_width: Option<u32>,

    /// Use every Nth frame of a video or device [default: 20].
    #[arg(long, visible_alias = "fs")]
    framestep: Option<usize>,

    /// Stop after this many accepted views.
    #[arg(long, visible_alias = "max")]
    max_frames: Option<usize>,

    /// Refine with the fisheye model after the pinhole fit.
    #[arg(long)]
    fisheye: bool,

    /// Fit every frame to WIDTHxHEIGHT before detection.
    #[arg(long, value_parser = parse_size)]
    fit: Option<ImageSize>,

    /// Log level: off, error, warn, info, debug, trace.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Emit tracing spans instead of plain log lines.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    tracing: bool,
}

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Single-dash multi-letter flags accepted for compatibility with existing
/// command lines; clap only knows them as long aliases.
const LEGACY_FLAGS: [&str; 4] = ["-ph", "-pw", "-fs", "-max"];

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(s) if LEGACY_FLAGS.contains(&s) => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}

fn parse_size(s: &str) -> Result<ImageSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width = w.trim().parse::<u32>().map_err(|e| format!("bad width {w:?}: {e}"))?;
    let height = h.trim().parse::<u32>().map_err(|e| format!("bad height {h:?}: {e}"))?;
    if width == 0 || height == 0 {
        return Err("fit size must be non-zero".to_string());
    }
    Ok(ImageSize::new(width, height))
}

fn session_config(cli: &Cli) -> CliResult<SessionConfig> {
    let mut cfg = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };

    if let Some(h) = cli.pattern_height {
        cfg.pattern.height = h;
    }
    if let Some(w) = cli.pattern_width {
        cfg.pattern.width = w;
    }
    if let Some(step) = cli.framestep {
        cfg.source.framestep = step;
    }
    if cli.max_frames.is_some() {
        cfg.source.max_frames = cli.max_frames;
    }
    if cli.fit.is_some() {
        cfg.source.fit = cli.fit;
    }
    if cli.fisheye {
        cfg.solver.fisheye = true;
    }
    if cli.debug_dir.is_some() {
        cfg.debug_dir = cli.debug_dir.clone();
    }
    if cli.corners.is_some() {
        cfg.corners = cli.corners.clone();
    }
    if cli.reuse_corners {
        cfg.reuse_corners = true;
    }
    Ok(cfg)
}

fn print_summary(result: &CalibrationResult) {
    println!("RMS: {:.6}", result.rms);
    println!("camera matrix:");
    for row in result.camera_matrix.to_rows() {
        println!("  [{:14.6} {:14.6} {:14.6}]", row[0], row[1], row[2]);
    }
    let coefs: Vec<String> = result.dist_coefs().iter().map(|c| format!("{c:.6}")).collect();
    println!("distortion coefficients ({:?}): [{}]", result.model(), coefs.join(", "));
}

fn run(cli: Cli) -> CliResult<()> {
    let cfg = session_config(&cli)?;
    let session = Session::new(cfg)?;

    session.run(&cli.input, &cli.out, |event| match event {
        ProgressEvent::FrameSearched { index, found } => {
            let status = if *found { "ok" } else { "not found" };
            println!("Searching for chessboard in frame {index}... {status}");
        }
        ProgressEvent::LimitReached { views } => {
            println!("Found {views} frames with the chessboard.");
        }
        ProgressEvent::CornersLoaded { views } => {
            println!("Loaded {views} views from the corner cache.");
        }
        ProgressEvent::Calibrated(result) => print_summary(result),
    })?;

    log::info!("report written to {}", cli.out.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    #[cfg(feature = "tracing")]
    let use_tracing = cli.tracing;
    #[cfg(not(feature = "tracing"))]
    let use_tracing = false;

    if use_tracing {
        #[cfg(feature = "tracing")]
        camcal::core::init_tracing(false);
    } else if let Err(err) = init_with_level(cli.log_level) {
        eprintln!("warning: logger already installed: {err}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_size() {
        assert_eq!(parse_size("640x480"), Ok(ImageSize::new(640, 480)));
        assert_eq!(parse_size("64X48"), Ok(ImageSize::new(64, 48)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("0x480").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "camcal", "in", "out.json", "--pw", "7", "--pattern_height", "5", "--fs", "3",
            "--max", "10", "--fisheye",
        ]);
        let cfg = session_config(&cli).unwrap();
        assert_eq!((cfg.pattern.width, cfg.pattern.height), (7, 5));
        assert_eq!(cfg.source.framestep, 3);
        assert_eq!(cfg.source.max_frames, Some(10));
        assert!(cfg.solver.fisheye);
        assert!(!cfg.reuse_corners);
    }

    #[test]
    fn single_dash_short_forms_are_accepted() {
        let args = ["camcal", "in", "out.json", "-ph", "7", "-pw", "5", "-fs", "3", "-max", "10"]
            .map(OsString::from);
        let cli = Cli::try_parse_from(normalize_args(args)).unwrap();
        let cfg = session_config(&cli).unwrap();
        assert_eq!((cfg.pattern.width, cfg.pattern.height), (5, 7));
        assert_eq!(cfg.source.framestep, 3);
        assert_eq!(cfg.source.max_frames, Some(10));
    }

    #[test]
    fn only_known_short_forms_are_rewritten() {
        let args = ["camcal", "-ph", "-c", "-phx", "in"].map(OsString::from);
        let out: Vec<OsString> = normalize_args(args);
        assert_eq!(out, ["camcal", "--ph", "-c", "-phx", "in"].map(OsString::from));
    }

    #[test]
    fn missing_flags_keep_defaults() {
        let cli = Cli::parse_from(["camcal", "in", "out.json"]);
        let cfg = session_config(&cli).unwrap();
        assert_eq!(cfg, SessionConfig::default());
    }
}
