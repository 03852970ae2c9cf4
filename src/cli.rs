use std::path::{Path, PathBuf};

use beatwarp::io::wav::{read_wav_file, write_wav_file, WavEncoding};
use beatwarp::{
    analyze_buffer, correct_grid, warp, BackendKind, BeatGrid, GridCorrectionSettings,
    WarpError, WarpOptions,
};
use serde::Serialize;

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
struct CliArgs {
    input: PathBuf,
    bpm: Option<f64>,
    strength: f64,
    anchor: usize,
    anchor_time: Option<f64>,
    options: WarpOptions,
    out: Option<PathBuf>,
    float: bool,
    grid_out: Option<PathBuf>,
    verbose: bool,
}

/// Beat grids written by `--grid-out`.
#[derive(Debug, Serialize)]
struct GridReport<'a> {
    bpm_estimate: f64,
    target_bpm: f64,
    source_beats: &'a BeatGrid,
    corrected_beats: &'a BeatGrid,
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        std::process::exit(if args.is_empty() { 1 } else { 0 });
    }

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("ERROR: {}", msg);
            print_usage();
            std::process::exit(1);
        }
    };

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&cli) {
        Ok(path) => println!("OK: wrote {}", path.display()),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: &CliArgs) -> Result<PathBuf, WarpError> {
    let buffer = read_wav_file(&cli.input)?;
    log::info!(
        "input: {} frames, {} Hz, {} ch, {:.2}s",
        buffer.num_frames(),
        buffer.sample_rate,
        buffer.channels,
        buffer.duration_secs()
    );

    let analysis = analyze_buffer(&buffer)?;
    let target_bpm = cli.bpm.unwrap_or_else(|| analysis.bpm_estimate.round());
    let settings = GridCorrectionSettings::new(target_bpm)?
        .with_strength(cli.strength)
        .with_anchor_index(anchor_index(cli, &analysis.beats));
    let corrected = correct_grid(&analysis.beats, &settings)?;
    log::info!(
        "correcting {} beats toward {:.2} BPM (estimate {:.2}, strength {:.2})",
        analysis.beats.len(),
        target_bpm,
        analysis.bpm_estimate,
        settings.strength
    );

    if let Some(grid_path) = &cli.grid_out {
        let report = GridReport {
            bpm_estimate: analysis.bpm_estimate,
            target_bpm,
            source_beats: &analysis.beats,
            corrected_beats: &corrected,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| WarpError::Io(format!("grid report: {}", e)))?;
        std::fs::write(grid_path, json)
            .map_err(|e| WarpError::Io(format!("{}: {}", grid_path.display(), e)))?;
        log::info!("wrote beat grids to {}", grid_path.display());
    }

    let start = std::time::Instant::now();
    let result = warp(&buffer, &analysis.beats, &corrected, &cli.options)?;
    log::debug!(
        "warp took {:.3}s for {:.2}s of audio",
        start.elapsed().as_secs_f64(),
        buffer.duration_secs()
    );

    let out_path = cli
        .out
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input, target_bpm));
    let encoding = if cli.float {
        WavEncoding::Float32
    } else {
        WavEncoding::Pcm16
    };
    write_wav_file(&out_path, &result.audio, encoding)?;
    Ok(out_path)
}

/// Beat index the ideal grid starts from. `--anchor-time` picks the beat
/// nearest that time and wins over `--anchor`.
fn anchor_index(cli: &CliArgs, beats: &BeatGrid) -> usize {
    match cli.anchor_time.and_then(|t| beats.nearest_index(t)) {
        Some(index) => {
            log::info!(
                "anchoring on beat {} ({:.3}s), nearest to {:.3}s",
                index,
                beats.times()[index],
                cli.anchor_time.unwrap_or_default()
            );
            index
        }
        None => cli.anchor,
    }
}

/// `<stem>_straight_<bpm>.wav` in the current directory.
fn default_output_path(input: &Path, target_bpm: f64) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{}_straight_{:.2}.wav", stem, target_bpm))
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut bpm = None;
    let mut strength: f64 = 0.7;
    let mut anchor: usize = 0;
    let mut anchor_time = None;
    let mut options = WarpOptions::default();
    let mut out = None;
    let mut float = false;
    let mut grid_out = None;
    let mut verbose = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--bpm" => {
                i += 1;
                bpm = Some(parse_value::<f64>(args, i, "bpm")?);
            }
            "--strength" => {
                i += 1;
                strength = parse_value(args, i, "strength")?;
            }
            "--anchor" => {
                i += 1;
                anchor = parse_value(args, i, "anchor")?;
            }
            "--anchor-time" => {
                i += 1;
                anchor_time = Some(parse_value::<f64>(args, i, "anchor-time")?);
            }
            "--crossfade-ms" => {
                i += 1;
                options = options.with_crossfade_ms(parse_value(args, i, "crossfade-ms")?);
            }
            "--min-seg-ms" => {
                i += 1;
                options = options.with_min_segment_ms(parse_value(args, i, "min-seg-ms")?);
            }
            "--headroom-db" => {
                i += 1;
                options = options.with_headroom_db(Some(parse_value(args, i, "headroom-db")?));
            }
            "--no-normalize" => options = options.with_headroom_db(None),
            "--engine" => {
                i += 1;
                let engine: BackendKind = value(args, i, "engine")?
                    .parse()
                    .map_err(|e: WarpError| e.to_string())?;
                options = options.with_backend(engine);
            }
            "--workers" => {
                i += 1;
                options = options.with_workers(parse_value(args, i, "workers")?);
            }
            "--out" | "-o" => {
                i += 1;
                out = Some(PathBuf::from(value(args, i, "out")?));
            }
            "--float" => float = true,
            "--grid-out" => {
                i += 1;
                grid_out = Some(PathBuf::from(value(args, i, "grid-out")?));
            }
            "--verbose" | "-v" => verbose = true,
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{}'", other));
            }
            other => {
                if input.is_some() {
                    return Err(format!("unexpected argument '{}'", other));
                }
                input = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }

    if let Some(b) = bpm {
        if !b.is_finite() || b <= 0.0 {
            return Err(format!("--bpm must be positive, got {}", b));
        }
    }
    if let Some(t) = anchor_time {
        if !t.is_finite() || t < 0.0 {
            return Err(format!("--anchor-time must be a non-negative time, got {}", t));
        }
    }
    if !(0.0..=1.0).contains(&strength) {
        return Err(format!("--strength must be within 0..1, got {}", strength));
    }

    Ok(CliArgs {
        input: input.ok_or_else(|| "missing input file".to_string())?,
        bpm,
        strength,
        anchor,
        anchor_time,
        options,
        out,
        float,
        grid_out,
        verbose,
    })
}

fn value<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str, String> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| format!("--{} requires a value", name))
}

fn parse_value<T: std::str::FromStr>(args: &[String], idx: usize, name: &str) -> Result<T, String> {
    let raw = value(args, idx, name)?;
    raw.parse()
        .map_err(|_| format!("invalid {}: {}", name, raw))
}

fn print_usage() {
    eprintln!("Usage: beatwarp-cli <input.wav> [options]");
    eprintln!();
    eprintln!("Detects the beats of a recording and straightens them onto an even tempo.");
    eprintln!();
    eprintln!("Grid:");
    eprintln!("  --bpm <f>            Target BPM (default: rounded estimate)");
    eprintln!("  --strength <f>       Pull toward the ideal grid, 0..1 (default: 0.7)");
    eprintln!("  --anchor <n>         Beat index the ideal grid starts from (default: 0)");
    eprintln!("  --anchor-time <s>    Start the ideal grid at the beat nearest this time");
    eprintln!();
    eprintln!("Warp:");
    eprintln!("  --engine <name>      auto (default), signalsmith, phase-vocoder");
    eprintln!("  --crossfade-ms <f>   Crossfade between beats, 0..20 (default: 10)");
    eprintln!("  --min-seg-ms <f>     Shorter segments are copied unstretched (default: 40)");
    eprintln!("  --headroom-db <f>    Output peak ceiling below full scale (default: 1)");
    eprintln!("  --no-normalize       Disable the peak ceiling");
    eprintln!("  --workers <n>        Stretch threads, 0 = one per core (default: 0)");
    eprintln!();
    eprintln!("Output:");
    eprintln!("  --out, -o <path>     Output WAV (default: <name>_straight_<bpm>.wav)");
    eprintln!("  --float              Write 32-bit float output (default: 16-bit)");
    eprintln!("  --grid-out <path>    Write source and corrected beat grids as JSON");
    eprintln!("  --verbose, -v        Debug logging (RUST_LOG overrides)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  beatwarp-cli live_take.wav");
    eprintln!("  beatwarp-cli live_take.wav --bpm 124 --strength 1.0 --out take_124.wav");
    eprintln!("  beatwarp-cli live_take.wav --engine phase-vocoder --grid-out grid.json");
}
