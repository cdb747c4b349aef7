use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use astime_core::{
    Comparison, DEFAULT_COUNT, DEFAULT_SAMPLE_RATE, ExtractOptions, ExtractSummary, FitError,
    FitOptions, FitlineReport, LineFit, MacAddr, compare_fits, extract_capture_file,
    extract_capture_stream, fit_file, render_plots,
};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "astime")]
#[command(version)]
#[command(
    about = "Offline AVTP presentation-time extraction and clock line fitting.",
    long_about = None,
    after_help = "Examples:\n  astime extract capture.pcap -c 1000 --out-dir ts\n  astime extract capture.pcapng b.csv --dst-mac 91:e0:f0:00:fe:01\n  astime fitline ts/seq0.csv ts/seq1.csv -c 1000 -p"
)]
struct Cli {
    /// Only log errors (RUST_LOG overrides)
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract AVTP presentation times from a capture into CSV files.
    #[command(
        after_help = "Without --dst-mac the first two AVTP streams are written to seq0.csv and seq1.csv.\nExamples:\n  astime extract capture.pcap -c 1000 --out-dir ts\n  astime extract 'captures/*.pcapng' b.csv --dst-mac 91:e0:f0:00:fe:01"
    )]
    Extract {
        /// Path (or glob pattern) of a .pcap or .pcapng file
        capture: PathBuf,

        /// Output CSV for the stream selected with --dst-mac
        #[arg(requires = "dst_mac")]
        output: Option<PathBuf>,

        /// Timestamps to extract per stream
        #[arg(short = 'c', long, default_value_t = DEFAULT_COUNT, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,

        /// Extract only the stream sent to this destination MAC
        #[arg(long, value_name = "MAC", requires = "output", conflicts_with = "out_dir")]
        dst_mac: Option<MacAddr>,

        /// Directory for the seq<n>.csv files (default: current directory)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fit a line to one or two timestamp files and compare them.
    #[command(alias = "fit")]
    Fitline {
        /// CSV file of index,timestamp rows
        file: PathBuf,

        /// Second CSV file to compare against the first
        file2: Option<PathBuf>,

        /// Leading rows to fit
        #[arg(short = 'c', long, default_value_t = DEFAULT_COUNT, value_parser = clap::value_parser!(u64).range(1..))]
        count: u64,

        /// Render histogram and deviation plots as SVG
        #[arg(short = 'p', long)]
        plot: bool,

        /// Directory for the plots (default: current directory)
        #[arg(long, value_name = "DIR", requires = "plot")]
        plot_dir: Option<PathBuf>,

        /// Audio sample rate used to express offsets in samples
        #[arg(long, value_name = "HZ", default_value_t = DEFAULT_SAMPLE_RATE, value_parser = clap::value_parser!(u32).range(1..))]
        sample_rate: u32,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let result = match cli.command {
        Commands::Extract {
            capture,
            output,
            count,
            dst_mac,
            out_dir,
            json,
        } => cmd_extract(capture, output, count, dst_mac, out_dir, json),
        Commands::Fitline {
            file,
            file2,
            count,
            plot,
            plot_dir,
            sample_rate,
            json,
        } => {
            let options = FitOptions {
                count: count as usize,
                sample_rate,
            };
            let plot_dir = plot.then(|| plot_dir.unwrap_or_else(|| PathBuf::from(".")));
            cmd_fitline(file, file2, options, plot_dir, json)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_extract(
    capture: PathBuf,
    output: Option<PathBuf>,
    count: u64,
    dst_mac: Option<MacAddr>,
    out_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let capture = locate_capture(&capture)?;

    let summary = match (dst_mac, output) {
        (Some(dst), Some(output)) => {
            ensure_distinct_output(&capture, &output)?;
            extract_capture_stream(&capture, &output, dst, count)
                .with_context(|| format!("Extraction failed for {}", capture.display()))?
        }
        (None, None) => {
            let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("."));
            extract_capture_file(&capture, &out_dir, &ExtractOptions::with_count(count))
                .with_context(|| format!("Extraction failed for {}", capture.display()))?
        }
        _ => {
            return Err(CliError::new(
                "single-stream extraction needs both OUTPUT and --dst-mac",
                Some("pass an output file together with --dst-mac MAC".to_string()),
            ));
        }
    };

    if json {
        let text =
            serde_json::to_string_pretty(&summary).context("JSON serialization failed")?;
        println!("{}", text);
    } else {
        print_extract_summary(&summary);
    }
    Ok(())
}

fn print_extract_summary(summary: &ExtractSummary) {
    for stream in &summary.streams {
        println!(
            "MAC {} {} AVTP timestamps stored to {}",
            stream.dst, stream.timestamps, stream.output
        );
        println!("         Timestamp uncertain count: {}", stream.uncertain);
        if stream.sequence_errors > 0 {
            println!("         Sequence errors: {}", stream.sequence_errors);
        }
    }
    println!(
        "Packets read: {} ({} AVTP, {} undecodable)",
        summary.packets_total, summary.avtp_packets, summary.decode_errors
    );
    if let (Some(start), Some(end)) = (&summary.time_start, &summary.time_end) {
        println!("Capture time: {} .. {}", start, end);
    }
    if summary.complete {
        println!("Complete");
    } else {
        println!(
            "Incomplete: {} of {} timestamps found",
            summary.samples_written, summary.requested
        );
    }
}

fn cmd_fitline(
    file: PathBuf,
    file2: Option<PathBuf>,
    options: FitOptions,
    plot_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let mut fits = vec![fit_one(&file, options.count)?];
    if let Some(file2) = file2.as_ref() {
        fits.push(fit_one(file2, options.count)?);
    }

    if let Some(dir) = plot_dir.as_ref() {
        for fit in &fits {
            let files = render_plots(fit, dir)
                .with_context(|| format!("Failed to render plots for {}", fit.source))?;
            info!(
                histogram = %files.histogram.display(),
                deviation = %files.deviation.display(),
                "plots written"
            );
        }
    }

    let comparison = match fits.as_slice() {
        [first, second] => Some(
            compare_fits(first, second, options.sample_rate)
                .map_err(|err| CliError::new(format!("cannot compare fits: {err}"), None))?,
        ),
        _ => None,
    };

    if json {
        let report = FitlineReport {
            fits: fits.iter().map(LineFit::report).collect(),
            comparison,
        };
        let text = serde_json::to_string_pretty(&report).context("JSON serialization failed")?;
        println!("{}", text);
        return Ok(());
    }

    for fit in &fits {
        print_fit(fit);
    }
    if let Some(comparison) = comparison.as_ref() {
        print_comparison(comparison);
    }
    Ok(())
}

fn fit_one(path: &Path, count: usize) -> Result<LineFit, CliError> {
    if !path.is_file() {
        return Err(CliError::new(
            format!("sample file not found: {}", path.display()),
            Some("pass a CSV file written by `astime extract`".to_string()),
        ));
    }
    fit_file(path, count).map_err(|err| {
        let hint = match &err {
            FitError::NotEnoughRows { available, .. } => Some(format!(
                "the file has {available} usable rows; lower -c/--count"
            )),
            FitError::DegenerateFit { .. } => {
                Some("a line needs at least two rows with distinct x values".to_string())
            }
            _ => None,
        };
        CliError::new(format!("cannot fit {}: {err}", path.display()), hint)
    })
}

/// Wider histograms are printed as their non-empty bins only.
const DENSE_HISTOGRAM_BINS: u64 = 1024;

fn print_fit(fit: &LineFit) {
    println!("File: {}", fit.source);
    println!("Line slope: {}", fit.slope);
    println!("Line y intercept: {}", fit.intercept);
    println!(
        "Maximum deviation from fitted line (ns): {}",
        fit.max_deviation
    );
    println!("Histogram of deviations (ns):");
    let histogram = &fit.histogram;
    match histogram.dense(DENSE_HISTOGRAM_BINS) {
        Some((edges, counts)) => {
            println!("\tBins (ns): {:?}", edges);
            println!("\tCounts: {:?}", counts);
        }
        None => {
            println!(
                "\tBins (ns): {} .. {} in {} bins of 1 ns",
                histogram.low,
                histogram.high,
                histogram.bin_count()
            );
            let bins: Vec<String> = histogram
                .bins()
                .map(|(lower, _, count)| format!("{lower}: {count}"))
                .collect();
            println!("\tNon-empty bins (lower edge: count): {}", bins.join(", "));
        }
    }
}

fn print_comparison(cmp: &Comparison) {
    println!("=== Comparison of the fitted lines and data of the two input files ===");
    println!("PPB frequency difference: {:.6}", cmp.ppb_frequency_difference);
    println!(
        "Time offset: {:.3} ns, or {:.6} samples",
        cmp.offset_ns, cmp.offset_samples
    );
    println!(
        "Time offset rounded to nearest sample: {} samples, or {:.3} ns",
        cmp.rounded_offset_samples, cmp.rounded_offset_ns
    );
    println!(
        "Maximum instantaneous offset per timestamp: {:.3} ns ({:.6} of sample period)",
        cmp.max_instantaneous_offset_ns, cmp.max_instantaneous_offset_fraction
    );
    println!(
        "\tfor reference 0.25 of a sample at {} Hz is {:.3} ns",
        cmp.sample_rate,
        cmp.quarter_sample_ns()
    );
}

fn ensure_distinct_output(capture: &Path, output: &Path) -> Result<(), CliError> {
    let capture_abs = fs::canonicalize(capture)
        .with_context(|| format!("cannot resolve capture path: {}", capture.display()))?;
    if let Ok(output_abs) = fs::canonicalize(output) {
        if output_abs == capture_abs {
            return Err(CliError::new(
                format!("output path must differ from input: {}", output.display()),
                Some("choose a different output path".to_string()),
            ));
        }
    }
    Ok(())
}

/// Capture formats `astime extract` can read.
const CAPTURE_EXTENSIONS: [&str; 2] = ["pcap", "pcapng"];

/// Expand a glob to exactly one capture and check that it is readable.
fn locate_capture(capture: &Path) -> Result<PathBuf, CliError> {
    let capture = expand_capture_pattern(capture)?;
    if !capture.is_file() {
        let problem = if capture.exists() { "is not a file" } else { "not found" };
        return Err(CliError::new(
            format!("capture {problem}: {}", capture.display()),
            Some("astime extract reads one .pcap or .pcapng capture".to_string()),
        ));
    }
    let ext = capture
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !CAPTURE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CliError::new(
            format!("not a capture file: {}", capture.display()),
            Some("astime extract reads .pcap and .pcapng captures only".to_string()),
        ));
    }
    Ok(capture)
}

fn expand_capture_pattern(capture: &Path) -> Result<PathBuf, CliError> {
    let pattern = capture.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(capture.to_path_buf());
    }

    let bad_pattern = |detail: String| {
        CliError::new(
            format!("bad capture pattern '{pattern}'"),
            Some(format!("{detail}; quote the pattern so the shell leaves it alone")),
        )
    };
    let mut captures = Vec::new();
    for entry in glob(&pattern).map_err(|err| bad_pattern(err.msg.to_string()))? {
        let path = entry.map_err(|err| bad_pattern(err.to_string()))?;
        if path.is_file() {
            captures.push(path);
        }
    }

    match captures.as_slice() {
        [] => Err(CliError::new(
            format!("capture pattern '{pattern}' matches no file"),
            Some("astime extract needs exactly one .pcap or .pcapng capture".to_string()),
        )),
        [only] => Ok(only.clone()),
        many => {
            let mut shown: Vec<String> =
                many.iter().take(3).map(|p| p.display().to_string()).collect();
            if many.len() > 3 {
                shown.push("...".to_string());
            }
            Err(CliError::new(
                format!(
                    "capture pattern '{pattern}' matches {} files: {}",
                    many.len(),
                    shown.join(", ")
                ),
                Some("astime extracts one capture per run; narrow the pattern".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
