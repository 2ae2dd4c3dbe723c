//! Command-line interface for the RC lab plotting pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{AlignmentConfig, ConfigError};
use crate::processors::alignment::MatchStrategy;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "rc-lab-plot")]
#[command(about = "Align and plot paired RC-circuit oscilloscope captures", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align every pair in every configured folder and render figures
    Run {
        /// Directory containing the experiment folders
        #[arg(long)]
        root: Option<PathBuf>,
        /// Directory to write PNG figures into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Skip captions, axis labels and legends
        #[arg(long)]
        no_text: bool,
    },

    /// List matched capture pairs and orphan files in a folder
    Pairs {
        /// Experiment folder to scan
        folder: PathBuf,
    },

    /// Align a single input/capacitor pair and write the combined CSV
    Align {
        /// Input-voltage capture CSV
        input_csv: PathBuf,
        /// Capacitor-voltage capture CSV
        cap_csv: PathBuf,
        /// Output combined CSV
        output_csv: PathBuf,
        /// Matching strategy (defaults to the configured one)
        #[arg(long, value_enum)]
        strategy: Option<MatchStrategy>,
        /// Maximum time distance accepted for a match
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination YAML file
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            let head: String = value.chars().take(35).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Load the configuration named on the command line, or the defaults.
///
/// An explicitly given file that cannot be read or fails validation is an
/// error rather than a silent fallback.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    match path {
        Some(path) => {
            let cfg = PipelineConfig::from_yaml(path)?;
            info!("Loaded config from: {}", path.display());
            Ok(cfg)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Merge `align` flags over the configured alignment and validate the result.
fn align_options(
    strategy: Option<MatchStrategy>,
    tolerance: Option<f64>,
    config: &PipelineConfig,
) -> Result<AlignmentConfig, ConfigError> {
    let options = match align_options(strategy, tolerance, config) {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    options.validate()?;
    Ok(options)
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            let path = cli.config.as_deref().unwrap_or(Path::new(""));
            error!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Run { root, output_dir, no_text } => {
            cmd_run(root, output_dir, no_text, config);
        }
        Commands::Pairs { folder } => {
            cmd_pairs(&folder, &config);
        }
        Commands::Align { input_csv, cap_csv, output_csv, strategy, tolerance } => {
            cmd_align(&input_csv, &cap_csv, &output_csv, strategy, tolerance, &config);
        }
        Commands::InitConfig { path } => {
            cmd_init_config(&path, &config);
        }
    }
}

fn cmd_run(
    root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    no_text: bool,
    mut config: PipelineConfig,
) {
    use crate::processors::batch;

    let start = Instant::now();

    if let Some(root) = root {
        config.root = root;
    }
    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }
    if no_text {
        config.plot.draw_text = false;
    }

    println!("Processing experiment folders...");
    println!("Data root: {}", config.root.display());
    println!("Output directory: {}", config.output_dir.display());
    println!("Folders configured: {}", config.folders.len());

    let spinner = create_spinner("Aligning captures and rendering figures...");

    match batch::run_experiments(&config) {
        Ok(summary) => {
            spinner.finish_and_clear();

            let missing = if summary.folders_missing.is_empty() {
                "none".to_string()
            } else {
                summary.folders_missing.join(", ")
            };

            print_summary(
                "Run Complete",
                &[
                    ("Data root", config.root.display().to_string()),
                    ("Folders processed", summary.folders_processed.to_string()),
                    ("Folders missing", missing),
                    ("Pairs plotted", summary.jobs.to_string()),
                    ("Pairs skipped", summary.skipped.to_string()),
                    ("Pairs failed", summary.failed.to_string()),
                    ("Unmatched files", summary.unmatched.to_string()),
                    ("Figures written", summary.outputs.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Run failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_pairs(folder: &PathBuf, config: &PipelineConfig) {
    use crate::processors::pairing;

    let listing = match pairing::discover_pairs(folder, &config.channels) {
        Ok(listing) => listing,
        Err(e) => {
            error!("Failed to scan {}: {}", folder.display(), e);
            std::process::exit(1);
        }
    };

    for pair in &listing.pairs {
        println!("{}", pair.label());
    }
    for path in &listing.unmatched {
        println!("unmatched: {}", path.display());
    }

    print_summary(
        "Pair Discovery Complete",
        &[
            ("Folder", folder.display().to_string()),
            ("Matched pairs", listing.pairs.len().to_string()),
            ("Unmatched files", listing.unmatched.len().to_string()),
        ],
    );
}

fn cmd_align(
    input_csv: &PathBuf,
    cap_csv: &PathBuf,
    output_csv: &PathBuf,
    strategy: Option<MatchStrategy>,
    tolerance: Option<f64>,
    config: &PipelineConfig,
) {
    use crate::core::{loaders, writers};
    use crate::processors::alignment;

    let start = Instant::now();

    let options = match align_options(strategy, tolerance, config) {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    println!("Aligning capture pair...");
    println!("Input: {}", input_csv.display());
    println!("Capacitor: {}", cap_csv.display());
    println!("Strategy: {:?}", options.strategy);

    let load = |path: &PathBuf| match loaders::load_capture_csv(path, &config.channels) {
        Ok(capture) => capture,
        Err(e) => {
            error!("Failed to load {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    let input = load(input_csv);
    let cap = load(cap_csv);

    let series = alignment::align_with(&input, &cap, &options);

    match writers::write_combined_csv(output_csv, &series, &config.channels) {
        Ok(()) => {
            print_summary(
                "Alignment Complete",
                &[
                    ("Output file", output_csv.display().to_string()),
                    ("Rows", series.len().to_string()),
                    ("Matched rows", series.matched_count().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Failed to write combined CSV: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_init_config(path: &PathBuf, config: &PipelineConfig) {
    match config.to_yaml(path) {
        Ok(()) => println!("Wrote configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write config to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
