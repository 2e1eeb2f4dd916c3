use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "oxiload",
    version,
    about = "Load, transform and cache images",
    long_about = None
)]
pub struct CliArgs {
    /// Image sources: http(s) URLs or file paths.
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Fit images into WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH", value_parser = parse_dimensions)]
    pub size: Option<(u32, u32)>,

    /// Crop the center to WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH", value_parser = parse_dimensions)]
    pub crop: Option<(u32, u32)>,

    /// Convert to grayscale.
    #[arg(long)]
    pub grayscale: bool,

    /// Apply a gaussian blur with this sigma.
    #[arg(long, value_name = "SIGMA")]
    pub blur: Option<f32>,

    /// Write each result as <n>.png into this directory.
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Skip the memory tier.
    #[arg(long)]
    pub no_memory_cache: bool,

    /// Skip the storage tier.
    #[arg(long)]
    pub no_storage_cache: bool,

    /// Clear both cache tiers before loading.
    #[arg(long)]
    pub clear_cache: bool,

    /// Storage tier directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Upper bound on load threads.
    #[arg(long, value_name = "N")]
    pub max_load_threads: Option<usize>,

    /// HTTP request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

/// Parses `WIDTHxHEIGHT`.
///
/// # Errors
/// Returns error if the value is not two positive integers separated by `x`.
pub fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|e| format!("invalid width '{width}': {e}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|e| format!("invalid height '{height}': {e}"))?;
    if width == 0 || height == 0 {
        return Err("dimensions must be positive".to_string());
    }
    Ok((width, height))
}
