use clap::Parser;
use mapcopy_core::config::{BUFFER_SIZE, MAX_WINDOW, SMALL_FILE_THRESHOLD};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mapcopy")]
#[command(about = "Copy one regular file to a new path, never leaving a partial copy behind")]
pub struct Cli {
    /// Regular file to copy
    pub source: PathBuf,
    /// Destination path; must not exist yet
    pub destination: PathBuf,
    /// Largest source window mapped at once (accepts K/M/G suffixes)
    #[arg(long, value_name = "BYTES", value_parser = parse_size, default_value_t = MAX_WINDOW)]
    pub window_size: usize,
    /// Files at or below this size are copied with plain reads and writes
    #[arg(long, value_name = "BYTES", value_parser = parse_size_u64, default_value_t = SMALL_FILE_THRESHOLD)]
    pub small_file_threshold: u64,
    /// Chunk size for the buffered copy loop
    #[arg(long, value_name = "BYTES", value_parser = parse_size, default_value_t = BUFFER_SIZE)]
    pub buffer_size: usize,
    /// Log engine decisions (strategy, fallbacks, short writes)
    #[arg(short, long)]
    pub verbose: bool,
    /// Print nothing on success
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Parse a byte count such as `4096`, `32K` or `8M`.
pub fn parse_size(raw: &str) -> Result<usize, String> {
    parse_size_u64(raw).and_then(|n| usize::try_from(n).map_err(|_| format!("{raw} is too large")))
}

pub fn parse_size_u64(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    let (digits, multiplier) = match trimmed.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => (&trimmed[..trimmed.len() - 1], 1u64 << 10),
        Some('M') => (&trimmed[..trimmed.len() - 1], 1u64 << 20),
        Some('G') => (&trimmed[..trimmed.len() - 1], 1u64 << 30),
        _ => (trimmed, 1),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid byte count '{raw}'"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("{raw} is too large"))
}
