use crate::errors::{CopyError, CopyResult};
use once_cell::sync::Lazy;

pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Files at or below this size are never mapped.
pub const SMALL_FILE_THRESHOLD: u64 = 32 * KB as u64;
/// Largest source window mapped at once.
pub const MAX_WINDOW: usize = 8 * MB;
/// Chunk size of the buffered read/write loop.
pub const BUFFER_SIZE: usize = 32 * KB;
/// Permission bits requested for a newly created destination.
pub const DEST_MODE: u32 = 0o644;

static PAGE_SIZE: Lazy<usize> = Lazy::new(query_page_size);

#[cfg(unix)]
fn query_page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4 * KB
    }
}

#[cfg(not(unix))]
fn query_page_size() -> usize {
    4 * KB
}

/// System page size, read once per process.
pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// Tuning knobs for a [`CopyEngine`](crate::copy::CopyEngine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyConfig {
    /// Sources larger than this use the mapped strategy.
    pub small_file_threshold: u64,
    /// Upper bound on a mapping window; must be a multiple of the page size.
    pub max_window: usize,
    /// Chunk size for the buffered strategy.
    pub buffer_size: usize,
    /// Mode bits for the created destination (unix only).
    pub dest_mode: u32,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            small_file_threshold: SMALL_FILE_THRESHOLD,
            max_window: MAX_WINDOW,
            buffer_size: BUFFER_SIZE,
            dest_mode: DEST_MODE,
        }
    }
}

impl CopyConfig {
    pub fn validate(&self) -> CopyResult<()> {
        if self.buffer_size == 0 {
            return Err(CopyError::config("buffer size must be non-zero"));
        }
        if self.max_window == 0 {
            return Err(CopyError::config("window size must be non-zero"));
        }
        // Every window after the first starts at a multiple of max_window,
        // and mmap offsets must be page aligned.
        let page = page_size();
        if self.max_window % page != 0 {
            return Err(CopyError::config(format!(
                "window size {} is not a multiple of the page size {}",
                self.max_window, page
            )));
        }
        if self.dest_mode & !0o7777 != 0 {
            return Err(CopyError::config(format!(
                "destination mode {:o} has bits outside 0o7777",
                self.dest_mode
            )));
        }
        Ok(())
    }
}
