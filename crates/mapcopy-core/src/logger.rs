//! Per-copy lifecycle hooks.

use std::path::Path;

/// Receives one `start` per copy followed by either `copy_done` or `error`.
pub trait Logger: Send + Sync {
    fn start(&self, src: &Path, dst: &Path);
    fn copy_done(&self, src: &Path, dst: &Path, bytes: u64);
    fn error(&self, context: &str, path: &Path, msg: &str);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn start(&self, _src: &Path, _dst: &Path) {}
    fn copy_done(&self, _src: &Path, _dst: &Path, _bytes: u64) {}
    fn error(&self, _context: &str, _path: &Path, _msg: &str) {}
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn start(&self, src: &Path, dst: &Path) {
        log::debug!("copy {} -> {}", src.display(), dst.display());
    }

    fn copy_done(&self, src: &Path, dst: &Path, bytes: u64) {
        log::info!("copied {} -> {} ({} bytes)", src.display(), dst.display(), bytes);
    }

    fn error(&self, context: &str, path: &Path, msg: &str) {
        log::error!("{context} {}: {msg}", path.display());
    }
}
