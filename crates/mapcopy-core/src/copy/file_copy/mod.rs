mod chunked;
#[cfg(all(test, unix))]
pub(crate) mod faults;
mod mmap;

use crate::config::CopyConfig;
use crate::errors::{CopyError, CopyErrorKind, CopyResult};
use crate::logger::{Logger, NoopLogger};
use crate::transfer_plan::{TransferPlan, TransferStrategy};
use mmap::{MappedOutcome, WindowSource};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// What a successful copy did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyOutcome {
    pub bytes_copied: u64,
    /// Strategy that actually moved the bytes.
    pub strategy: TransferStrategy,
    /// The mapped plan could not map its first window and ran buffered instead.
    pub fell_back: bool,
}

/// Guard that removes the destination unless `commit()` is called.
/// Must be dropped after every handle to the destination is closed.
struct DestinationGuard {
    path: PathBuf,
    committed: bool,
}

impl DestinationGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(err) = fs::remove_file(&self.path) {
                log::warn!("failed to remove partial copy {}: {}", self.path.display(), err);
            }
        }
    }
}

/// Copies one regular file to a path that must not exist yet.
///
/// On failure the destination is gone and the source untouched. The engine
/// holds no per-copy state, so one engine can serve many threads as long as
/// they target different destinations.
pub struct CopyEngine {
    config: CopyConfig,
    logger: Box<dyn Logger>,
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new(CopyConfig::default())
    }
}

impl CopyEngine {
    pub fn new(config: CopyConfig) -> Self {
        Self {
            config,
            logger: Box::new(NoopLogger),
        }
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    pub fn copy_file(&self, src: &Path, dst: &Path) -> CopyResult<CopyOutcome> {
        self.copy_file_via(src, dst, |file| file, None)
    }

    /// Same as `copy_file`, with every destination write routed through the
    /// sink `wrap` builds around the created file, and mapped windows taken
    /// from `windows` instead of the opened source when one is given.
    pub(crate) fn copy_file_via<W, F>(
        &self,
        src: &Path,
        dst: &Path,
        wrap: F,
        windows: Option<&dyn WindowSource>,
    ) -> CopyResult<CopyOutcome>
    where
        W: Write,
        F: FnOnce(File) -> W,
    {
        self.logger.start(src, dst);
        let result = self.run(src, dst, wrap, windows);
        match &result {
            Ok(outcome) => self.logger.copy_done(src, dst, outcome.bytes_copied),
            Err(err) => self
                .logger
                .error("copy", src, &format!("{err}: {}", err.io_error())),
        }
        result
    }

    fn run<W, F>(
        &self,
        src: &Path,
        dst: &Path,
        wrap: F,
        windows: Option<&dyn WindowSource>,
    ) -> CopyResult<CopyOutcome>
    where
        W: Write,
        F: FnOnce(File) -> W,
    {
        self.config.validate()?;

        let mut src_file = File::open(src).map_err(|err| CopyError::open(src, err))?;
        let dst_file =
            open_destination(dst, self.config.dest_mode).map_err(|err| CopyError::open(dst, err))?;
        // Declared before the sink so the file is closed before removal.
        let guard = DestinationGuard::new(dst);
        let mut sink = wrap(dst_file);

        let metadata = src_file.metadata().map_err(|err| CopyError::open(src, err))?;
        if !metadata.is_file() {
            return Err(CopyError::not_regular(src));
        }

        let plan = TransferPlan::for_regular_file(metadata.len(), &self.config);
        log::debug!(
            "{} copy of {} ({} bytes, {} byte window)",
            plan.strategy,
            src.display(),
            plan.total_size,
            plan.window_size
        );

        let outcome = match plan.strategy {
            TransferStrategy::Mapped => {
                let windows = windows.unwrap_or(&src_file as &dyn WindowSource);
                let mapped = mmap::mapped_transfer(windows, &mut sink, &plan)
                    .map_err(|err| attach_path(err, src, dst))?;
                match mapped {
                    MappedOutcome::Copied(bytes_copied) => CopyOutcome {
                        bytes_copied,
                        strategy: TransferStrategy::Mapped,
                        fell_back: false,
                    },
                    MappedOutcome::Unmappable(err) => {
                        log::warn!("cannot map {} ({}); falling back to buffered copy", src.display(), err);
                        let fallback = TransferPlan::buffered(plan.total_size, &self.config);
                        let bytes_copied =
                            chunked::buffered_transfer(&mut src_file, &mut sink, fallback.window_size)
                                .map_err(|err| attach_path(err, src, dst))?;
                        CopyOutcome {
                            bytes_copied,
                            strategy: TransferStrategy::Buffered,
                            fell_back: true,
                        }
                    }
                }
            }
            TransferStrategy::Buffered => {
                let bytes_copied = chunked::buffered_transfer(&mut src_file, &mut sink, plan.window_size)
                    .map_err(|err| attach_path(err, src, dst))?;
                CopyOutcome {
                    bytes_copied,
                    strategy: TransferStrategy::Buffered,
                    fell_back: false,
                }
            }
        };

        drop(sink);
        drop(src_file);
        guard.commit();
        Ok(outcome)
    }
}

/// Copy `src` to `dst` with the default engine.
pub fn copy_file(src: &Path, dst: &Path) -> CopyResult<()> {
    CopyEngine::default().copy_file(src, dst).map(|_| ())
}

fn open_destination(path: &Path, mode: u32) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

fn attach_path(err: CopyError, src: &Path, dst: &Path) -> CopyError {
    match err.kind() {
        CopyErrorKind::Write => err.with_path(dst),
        _ => err.with_path(src),
    }
}
