#[cfg(unix)]
use crate::errors::CopyError;
use crate::errors::CopyResult;
use crate::transfer_plan::TransferPlan;
use std::fs::File;
use std::io::{self, Write};

/// Result of running a Mapped plan.
#[derive(Debug)]
pub(crate) enum MappedOutcome {
    /// Every byte of the source was written.
    Copied(u64),
    /// The first window could not be mapped; nothing was written.
    Unmappable(io::Error),
}

/// Where mapped windows come from. `File` maps itself; tests substitute
/// sources that fail on demand.
#[cfg(unix)]
pub(crate) trait WindowSource {
    fn map_window(&self, len: usize) -> io::Result<MappedWindow>;
    fn remap_window(&self, window: &mut MappedWindow, offset: u64, len: usize) -> io::Result<()>;
}

#[cfg(not(unix))]
pub(crate) trait WindowSource {}

#[cfg(unix)]
pub(crate) use window::MappedWindow;

#[cfg(unix)]
impl WindowSource for File {
    fn map_window(&self, len: usize) -> io::Result<MappedWindow> {
        MappedWindow::map(self, len)
    }

    fn remap_window(&self, window: &mut MappedWindow, offset: u64, len: usize) -> io::Result<()> {
        window.remap(self, offset, len)
    }
}

#[cfg(not(unix))]
impl WindowSource for File {}

/// Copy `src` to `dst` by writing straight out of a sliding read-only mapping.
///
/// The first window is `plan.window_size` bytes. After a window is fully
/// written the same address range is re-mapped over the next
/// `min(remaining, window_size)` bytes of the source.
#[cfg(unix)]
pub(crate) fn mapped_transfer<S, W>(src: &S, dst: &mut W, plan: &TransferPlan) -> CopyResult<MappedOutcome>
where
    S: WindowSource + ?Sized,
    W: Write + ?Sized,
{
    let window = match src.map_window(plan.window_size) {
        Ok(window) => window,
        Err(err) => return Ok(MappedOutcome::Unmappable(err)),
    };
    let mut state = TransferState {
        offset: 0,
        remaining: plan.total_size,
        window,
    };

    loop {
        write_window(dst, state.window.as_slice())?;
        if !state.advance(src, plan.window_size).map_err(CopyError::map)? {
            break;
        }
    }
    Ok(MappedOutcome::Copied(state.offset))
}

#[cfg(not(unix))]
pub(crate) fn mapped_transfer<S, W>(_src: &S, _dst: &mut W, _plan: &TransferPlan) -> CopyResult<MappedOutcome>
where
    S: WindowSource + ?Sized,
    W: Write + ?Sized,
{
    Ok(MappedOutcome::Unmappable(io::Error::new(
        io::ErrorKind::Unsupported,
        "memory-mapped copy is only available on unix",
    )))
}

#[cfg(unix)]
struct TransferState {
    offset: u64,
    remaining: u64,
    window: MappedWindow,
}

#[cfg(unix)]
impl TransferState {
    /// Consume the window that was just written and map the next one.
    /// Returns `false` once the whole source has been consumed.
    fn advance<S>(&mut self, src: &S, window_size: usize) -> io::Result<bool>
    where
        S: WindowSource + ?Sized,
    {
        let consumed = self.window.len() as u64;
        self.remaining -= consumed;
        self.offset += consumed;
        if self.remaining == 0 {
            return Ok(false);
        }
        let next = self.remaining.min(window_size as u64) as usize;
        log::trace!("remapping source window at offset {} ({} bytes)", self.offset, next);
        src.remap_window(&mut self.window, self.offset, next)?;
        Ok(true)
    }
}

/// Write a whole window, re-issuing the unwritten tail after short writes.
#[cfg(unix)]
fn write_window<W>(dst: &mut W, window: &[u8]) -> CopyResult<()>
where
    W: Write + ?Sized,
{
    let mut written = dst.write(window).map_err(CopyError::write)?;
    if written < window.len() {
        log::debug!(
            "short write ({} of {} bytes); retrying remaining {}",
            written,
            window.len(),
            window.len() - written
        );
    }
    while written < window.len() {
        let n = dst.write(&window[written..]).map_err(CopyError::write)?;
        if n == 0 {
            return Err(CopyError::write(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("destination accepted no bytes with {} left in window", window.len() - written),
            )));
        }
        written += n;
    }
    Ok(())
}

#[cfg(unix)]
mod window {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;
    use std::ptr::{self, NonNull};

    /// A read-only shared mapping of part of a file.
    ///
    /// The address range reserved by the first `map` is reused by every
    /// `remap` and released in full on drop.
    pub(crate) struct MappedWindow {
        addr: NonNull<libc::c_void>,
        reserved: usize,
        len: usize,
    }

    impl MappedWindow {
        pub(super) fn map(file: &File, len: usize) -> io::Result<Self> {
            if len == 0 {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "cannot map an empty window"));
            }
            let addr = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    len,
                    libc::PROT_READ,
                    libc::MAP_SHARED,
                    file.as_raw_fd(),
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }
            let addr = NonNull::new(addr)
                .ok_or_else(|| io::Error::other("mmap returned a null address"))?;
            Ok(Self {
                addr,
                reserved: len,
                len,
            })
        }

        /// Replace the mapping with `len` bytes of `file` starting at `offset`,
        /// at the same address. `offset` must be page aligned.
        pub(super) fn remap(&mut self, file: &File, offset: u64, len: usize) -> io::Result<()> {
            if len == 0 || len > self.reserved {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("window of {len} bytes does not fit the {} byte mapping", self.reserved),
                ));
            }
            let offset = libc::off_t::try_from(offset)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file offset out of range"))?;
            let addr = unsafe {
                libc::mmap(
                    self.addr.as_ptr(),
                    len,
                    libc::PROT_READ,
                    libc::MAP_SHARED | libc::MAP_FIXED,
                    file.as_raw_fd(),
                    offset,
                )
            };
            if addr == libc::MAP_FAILED {
                // The old contents may already be gone.
                self.len = 0;
                return Err(io::Error::last_os_error());
            }
            self.len = len;
            Ok(())
        }

        pub(super) fn len(&self) -> usize {
            self.len
        }

        pub(super) fn as_slice(&self) -> &[u8] {
            // SAFETY: the first `len` bytes are a live PROT_READ mapping owned by
            // self, and `remap` needs `&mut self` so no slice outlives it. A
            // source truncated by another process underneath us raises SIGBUS,
            // the same as any other mmap reader.
            unsafe { std::slice::from_raw_parts(self.addr.as_ptr() as *const u8, self.len) }
        }
    }

    impl Drop for MappedWindow {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.addr.as_ptr(), self.reserved);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{page_size, CopyConfig, MB};
    use crate::copy::file_copy::faults::{FailingWriter, ShortWriter};
    use crate::errors::CopyError;
    use crate::errors::CopyErrorKind;
    use crate::transfer_plan::TransferStrategy;
    use std::fs;
    use tempfile::tempdir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 241) as u8 ^ (i >> 12) as u8).collect()
    }

    fn mapped_plan(total_size: u64, max_window: usize) -> TransferPlan {
        let config = CopyConfig {
            small_file_threshold: 0,
            max_window,
            ..CopyConfig::default()
        };
        let plan = TransferPlan::for_regular_file(total_size, &config);
        assert_eq!(plan.strategy, TransferStrategy::Mapped);
        plan
    }

    fn copied(outcome: MappedOutcome) -> u64 {
        match outcome {
            MappedOutcome::Copied(n) => n,
            MappedOutcome::Unmappable(err) => panic!("unexpected fallback: {err}"),
        }
    }

    #[test]
    fn test_mapped_walks_several_windows() -> eyre::Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("src.bin");
        let window = page_size() * 2;
        let data = pattern(window * 5 + 100);
        fs::write(&path, &data)?;

        let src = File::open(&path)?;
        let mut out = Vec::new();
        let plan = mapped_plan(data.len() as u64, window);
        assert_eq!(plan.window_count(), 6);

        let n = copied(mapped_transfer(&src, &mut out, &plan)?);
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
        Ok(())
    }

    #[test]
    fn test_short_writes_reassemble_window() -> eyre::Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("src.bin");
        let data = pattern(8 * MB + 100);
        fs::write(&path, &data)?;

        let src = File::open(&path)?;
        let mut sink = ShortWriter::new(Vec::new(), MB + 7);
        let plan = mapped_plan(data.len() as u64, 8 * MB);

        let n = copied(mapped_transfer(&src, &mut sink, &plan)?);
        assert_eq!(n, data.len() as u64);
        // 8 MiB window needs 8 calls at MB + 7 per call; the 100 byte tail one more.
        assert_eq!(sink.calls, 9);
        assert!(sink.get_ref() == &data, "reassembled output differs from source");
        Ok(())
    }

    #[test]
    fn test_error_during_recovery_is_write_error() -> eyre::Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("src.bin");
        let window = page_size() * 4;
        let data = pattern(window * 3);
        fs::write(&path, &data)?;

        let src = File::open(&path)?;
        let budget = (window + window / 2) as u64;
        let mut sink = FailingWriter::new(Vec::new(), budget);
        let plan = mapped_plan(data.len() as u64, window);

        let err = mapped_transfer(&src, &mut sink, &plan).unwrap_err();
        assert_eq!(err.kind(), CopyErrorKind::Write);
        assert_eq!(err.raw_os_error(), Some(libc::ENOSPC));
        Ok(())
    }

    #[test]
    fn test_zero_length_write_does_not_spin() {
        struct Stuck;
        impl Write for Stuck {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let err = write_window(&mut Stuck, b"payload").unwrap_err();
        assert_eq!(err.kind(), CopyErrorKind::Write);
        assert_eq!(err.io_error().kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_unmappable_source_reports_fallback() -> eyre::Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("src.bin");
        fs::write(&path, pattern(64 * 1024))?;

        // A write-only handle cannot back a PROT_READ mapping.
        let src = fs::OpenOptions::new().write(true).open(&path)?;
        let mut out = Vec::new();
        let plan = mapped_plan(64 * 1024, 8 * MB);

        match mapped_transfer(&src, &mut out, &plan)? {
            MappedOutcome::Unmappable(err) => assert_eq!(err.raw_os_error(), Some(libc::EACCES)),
            MappedOutcome::Copied(_) => panic!("write-only handle should not map"),
        }
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_advance_is_map_error() -> eyre::Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("src.bin");
        let window = page_size() * 2;
        fs::write(&path, pattern(window * 3))?;

        let readable = File::open(&path)?;
        let write_only = fs::OpenOptions::new().write(true).open(&path)?;
        let mut state = TransferState {
            offset: 0,
            remaining: (window * 3) as u64,
            window: readable.map_window(window)?,
        };

        let err = state
            .advance(&write_only, window)
            .map_err(CopyError::map)
            .unwrap_err();
        assert_eq!(err.kind(), CopyErrorKind::Map);
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));
        // The first window counts as consumed; nothing stays mapped.
        assert_eq!(state.offset, window as u64);
        assert_eq!(state.window.len(), 0);
        Ok(())
    }

    #[test]
    fn test_remap_failure_mid_transfer_stops_copy() -> eyre::Result<()> {
        use crate::copy::file_copy::faults::RemapFailsAfter;

        let tmp = tempdir()?;
        let path = tmp.path().join("src.bin");
        let window = page_size() * 2;
        let data = pattern(window * 4);
        fs::write(&path, &data)?;

        let src = RemapFailsAfter::open(&path, 1)?;
        let mut out = Vec::new();
        let plan = mapped_plan(data.len() as u64, window);

        let err = mapped_transfer(&src, &mut out, &plan).unwrap_err();
        assert_eq!(err.kind(), CopyErrorKind::Map);
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));
        // Two windows made it out before the second remap failed.
        assert_eq!(out, data[..window * 2]);
        Ok(())
    }
}
