//! Readers, writers and window sources that misbehave on purpose.

use super::mmap::{MappedWindow, WindowSource};
use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

/// Accepts at most `max_per_call` bytes per `write` call.
pub(crate) struct ShortWriter<W> {
    inner: W,
    max_per_call: usize,
    pub(crate) calls: usize,
}

impl<W: Write> ShortWriter<W> {
    pub(crate) fn new(inner: W, max_per_call: usize) -> Self {
        Self {
            inner,
            max_per_call,
            calls: 0,
        }
    }

    pub(crate) fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for ShortWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.calls += 1;
        let n = buf.len().min(self.max_per_call);
        self.inner.write_all(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Behaves like a device that runs out of space after `budget` bytes: the
/// write that crosses the limit is short, the next one fails with ENOSPC.
pub(crate) struct FailingWriter<W> {
    inner: W,
    budget: u64,
}

impl<W: Write> FailingWriter<W> {
    pub(crate) fn new(inner: W, budget: u64) -> Self {
        Self { inner, budget }
    }
}

impl<W: Write> Write for FailingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(no_space());
        }
        let n = (buf.len() as u64).min(self.budget) as usize;
        self.inner.write_all(&buf[..n])?;
        self.budget -= n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Fails every read after `budget` bytes.
pub(crate) struct FailingReader<R> {
    inner: R,
    budget: usize,
}

impl<R: Read> FailingReader<R> {
    pub(crate) fn new(inner: R, budget: usize) -> Self {
        Self { inner, budget }
    }
}

impl<R: Read> Read for FailingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        let want = buf.len().min(self.budget);
        let n = self.inner.read(&mut buf[..want])?;
        self.budget -= n;
        Ok(n)
    }
}

/// A source whose very first mapping fails, as under address-space exhaustion.
pub(crate) struct UnmappableSource;

impl WindowSource for UnmappableSource {
    fn map_window(&self, _len: usize) -> io::Result<MappedWindow> {
        Err(io::Error::from_raw_os_error(libc::ENOMEM))
    }

    fn remap_window(&self, _window: &mut MappedWindow, _offset: u64, _len: usize) -> io::Result<()> {
        Err(io::Error::from_raw_os_error(libc::ENOMEM))
    }
}

/// Maps the first window normally and allows `remaps` successful advances;
/// every later advance goes through a write-only handle and fails with EACCES.
pub(crate) struct RemapFailsAfter {
    readable: File,
    write_only: File,
    remaps: Cell<usize>,
}

impl RemapFailsAfter {
    pub(crate) fn open(path: &Path, remaps: usize) -> io::Result<Self> {
        Ok(Self {
            readable: File::open(path)?,
            write_only: OpenOptions::new().write(true).open(path)?,
            remaps: Cell::new(remaps),
        })
    }
}

impl WindowSource for RemapFailsAfter {
    fn map_window(&self, len: usize) -> io::Result<MappedWindow> {
        self.readable.map_window(len)
    }

    fn remap_window(&self, window: &mut MappedWindow, offset: u64, len: usize) -> io::Result<()> {
        match self.remaps.get() {
            0 => self.write_only.remap_window(window, offset, len),
            left => {
                self.remaps.set(left - 1);
                self.readable.remap_window(window, offset, len)
            }
        }
    }
}

/// ENOSPC
pub(crate) fn no_space() -> io::Error {
    io::Error::from_raw_os_error(libc::ENOSPC)
}
