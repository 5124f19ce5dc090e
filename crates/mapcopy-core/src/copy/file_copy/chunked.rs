use crate::errors::{CopyError, CopyResult};
use std::io::{self, Read, Write};

/// Copy `src` to `dst` through a fixed-size buffer until EOF.
///
/// Each chunk gets exactly one write call. A short write is fatal here, unlike
/// the mapped strategy which keeps writing the tail of its window.
pub(crate) fn buffered_transfer<R, W>(src: &mut R, dst: &mut W, buffer_size: usize) -> CopyResult<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; buffer_size];
    let mut total: u64 = 0;
    loop {
        let n = src.read(&mut buf).map_err(CopyError::read)?;
        if n == 0 {
            return Ok(total);
        }
        let written = dst.write(&buf[..n]).map_err(CopyError::write)?;
        if written != n {
            return Err(CopyError::write(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {written} of {n} bytes"),
            )));
        }
        total += n as u64;
    }
}
