use crate::config::CopyConfig;
use std::fmt;

/// How the bytes of one file are moved to the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferStrategy {
    /// Write straight out of a sliding read-only mapping of the source.
    Mapped,
    /// Read into a fixed buffer and write it back out.
    Buffered,
}

impl fmt::Display for TransferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStrategy::Mapped => f.write_str("mapped"),
            TransferStrategy::Buffered => f.write_str("buffered"),
        }
    }
}

/// Strategy chosen once at the start of a copy. Never changes mid-copy,
/// except that a Mapped plan degrades to Buffered when the first window
/// cannot be mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferPlan {
    pub strategy: TransferStrategy,
    /// Mapping window length for Mapped, buffer length for Buffered.
    pub window_size: usize,
    pub total_size: u64,
}

impl TransferPlan {
    /// Pick a strategy for a regular file of `total_size` bytes.
    pub fn for_regular_file(total_size: u64, config: &CopyConfig) -> Self {
        if total_size > config.small_file_threshold {
            let window_size = total_size.min(config.max_window as u64) as usize;
            Self {
                strategy: TransferStrategy::Mapped,
                window_size,
                total_size,
            }
        } else {
            Self::buffered(total_size, config)
        }
    }

    pub fn buffered(total_size: u64, config: &CopyConfig) -> Self {
        Self {
            strategy: TransferStrategy::Buffered,
            window_size: config.buffer_size,
            total_size,
        }
    }

    /// Number of windows a Mapped plan walks through.
    #[cfg(test)]
    pub(crate) fn window_count(&self) -> u64 {
        if self.window_size == 0 {
            return 0;
        }
        self.total_size.div_ceil(self.window_size as u64)
    }
}
