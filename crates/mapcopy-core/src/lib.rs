//! Single-file copy engine: memory-mapped window transfer for large files,
//! buffered read/write for small ones, and no partial destination left
//! behind on failure.

pub mod config;
pub mod copy;
pub mod errors;
pub mod logger;
pub mod transfer_plan;

pub use config::CopyConfig;
pub use copy::{copy_file, CopyEngine, CopyOutcome};
pub use errors::{CopyError, CopyErrorKind, CopyResult, ErrorCategory};
pub use transfer_plan::{TransferPlan, TransferStrategy};
