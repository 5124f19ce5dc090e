mod file_copy;

pub use file_copy::{copy_file, CopyEngine, CopyOutcome};
