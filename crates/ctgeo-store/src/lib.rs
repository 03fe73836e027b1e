mod codes;
mod coords;
mod failed;
mod maintenance;
mod progress;
mod writer;

pub use codes::{dedup_codes, extract_codes, read_codes, write_codes, DEFAULT_CODE_COLUMN};
pub use coords::{ct_code_of, CoordRecord};
pub use failed::{failed_codes, load_failed, FailedRecord};
pub use maintenance::{
    backup_path, export_csv, merge_results, reset_files, CoordRow, ResetMode, ResetOutcome,
    TrackedFile,
};
pub use progress::{check_progress, load_processed, ProgressStats};
pub use writer::{timestamp_now, ResultStore};
