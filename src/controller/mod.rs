pub mod job;
pub mod options;
pub mod scan_controller;

pub use job::{JobId, JobProgress, JobState, JobSummary, JobTarget, ScanJob};
pub use options::ScanOptions;
pub use scan_controller::{FindingSink, LogFindingSink, ScanController, ScanRequest};
