pub mod dry_run;
pub mod finding;
pub mod listener;
pub mod scan_engine;

pub use dry_run::{DryRunEngine, DryRunEngineFactory};
pub use finding::{Finding, Risk};
pub use listener::{FindingObserver, ListenerSet, ScanListener};
pub use scan_engine::{EngineSettings, ScanEngine, ScanEngineFactory};
