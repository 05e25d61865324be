pub mod formatting;
pub mod sync;

pub use formatting::{category_line, format_duration, format_enabled, scanner_line};
pub use sync::lock;
