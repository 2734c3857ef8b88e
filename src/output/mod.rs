//! Presentation layer: message text and progress reporting.

pub mod formatter;
pub mod progress;

pub use formatter::MessageFormatter;
pub use progress::{ProgressHook, ProgressNotifier, ProgressUpdate, TransferLabel};
