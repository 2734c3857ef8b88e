//! Message formatting.
//!
//! Every piece of user-facing text is produced here, from the structured
//! [`Reply`] and [`ProgressUpdate`] values emitted by the core.
//!
//! # Examples
//!
//! ```
//! use pdfmerge::output::MessageFormatter;
//! use pdfmerge::session::Reply;
//!
//! let formatter = MessageFormatter::new();
//! let text = formatter.render(&Reply::NeedMoreDocuments { required: 2 });
//! assert!(text.contains("2 PDF files"));
//! ```

use crate::output::progress::ProgressUpdate;
use crate::session::Reply;
use crate::utils::{megabytes, whole_megabytes};

/// Number of segments in the progress bar.
pub const BAR_SEGMENTS: usize = 10;

const FILLED: char = '▰';
const EMPTY: char = '▱';
const RULE: &str = "━━━━━━━━━━━━━━━━━━";

/// Renders replies and progress updates to message text.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    /// Product name shown in the greeting and caption.
    brand: String,
}

impl MessageFormatter {
    /// Create a formatter with the default brand.
    pub fn new() -> Self {
        Self::with_brand("PDFMERGE PRO")
    }

    pub fn with_brand(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
        }
    }

    /// Render a reply to message text.
    pub fn render(&self, reply: &Reply) -> String {
        match reply {
            Reply::Welcome { name } => format!(
                "⚡ **{brand}**\n{RULE}\n\n\
                 👋 **Hello, {name}!**\n\n\
                 I merge PDF files for you.\n\n\
                 🛠 **HOW TO USE:**\n\
                 1️⃣ Send PDF files one by one.\n\
                 2️⃣ Type /merge when done.\n\
                 3️⃣ Reply with a filename.\n\n\
                 🚀 *Send a file to start!*",
                brand = self.brand,
            ),
            Reply::DownloadStarting => "📥 **Initializing Download...**".to_string(),
            Reply::DocumentQueued {
                name,
                size_bytes,
                queue_len,
            } => format!(
                "📂 **FILE ADDED TO QUEUE**\n{RULE}\n\
                 📄 **Name:** `{name}`\n\
                 💾 **Size:** `{size} MB`\n\
                 📚 **Total Files:** `{queue_len}`\n\n\
                 🔵 *Send more files or type* /merge",
                size = megabytes(*size_bytes),
            ),
            Reply::DownloadFailed => "❌ **Download Failed!** File appears to be empty or \
                                      corrupted. Please try again."
                .to_string(),
            Reply::DownloadError { reason } => format!("❌ **Error:** {reason}"),
            Reply::InvalidDocument => "❌ **Invalid File!** Please send only PDF files.".to_string(),
            Reply::Busy => {
                "⚠️ **Process Busy!** Please finish current task first or /cancel.".to_string()
            }
            Reply::NeedMoreDocuments { required } => {
                format!("⚠️ **Oops!** You need at least **{required} PDF files** to merge.")
            }
            Reply::AskForName => "📝 **NAME YOUR FILE**\n\n\
                                  Please reply with the name you want for your merged PDF.\n\
                                  *(Example: Physics Notes)* 👇"
                .to_string(),
            Reply::MergeLocked => {
                "⚠️ **Locked!** Cannot cancel during merging process.".to_string()
            }
            Reply::QueueCleared => "🗑 **Queue Cleared!** You can start fresh.".to_string(),
            Reply::NothingToCancel => {
                "🤷 **Nothing to cancel!** Your queue is empty.".to_string()
            }
            Reply::Processing { output_name } => {
                format!("⚙️ **Processing: {output_name}**\n`Please wait...`")
            }
            Reply::Uploading => "🚀 **Finalizing & Uploading...**".to_string(),
            Reply::Caption {
                output_name,
                files,
                requester,
            } => format!(
                "🔥 **MERGE COMPLETED** 🔥\n{RULE}\n\n\
                 📂 **File** : `{output_name}`\n\
                 📚 **Qty** : `{files} Files`\n\
                 👤 **By** : {requester}\n\n\
                 {RULE}\n\
                 ⚡ {brand}",
                brand = self.brand,
            ),
            Reply::MergeFailed { reason } => format!("❌ **Failed:** {reason}"),
        }
    }

    /// Render a transfer progress update.
    pub fn progress(&self, update: &ProgressUpdate) -> String {
        format!(
            "⚡ **{label}...**\n━━━━━━━━━━━━━━\n📊 `{bar}` **{percent:.1}%**\n\
             💾 **Size:** `{current}MB / {total}MB`",
            label = update.label,
            bar = progress_bar(update.filled),
            percent = update.percent,
            current = whole_megabytes(update.current),
            total = whole_megabytes(update.total),
        )
    }
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// A bar of [`BAR_SEGMENTS`] segments with `filled` of them filled.
pub fn progress_bar(filled: usize) -> String {
    let filled = filled.min(BAR_SEGMENTS);
    std::iter::repeat_n(FILLED, filled)
        .chain(std::iter::repeat_n(EMPTY, BAR_SEGMENTS - filled))
        .collect()
}
