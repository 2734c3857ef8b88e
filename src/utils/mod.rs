//! Small helpers for names and sizes.

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Name used when a requested output name is empty after cleaning.
pub const DEFAULT_OUTPUT_NAME: &str = "Merged_Document";

/// Greeting name used when the sender has no usable name.
pub const DEFAULT_USER_NAME: &str = "User";

/// Turn user input into a safe output file name ending in `.pdf`.
///
/// Path separators and the characters `* ? : " < > |` are removed and
/// surrounding whitespace is trimmed.
pub fn clean_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect();
    let cleaned = cleaned.trim();

    let mut name = if cleaned.is_empty() {
        DEFAULT_OUTPUT_NAME.to_string()
    } else {
        cleaned.to_string()
    };

    if !name.to_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

/// Strip markup characters from a sender's display name.
pub fn sanitize_display_name(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '*' | '_' | '`'))
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        DEFAULT_USER_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Format a file size in human-readable form.
pub fn format_file_size(size: u64) -> String {
    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}

/// Size in megabytes, rounded to two decimals.
pub fn megabytes(size: u64) -> f64 {
    (size as f64 / MB as f64 * 100.0).round() / 100.0
}

/// Whole megabytes, rounded down.
pub fn whole_megabytes(size: u64) -> u64 {
    size / MB
}
