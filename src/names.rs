//! Name normalization for file paths, container names and image tags

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// The result is usable both as a file name component and as a container
/// name. Dots are kept because tool image versions carry them.
pub fn container_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Like [`container_safe`] but also replaces dots.
///
/// Ledger file names use `.` as the field separator, so fields must not
/// contain one.
pub fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Project name as used in image repositories and build directories.
/// Image repositories must be lowercase.
pub fn project_slug(name: &str) -> String {
    file_safe(name).to_lowercase()
}

/// Whether a user supplied name survives [`file_safe`] unchanged
pub fn is_file_safe(name: &str) -> bool {
    !name.is_empty() && file_safe(name) == name
}
