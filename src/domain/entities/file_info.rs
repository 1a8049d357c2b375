use serde::Serialize;

/// A single entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
    /// Seconds since the Unix epoch.
    pub modified: i64,
    pub mime_type: String,
}

/// Sorts directories first, then by name case-insensitively, matching
/// spec.md §3's FileInfo listing order.
pub fn sort_listing(entries: &mut [FileInfo]) {
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

pub fn guess_mime(name: &str, is_dir: bool) -> String {
    if is_dir {
        return "application/directory".to_string();
    }
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
