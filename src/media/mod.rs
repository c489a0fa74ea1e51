pub mod item;
pub mod scanner;
pub mod source;

pub use item::DiscoveredItem;
pub use scanner::{DiscoveryScanner, ScanProgress, ScanReport};
pub use source::{DirectoryListing, DirectorySource, LocalFilesystem};

use std::path::Path;

/// Container formats the host player is expected to open.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "3gp", "asf", "avi", "divx", "dvr-ms", "f4v", "fli", "flc", "flv", "m2ts", "m4v", "mkv",
    "mov", "mp4", "mpeg", "mpg", "nsv", "nut", "nuv", "ogg", "ogm", "qt", "ram", "rm", "rmvb",
    "rv", "trp", "ts", "vivo", "wmv", "wtv", "xvid",
];

/// Case-insensitive extension allow-list.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn is_playable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let normalized = ext.to_ascii_lowercase();
                self.extensions.iter().any(|allowed| *allowed == normalized)
            })
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_matching_ignores_case() {
        let filter = ExtensionFilter::default();

        assert!(filter.is_playable(Path::new("/media/Show/ep1.mkv")));
        assert!(filter.is_playable(Path::new("/media/Show/EP2.MKV")));
        assert!(filter.is_playable(Path::new("/media/rec/news.DVR-MS")));
        assert!(!filter.is_playable(Path::new("/media/Show/folder.jpg")));
        assert!(!filter.is_playable(Path::new("/media/Show/README")));
    }

    #[test]
    fn test_custom_extensions_are_normalized() {
        let filter = ExtensionFilter::new([".MP4", "webm", ""]);

        assert_eq!(filter.len(), 2);
        assert!(filter.is_playable(Path::new("clip.mp4")));
        assert!(filter.is_playable(Path::new("clip.WebM")));
        assert!(!filter.is_playable(Path::new("clip.mkv")));
    }
}
