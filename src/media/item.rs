use std::path::{Component, Path, PathBuf};

/// Artwork file the host shows for every item in a folder.
pub const FOLDER_ART_NAME: &str = "folder.jpg";

/// One playable file found by the scanner. Never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredItem {
    path: PathBuf,
    label: String,
    artwork: Option<PathBuf>,
}

impl DiscoveredItem {
    pub fn new(path: PathBuf) -> Self {
        let label = display_label(&path);
        Self {
            path,
            label,
            artwork: None,
        }
    }

    pub fn with_artwork(mut self, artwork: PathBuf) -> Self {
        self.artwork = Some(artwork);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn artwork(&self) -> Option<&Path> {
        self.artwork.as_deref()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// File name first, then each parent folder, e.g. `ep1.mkv / Season 1 / Show`.
fn display_label(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        return path.display().to_string();
    }

    parts.into_iter().rev().collect::<Vec<_>>().join(" / ")
}
