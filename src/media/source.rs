use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Children of one directory, split by kind. Paths are joined onto the listed directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub subdirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Host enumeration API used by the scanner.
pub trait DirectorySource: Send + Sync {
    fn list_directory(&self, path: &Path) -> io::Result<DirectoryListing>;

    /// Symlink-resolved absolute form of `path`.
    fn resolve_canonical_path(&self, path: &Path) -> io::Result<PathBuf>;

    fn path_exists(&self, path: &Path) -> bool;
}

/// Local disk through `std::fs`, following symbolic links.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl DirectorySource for LocalFilesystem {
    fn list_directory(&self, path: &Path) -> io::Result<DirectoryListing> {
        let mut listing = DirectoryListing::default();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();

            let file_type = entry.file_type()?;
            let is_dir = if file_type.is_symlink() {
                // Follow the link; dangling links are dropped
                match fs::metadata(&entry_path) {
                    Ok(target) => target.is_dir(),
                    Err(e) => {
                        debug!("Skipping dangling link {}: {}", entry_path.display(), e);
                        continue;
                    }
                }
            } else {
                file_type.is_dir()
            };

            if is_dir {
                listing.subdirs.push(entry_path);
            } else {
                listing.files.push(entry_path);
            }
        }

        Ok(listing)
    }

    fn resolve_canonical_path(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_listing_splits_dirs_and_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Show")).unwrap();
        fs::write(dir.path().join("movie.mkv"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let mut listing = LocalFilesystem.list_directory(dir.path()).unwrap();
        listing.files.sort();

        assert_eq!(listing.subdirs, vec![dir.path().join("Show")]);
        assert_eq!(
            listing.files,
            vec![dir.path().join("movie.mkv"), dir.path().join("notes.txt")]
        );
    }

    #[test]
    fn test_listing_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        assert!(LocalFilesystem.list_directory(&dir.path().join("gone")).is_err());
        assert!(!LocalFilesystem.path_exists(&dir.path().join("gone")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_is_listed_as_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("dangling"))
            .unwrap();

        let mut listing = LocalFilesystem.list_directory(dir.path()).unwrap();
        listing.subdirs.sort();

        assert_eq!(
            listing.subdirs,
            vec![dir.path().join("link"), dir.path().join("real")]
        );
        assert!(listing.files.is_empty());
    }
}
