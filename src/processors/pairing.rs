//! Discovery of input/capacitor capture pairs within an experiment folder.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ChannelConfig;

/// Errors that can occur while scanning a folder.
#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for pairing operations.
pub type Result<T> = std::result::Result<T, PairingError>;

/// An input-channel file and the capacitor-channel file sharing its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    /// Filename with the channel suffix removed
    pub prefix: String,
    pub input: PathBuf,
    pub cap: PathBuf,
}

impl FilePair {
    pub fn input_name(&self) -> String {
        file_name(&self.input)
    }

    pub fn cap_name(&self) -> String {
        file_name(&self.cap)
    }

    /// Human-readable job label, `"<input file> & <cap file>"`.
    pub fn label(&self) -> String {
        format!("{} & {}", self.input_name(), self.cap_name())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Result of scanning one folder.
#[derive(Debug, Clone, Default)]
pub struct PairListing {
    /// Matched pairs, ordered by input filename
    pub pairs: Vec<FilePair>,
    /// Files carrying one channel suffix whose partner is missing
    pub unmatched: Vec<PathBuf>,
}

/// List regular files in `folder`, sorted by name.
fn sorted_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder).map_err(|source| PairingError::ReadDir {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    files.sort();
    Ok(files)
}

/// Pair input and capacitor captures in `folder` by shared filename prefix.
///
/// A file named `<prefix><input_suffix>` pairs with `<prefix><cap_suffix>`.
/// Files that end in neither suffix are ignored; files with a suffix but no
/// partner are reported in [`PairListing::unmatched`].
pub fn discover_pairs(folder: &Path, channels: &ChannelConfig) -> Result<PairListing> {
    if !folder.is_dir() {
        return Err(PairingError::DirectoryNotFound(folder.to_path_buf()));
    }

    let mut inputs: Vec<(String, PathBuf)> = Vec::new();
    let mut caps: HashMap<String, PathBuf> = HashMap::new();

    for path in sorted_files(folder)? {
        let name = file_name(&path);
        if let Some(prefix) = name.strip_suffix(channels.input_suffix.as_str()) {
            inputs.push((prefix.to_string(), path));
        } else if let Some(prefix) = name.strip_suffix(channels.cap_suffix.as_str()) {
            caps.insert(prefix.to_string(), path);
        }
    }

    let mut listing = PairListing::default();

    for (prefix, input) in inputs {
        match caps.remove(&prefix) {
            Some(cap) => listing.pairs.push(FilePair { prefix, input, cap }),
            None => {
                log::debug!("No capacitor capture for {}", input.display());
                listing.unmatched.push(input);
            }
        }
    }

    let mut orphan_caps: Vec<PathBuf> = caps.into_values().collect();
    orphan_caps.sort();
    for cap in &orphan_caps {
        log::debug!("No input capture for {}", cap.display());
    }
    listing.unmatched.extend(orphan_caps);

    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn test_single_pair() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "X_Ana7_input.csv");
        touch(temp_dir.path(), "X_Ana8_cap.csv");

        let listing = discover_pairs(temp_dir.path(), &ChannelConfig::default()).unwrap();
        assert_eq!(listing.pairs.len(), 1);
        assert!(listing.unmatched.is_empty());

        let pair = &listing.pairs[0];
        assert_eq!(pair.prefix, "X_");
        assert_eq!(pair.label(), "X_Ana7_input.csv & X_Ana8_cap.csv");
    }

    #[test]
    fn test_missing_partner() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "X_Ana7_input.csv");

        let listing = discover_pairs(temp_dir.path(), &ChannelConfig::default()).unwrap();
        assert!(listing.pairs.is_empty());
        assert_eq!(listing.unmatched, vec![temp_dir.path().join("X_Ana7_input.csv")]);
    }

    #[test]
    fn test_orphan_cap_and_unrelated_files() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "A, Ana7_input.csv");
        touch(temp_dir.path(), "A, Ana8_cap.csv");
        touch(temp_dir.path(), "B, Ana8_cap.csv");
        touch(temp_dir.path(), "notes.txt");
        touch(temp_dir.path(), "C, Ana9_other.csv");

        let listing = discover_pairs(temp_dir.path(), &ChannelConfig::default()).unwrap();
        assert_eq!(listing.pairs.len(), 1);
        assert_eq!(listing.pairs[0].prefix, "A, ");
        assert_eq!(listing.unmatched, vec![temp_dir.path().join("B, Ana8_cap.csv")]);
    }

    #[test]
    fn test_pairs_sorted_by_filename() {
        let temp_dir = TempDir::new().unwrap();
        for prefix in ["run3 ", "run1 ", "run2 "] {
            touch(temp_dir.path(), &format!("{}Ana7_input.csv", prefix));
            touch(temp_dir.path(), &format!("{}Ana8_cap.csv", prefix));
        }

        let listing = discover_pairs(temp_dir.path(), &ChannelConfig::default()).unwrap();
        let prefixes: Vec<&str> = listing.pairs.iter().map(|p| p.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["run1 ", "run2 ", "run3 "]);
    }

    #[test]
    fn test_subdirectories_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("Y_Ana7_input.csv")).unwrap();
        touch(temp_dir.path(), "Y_Ana8_cap.csv");

        let listing = discover_pairs(temp_dir.path(), &ChannelConfig::default()).unwrap();
        assert!(listing.pairs.is_empty());
        assert_eq!(listing.unmatched.len(), 1);
    }

    #[test]
    fn test_missing_folder() {
        let temp_dir = TempDir::new().unwrap();
        let result = discover_pairs(&temp_dir.path().join("absent"), &ChannelConfig::default());
        assert!(matches!(result, Err(PairingError::DirectoryNotFound(_))));
    }
}
