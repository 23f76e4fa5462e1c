use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Number of generic labels used when no label file is available.
pub const PLACEHOLDER_CLASS_COUNT: usize = 10;

/// `Font_0` .. `Font_9`
pub fn placeholder_class_names() -> Vec<String> {
    (0..PLACEHOLDER_CLASS_COUNT).map(|i| format!("Font_{}", i)).collect()
}

/// Read one class name per line, trimmed, skipping blank lines.
///
/// A missing, unreadable or empty file yields the placeholder labels so the
/// classifier always has at least one output.
pub fn read_class_names(path: &Path) -> Vec<String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Label file {} not found, using placeholder labels", path.display());
            return placeholder_class_names();
        }
        Err(e) => {
            warn!("Failed to read label file {}: {}", path.display(), e);
            return placeholder_class_names();
        }
    };

    let names: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if names.is_empty() {
        warn!("Label file {} is empty, using placeholder labels", path.display());
        return placeholder_class_names();
    }

    info!("Loaded {} class names from {}", names.len(), path.display());
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let names = read_class_names(&dir.path().join("fontlist.txt"));
        assert_eq!(names.len(), PLACEHOLDER_CLASS_COUNT);
        assert_eq!(names[0], "Font_0");
        assert_eq!(names[9], "Font_9");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fontlist.txt");
        fs::write(&path, "Arial\n\n  Helvetica  \r\n\nGeorgia\n").unwrap();

        assert_eq!(read_class_names(&path), vec!["Arial", "Helvetica", "Georgia"]);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fontlist.txt");
        fs::write(&path, "\n   \n").unwrap();

        assert_eq!(read_class_names(&path), placeholder_class_names());
    }
}
