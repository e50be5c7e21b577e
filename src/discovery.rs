use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{err_msg, BplError};

/// File extension of BPMN-Lite sources.
pub const SOURCE_EXTENSION: &str = "bpl";

/// Finds BPMN-Lite sources for the `check` command.
#[derive(Debug)]
pub struct SourceDiscoverer;

impl SourceDiscoverer {
    /// Returns `root` itself when it is a file, otherwise every `.bpl` file below it.
    ///
    /// The returned list of files is sorted to ensure deterministic output.
    pub fn discover_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, BplError> {
        let root = root.as_ref();
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }
        if !root.exists() {
            return Err(err_msg!(Io, "{} does not exist", root.display()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry
                .map_err(|e| err_msg!(Io, "failed to walk {}: {}", root.display(), e).caused_by(e))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !Self::is_source_file(path) {
                continue;
            }

            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    fn is_source_file(path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_discovers_sorted_sources_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/b.bpl"), "b").unwrap();
        fs::write(dir.path().join("a.bpl"), "a").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = SourceDiscoverer::discover_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("a.bpl"), PathBuf::from("nested/b.bpl")]);
    }

    #[test]
    fn test_single_file_is_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("process.txt");
        fs::write(&file, "x").unwrap();
        assert_eq!(SourceDiscoverer::discover_files(&file).unwrap(), vec![file]);
    }
}
