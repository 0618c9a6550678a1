use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::CoreError;

pub const SOURCE_EXTENSION: &str = "jack";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub contents: String,
}

impl SourceFile {
    /// `path` with its extension replaced, e.g. `Main.jack` -> `Main.vm`.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.path.with_extension(extension)
    }
}

pub fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Every source file at `root`: the file itself, or all `.jack` files
/// beneath a directory, sorted by path.
pub fn collect_sources(root: impl AsRef<Path>) -> Result<Vec<SourceFile>, CoreError> {
    let root = root.as_ref();
    let metadata = fs::metadata(root)?;
    if metadata.is_file() {
        if !is_source(root) {
            log::warn!("{} does not have a .{SOURCE_EXTENSION} extension, skipping", root.display());
            return Ok(Vec::new());
        }
        return Ok(vec![read_source(root)?]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| CoreError::SourceIo(err.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if is_source(path) {
            files.push(read_source(path)?);
        } else {
            log::debug!("skipping {}", path.display());
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn read_source(path: &Path) -> Result<SourceFile, CoreError> {
    Ok(SourceFile {
        path: path.to_path_buf(),
        contents: fs::read_to_string(path)?,
    })
}
