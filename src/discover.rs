//! Finding observation logs on disk by file-name suffix.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Every file directly under `dir` whose name ends with `suffix`, sorted by name.
pub fn logs_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(suffix))
        {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// The single log under `dir` ending with `suffix`.
pub fn unique_log(dir: &Path, suffix: &str) -> Result<PathBuf> {
    let mut found = logs_with_suffix(dir, suffix)?;
    if found.len() == 1 {
        Ok(found.remove(0))
    } else {
        Err(Error::AmbiguousSource {
            dir: dir.to_path_buf(),
            suffix: suffix.to_string(),
            found: found.len(),
        })
    }
}

/// The part of a log's file name before the first occurrence of `suffix`.
pub fn db_tag(path: &Path, suffix: &str) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.find(suffix) {
        Some(end) => name[..end].to_string(),
        None => name,
    }
}
