//! Test helper functions and utilities.

use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// Every file below `root`, keyed by `/`-joined relative path.
pub fn read_tree(root: &Path) -> anyhow::Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(name, std::fs::read(entry.path())?);
    }
    Ok(files)
}

/// Write `objects` below `root` as a bucket mirror.
pub fn write_mirror<'a>(
    root: &Path,
    objects: impl IntoIterator<Item = (&'a str, &'a [u8])>,
) -> std::io::Result<()> {
    for (name, body) in objects {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, body)?;
    }
    Ok(())
}
