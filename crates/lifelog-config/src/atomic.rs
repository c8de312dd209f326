//! Crash-safe file replacement shared by the config manager and the JSON store.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

const TMP_SUFFIX: &str = "tmp";

/// Sibling path the new contents are staged in, e.g. `ledger.json.tmp`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    staged.set_extension(ext);
    staged
}

/// Writes `contents` next to `path`, syncs it, then renames it over `path`.
///
/// Readers see either the old file or the new one, never a partial write.
pub fn replace_file(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staging_path(path);
    let mut file = File::create(&staged)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    fs::rename(&staged, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_keeps_the_original_extension() {
        assert_eq!(
            staging_path(Path::new("/data/ledger.json")),
            PathBuf::from("/data/ledger.json.tmp")
        );
        assert_eq!(staging_path(Path::new("/data/store")), PathBuf::from("/data/store.tmp"));
    }

    #[test]
    fn replace_file_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        replace_file(&path, "{}").unwrap();
        replace_file(&path, "{\"a\":1}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");
        assert!(!staging_path(&path).exists());
    }
}
