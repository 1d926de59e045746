use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::WildtraxError;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[:()?!~;/,]").unwrap());

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, WildtraxError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        WildtraxError::Archive(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| WildtraxError::Archive(err.to_string()))?;

    let mut extracted = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| WildtraxError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(WildtraxError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| WildtraxError::Archive(format!("{}: {err}", entry.name())))?;
        extracted.push(entry_path);
    }
    debug!(files = extracted.len(), "archive extracted");
    Ok(extracted)
}

pub fn is_abstract(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase().ends_with("_abstract.csv"))
        .unwrap_or(false)
}

/// Deletes the archive's abstract sheet(s) and returns the remaining files.
pub fn discard_abstract(files: Vec<PathBuf>) -> Result<Vec<PathBuf>, WildtraxError> {
    let (abstracts, data): (Vec<_>, Vec<_>) = files.into_iter().partition(|path| is_abstract(path));
    if abstracts.is_empty() {
        warn!("report archive carried no abstract file");
    }
    for path in abstracts {
        fs::remove_file(&path).map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        debug!(path = %path.display(), "discarded abstract");
    }
    Ok(data)
}

pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "").into_owned()
}

/// Renames `path` in place so its file name holds no unsafe characters.
pub fn sanitize_in_place(path: &Path) -> Result<PathBuf, WildtraxError> {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return Err(WildtraxError::Filesystem(format!(
            "non-utf8 file name in archive: {}",
            path.display()
        )));
    };
    let clean = sanitize_file_name(name);
    if clean == name {
        return Ok(path.to_path_buf());
    }
    let target = path.with_file_name(&clean);
    if target.exists() {
        return Err(WildtraxError::Archive(format!(
            "{name} and {clean} collide once unsafe characters are removed"
        )));
    }
    fs::rename(path, &target).map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_unsafe_punctuation() {
        assert_eq!(
            sanitize_file_name("Big Grid (2022): North, South!_main_report.csv"),
            "Big Grid 2022 North South_main_report.csv"
        );
        assert_eq!(sanitize_file_name("plain_tag_report.csv"), "plain_tag_report.csv");
    }

    #[test]
    fn sanitize_in_place_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let clean = dir.path().join("Grid A_main_report.csv");
        let dirty = dir.path().join("Grid, A_main_report.csv");
        fs::write(&clean, "a\n1\n").unwrap();
        fs::write(&dirty, "a\n2\n").unwrap();

        let err = sanitize_in_place(&dirty).unwrap_err();

        assert!(matches!(err, WildtraxError::Archive(ref message) if message.contains("Grid, A_main_report.csv")));
        assert_eq!(fs::read_to_string(&clean).unwrap(), "a\n1\n");
        assert!(dirty.exists());
    }

    #[test]
    fn abstract_detection() {
        assert!(is_abstract(Path::new("/tmp/x/Project_abstract.csv")));
        assert!(!is_abstract(Path::new("/tmp/x/Project_main_report.csv")));
    }
}
