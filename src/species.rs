use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::WildtraxError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesRecord {
    pub id: u64,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
}

/// On-disk copy of the species table.
#[derive(Debug, Clone)]
pub struct SpeciesCache {
    path: Utf8PathBuf,
}

impl SpeciesCache {
    pub fn new() -> Result<Self, WildtraxError> {
        let path = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir()
                        .join(".cache")
                        .join("wildtrax")
                        .join("species.json"),
                )
                .ok()
            })
            .ok_or_else(|| {
                WildtraxError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self { path })
    }

    pub fn new_with_path(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.as_std_path().exists()
    }

    pub fn load(&self) -> Result<Option<Vec<SpeciesRecord>>, WildtraxError> {
        if !self.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        let records = serde_json::from_str(&content).map_err(|err| WildtraxError::Table {
            file: self.path.to_string(),
            message: err.to_string(),
        })?;
        Ok(Some(records))
    }

    /// Writes `records` unless a cache already exists and `overwrite` is false.
    /// Returns whether the file was written.
    pub fn store(&self, records: &[SpeciesRecord], overwrite: bool) -> Result<bool, WildtraxError> {
        if self.exists() && !overwrite {
            debug!(path = %self.path, "species cache present, not overwriting");
            return Ok(false);
        }
        let parent = self
            .path
            .parent()
            .ok_or_else(|| WildtraxError::Filesystem("invalid cache path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(records)
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("wildtrax-species")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), &content)
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        info!(path = %self.path, species = records.len(), "species cache written");
        Ok(true)
    }
}

/// Looks up `codes` (case-insensitively) in `table`, keeping input order and
/// dropping repeats. Unknown codes are reported together.
pub fn resolve_codes<'a, S: AsRef<str>>(
    table: &'a [SpeciesRecord],
    codes: &[S],
) -> Result<Vec<&'a SpeciesRecord>, WildtraxError> {
    if codes.is_empty() {
        return Err(WildtraxError::NoSpecies);
    }
    let mut resolved: Vec<&SpeciesRecord> = Vec::new();
    let mut unknown = Vec::new();
    for code in codes {
        let code = code.as_ref().trim();
        match table
            .iter()
            .find(|record| record.code.eq_ignore_ascii_case(code))
        {
            Some(record) if !resolved.iter().any(|seen| seen.id == record.id) => {
                resolved.push(record)
            }
            Some(_) => {}
            None => unknown.push(code.to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(WildtraxError::UnknownSpecies(unknown.join(", ")));
    }
    Ok(resolved)
}
