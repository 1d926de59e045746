use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::{debug, info};

use crate::api::WildtraxApi;
use crate::error::WildtraxError;
use crate::fs_util;
use crate::report::ReportQuery;
use crate::table::{self, ReportTable};

/// A downloaded export archive. The file is removed when this value is dropped
/// or consumed by [`unpack`].
pub struct ReportArchive {
    file: NamedTempFile,
}

impl ReportArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Streams the export for `query` into a fresh temporary file under `scratch`.
pub fn retrieve<A: WildtraxApi>(
    api: &A,
    token: &str,
    query: &ReportQuery,
    scratch: &Path,
) -> Result<ReportArchive, WildtraxError> {
    let file = Builder::new()
        .prefix("wildtrax-report")
        .suffix(".zip")
        .tempfile_in(scratch)
        .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
    debug!(
        project = query.project_id,
        sensor = %query.sensor,
        path = %file.path().display(),
        "requesting report export"
    );
    // on error `file` drops here and the partial download goes with it
    api.download_report(token, query, file.path())?;
    Ok(ReportArchive { file })
}

/// Extracts `archive` and parses every data sheet, keyed by sanitized file stem.
///
/// The archive and the extraction directory are deleted before returning,
/// whether parsing succeeded or not.
pub fn unpack(
    archive: ReportArchive,
    scratch: &Path,
) -> Result<BTreeMap<String, ReportTable>, WildtraxError> {
    let workdir = Builder::new()
        .prefix("wildtrax-unpack")
        .tempdir_in(scratch)
        .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;

    let parsed = parse_archive(archive.path(), &workdir);
    let cleanup = release(archive, workdir);
    let tables = parsed?;
    cleanup?;
    info!(tables = tables.len(), "report archive parsed");
    Ok(tables)
}

fn parse_archive(
    archive: &Path,
    workdir: &TempDir,
) -> Result<BTreeMap<String, ReportTable>, WildtraxError> {
    let extracted = fs_util::extract_zip(archive, workdir.path())?;
    let data_files = fs_util::discard_abstract(extracted)?
        .into_iter()
        .filter(|path| has_csv_extension(path))
        .map(|path| fs_util::sanitize_in_place(&path))
        .collect::<Result<Vec<PathBuf>, _>>()?;

    let mut tables = BTreeMap::new();
    for path in data_files {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let file = File::open(&path).map_err(|err| WildtraxError::Table {
            file: stem.clone(),
            message: err.to_string(),
        })?;
        let table = table::read_table(&stem, file)?;
        debug!(
            table = %stem,
            rows = table.num_rows(),
            columns = table.columns().len(),
            "parsed report sheet"
        );
        tables.insert(stem, table);
    }
    Ok(tables)
}

fn release(archive: ReportArchive, workdir: TempDir) -> Result<(), WildtraxError> {
    let dir = workdir
        .close()
        .map_err(|err| WildtraxError::Filesystem(format!("remove extraction dir: {err}")));
    let file = archive
        .file
        .close()
        .map_err(|err| WildtraxError::Filesystem(format!("remove archive: {err}")));
    dir.and(file)
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}
