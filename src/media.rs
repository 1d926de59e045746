use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::api::WildtraxApi;
use crate::error::WildtraxError;
use crate::fs_util::sanitize_file_name;
use crate::table::{Cell, ReportTable};

const CLIP_URL_COLUMN: &str = "tag_clip_url";
const SPECTROGRAM_URL_COLUMN: &str = "tag_spectrogram_url";
const NAME_COLUMNS: [&str; 5] = [
    "location",
    "recording_date_time",
    "species_code",
    "individual_order",
    "detection_time",
];

/// Which tag media to fetch. `Both` is its own mode, not a combination of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Spectrogram,
    Both,
}

impl MediaKind {
    fn columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            MediaKind::Audio => &[(CLIP_URL_COLUMN, "mp3")],
            MediaKind::Spectrogram => &[(SPECTROGRAM_URL_COLUMN, "jpeg")],
            MediaKind::Both => &[(CLIP_URL_COLUMN, "mp3"), (SPECTROGRAM_URL_COLUMN, "jpeg")],
        }
    }
}

/// Downloads clip and/or spectrogram files for each row of a tag report into
/// `output_dir`, one after another. Returns the files written.
pub fn download_tag_media<A: WildtraxApi>(
    api: &A,
    tags: &ReportTable,
    kind: MediaKind,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, WildtraxError> {
    for &(column, _) in kind.columns() {
        if tags.column_index(column).is_none() {
            return Err(WildtraxError::Table {
                file: tags.name().to_string(),
                message: format!("missing column {column}; is this a tag report?"),
            });
        }
    }
    std::fs::create_dir_all(output_dir)
        .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;

    let mut written = Vec::new();
    for row in 0..tags.num_rows() {
        let stem = file_stem(tags, row);
        for &(column, default_ext) in kind.columns() {
            let Some(url) = tags.cell(row, column).and_then(Cell::as_str) else {
                warn!(row, column, "tag has no media url, skipping");
                continue;
            };
            let ext = url_extension(url).unwrap_or(default_ext);
            let destination = output_dir.join(format!("{stem}.{ext}"));
            api.download_file(url, &destination)?;
            written.push(destination);
        }
    }
    info!(files = written.len(), dir = %output_dir.display(), "tag media downloaded");
    Ok(written)
}

fn file_stem(tags: &ReportTable, row: usize) -> String {
    let parts = NAME_COLUMNS
        .iter()
        .map(|column| {
            tags.cell(row, column)
                .map(|cell| cell.to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();
    sanitize_file_name(&parts.join("__")).replace(' ', "_")
}

fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|ch| ch.is_ascii_alphanumeric()))
        .then_some(ext)
}
