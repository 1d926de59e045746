use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{info, warn};

use crate::api::WildtraxApi;
use crate::archive;
use crate::domain::{ReportKind, SensorKind};
use crate::error::WildtraxError;
use crate::table::ReportTable;

const WEATHER_PREFIXES: [&str; 2] = ["daily", "hourly"];

/// A validated export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    project_id: u64,
    sensor: SensorKind,
    reports: BTreeSet<ReportKind>,
    include_weather: bool,
}

impl ReportRequest {
    /// Checks `reports` against the sensor's whitelist. Nothing touches the network.
    pub fn new<S: AsRef<str>>(
        project_id: u64,
        sensor: SensorKind,
        reports: &[S],
        include_weather: bool,
    ) -> Result<Self, WildtraxError> {
        if reports.is_empty() {
            return Err(WildtraxError::NoReports);
        }
        let reports = reports
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let invalid = || WildtraxError::InvalidReport {
                    sensor: sensor.to_string(),
                    report: name.to_string(),
                };
                let kind = name.parse::<ReportKind>().map_err(|_| invalid())?;
                if sensor.supports(kind) {
                    Ok(kind)
                } else {
                    Err(invalid())
                }
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self {
            project_id,
            sensor,
            reports,
            include_weather,
        })
    }

    pub fn project_id(&self) -> u64 {
        self.project_id
    }

    pub fn sensor(&self) -> SensorKind {
        self.sensor
    }

    pub fn reports(&self) -> &BTreeSet<ReportKind> {
        &self.reports
    }

    pub fn include_weather(&self) -> bool {
        self.include_weather
    }
}

/// Boolean export toggles derived from a [`ReportRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFlagMap {
    enabled: BTreeSet<ReportKind>,
}

impl ReportFlagMap {
    pub fn from_request(request: &ReportRequest) -> Self {
        Self {
            enabled: request.reports.clone(),
        }
    }

    pub fn is_enabled(&self, kind: ReportKind) -> bool {
        self.enabled.contains(&kind)
    }

    /// Every flag the endpoint understands, in a stable order.
    pub fn flags(&self) -> Vec<(&'static str, bool)> {
        let mut flags = ReportKind::ALL
            .iter()
            .map(|kind| (kind.flag(), self.is_enabled(*kind)))
            .collect::<Vec<_>>();
        flags.push(("includeMetaData", true));
        flags.push(("splitLocation", true));
        flags
    }
}

/// Query string for the export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub project_id: u64,
    pub sensor: SensorKind,
    pub flags: ReportFlagMap,
}

impl ReportQuery {
    pub fn new(request: &ReportRequest) -> Self {
        Self {
            project_id: request.project_id,
            sensor: request.sensor,
            flags: ReportFlagMap::from_request(request),
        }
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("projectIds", self.project_id.to_string()),
            ("sensorId", self.sensor.to_string()),
        ];
        params.extend(
            self.flags
                .flags()
                .into_iter()
                .map(|(name, value)| (name, value.to_string())),
        );
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutput {
    Single(ReportTable),
    Bundle(BTreeMap<ReportKind, ReportTable>),
}

impl ReportOutput {
    pub fn len(&self) -> usize {
        match self {
            ReportOutput::Single(_) => 1,
            ReportOutput::Bundle(tables) => tables.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_single(self) -> Option<ReportTable> {
        match self {
            ReportOutput::Single(table) => Some(table),
            ReportOutput::Bundle(_) => None,
        }
    }

    pub fn into_bundle(self) -> BTreeMap<ReportKind, ReportTable> {
        match self {
            ReportOutput::Bundle(tables) => tables,
            ReportOutput::Single(table) => {
                let kind = ReportKind::ALL
                    .into_iter()
                    .find(|kind| kind.matches_file_stem(table.name()));
                kind.map(|kind| BTreeMap::from([(kind, table)]))
                    .unwrap_or_default()
            }
        }
    }
}

/// Drops weather columns when unwanted, keeps only the requested reports, and
/// collapses a single survivor to [`ReportOutput::Single`].
pub fn assemble(
    tables: BTreeMap<String, ReportTable>,
    request: &ReportRequest,
) -> Result<ReportOutput, WildtraxError> {
    let mut selected: BTreeMap<ReportKind, ReportTable> = BTreeMap::new();
    for (stem, mut table) in tables {
        let Some(kind) = request
            .reports
            .iter()
            .copied()
            .find(|kind| kind.matches_file_stem(&stem))
        else {
            continue;
        };
        if let Some(previous) = selected.get(&kind) {
            return Err(WildtraxError::Table {
                file: stem.clone(),
                message: format!(
                    "both {} and {stem} look like the {kind} report",
                    previous.name()
                ),
            });
        }
        if !request.include_weather {
            table.retain_columns(|name| {
                !WEATHER_PREFIXES
                    .iter()
                    .any(|prefix| name.starts_with(prefix))
            });
        }
        selected.insert(kind, table);
    }

    if selected.is_empty() {
        warn!(
            project = request.project_id,
            "export archive held none of the requested reports"
        );
    }

    if selected.len() == 1 {
        if let Some((_, table)) = selected.pop_first() {
            return Ok(ReportOutput::Single(table));
        }
    }
    Ok(ReportOutput::Bundle(selected))
}

/// Runs the full export: project check, download, unpack, assemble.
pub fn download<A: WildtraxApi>(
    api: &A,
    token: &str,
    request: &ReportRequest,
    scratch: &Path,
) -> Result<ReportOutput, WildtraxError> {
    let projects = api.download_summary(token, request.sensor)?;
    if !projects.iter().any(|project| project.id == request.project_id) {
        return Err(WildtraxError::UnauthorizedProject(request.project_id));
    }

    let query = ReportQuery::new(request);
    let archive = archive::retrieve(api, token, &query, scratch)?;
    let tables = archive::unpack(archive, scratch)?;
    let output = assemble(tables, request)?;
    info!(
        project = request.project_id,
        sensor = %request.sensor,
        tables = output.len(),
        "report downloaded"
    );
    Ok(output)
}
