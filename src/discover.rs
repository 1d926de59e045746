//! Data-discovery queries: per-species project aggregates and point locations.
//!
//! Species are queried one after another in input order, two requests each. The
//! accumulated tables therefore list species in the order the caller gave them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::WildtraxApi;
use crate::domain::{Boundary, SensorKind};
use crate::error::WildtraxError;
use crate::species::{self, SpeciesRecord};

pub const DEFAULT_ZOOM_LEVEL: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    #[serde(rename = "_sw")]
    pub south_west: LngLat,
    #[serde(rename = "_ne")]
    pub north_east: LngLat,
}

impl Bounds {
    pub const GLOBAL: Bounds = Bounds {
        south_west: LngLat {
            lng: -180.0,
            lat: -90.0,
        },
        north_east: LngLat {
            lng: 180.0,
            lat: 90.0,
        },
    };
}

/// JSON body shared by both discovery endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryPayload {
    pub is_species_tab: bool,
    pub zoom_level: u8,
    pub bounds: Bounds,
    pub sensor_id: SensorKind,
    pub polygon_boundary: Option<Boundary>,
    pub organization_ids: Option<Vec<u64>>,
    pub project_ids: Option<Vec<u64>>,
    pub species_ids: Vec<u64>,
}

/// One species' worth of discovery filters.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryQuery {
    pub sensor: SensorKind,
    pub species_id: u64,
    pub zoom_level: u8,
    pub bounds: Bounds,
    pub boundary: Option<Boundary>,
}

impl DiscoveryQuery {
    pub fn payload(&self) -> DiscoveryPayload {
        DiscoveryPayload {
            is_species_tab: false,
            zoom_level: self.zoom_level,
            bounds: self.bounds,
            sensor_id: self.sensor,
            polygon_boundary: self.boundary.clone(),
            organization_ids: None,
            project_ids: None,
            species_ids: vec![self.species_id],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationCount {
    #[serde(default)]
    pub organization_id: u64,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCount {
    #[serde(default)]
    pub project_id: u64,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub count: u64,
}

/// Response of the long/lat summary endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LongLatSummary {
    #[serde(default)]
    pub organizations: Vec<OrganizationCount>,
    #[serde(default)]
    pub projects: Vec<ProjectCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureProperties {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointGeometry {
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: FeatureProperties,
    pub geometry: PointGeometry,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Response of the map-and-projects endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MapAndProjects {
    #[serde(default)]
    pub map: FeatureCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCountRow {
    pub species_code: String,
    pub species_common_name: String,
    pub count: u64,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectSummaryRow {
    pub project_id: u64,
    pub project_name: String,
    pub count: u64,
    pub species_common_name: String,
    pub species_code: String,
    pub species_scientific_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub sensor: SensorKind,
    pub species: Vec<String>,
    pub zoom_level: u8,
    pub boundary: Option<Boundary>,
}

impl DiscoveryRequest {
    pub fn new<S: Into<String>>(sensor: SensorKind, species: impl IntoIterator<Item = S>) -> Self {
        Self {
            sensor,
            species: species.into_iter().map(Into::into).collect(),
            zoom_level: DEFAULT_ZOOM_LEVEL,
            boundary: None,
        }
    }

    pub fn zoom_level(mut self, zoom_level: u8) -> Self {
        self.zoom_level = zoom_level;
        self
    }

    pub fn boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = Some(boundary);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryResult {
    pub projects: Vec<ProjectSummaryRow>,
    pub locations: Vec<LocationCountRow>,
}

impl DiscoveryResult {
    pub fn into_parts(self) -> (Vec<ProjectSummaryRow>, Vec<LocationCountRow>) {
        (self.projects, self.locations)
    }
}

pub struct DiscoveryEngine<'a, A: WildtraxApi> {
    api: &'a A,
    token: &'a str,
}

impl<'a, A: WildtraxApi> DiscoveryEngine<'a, A> {
    pub fn new(api: &'a A, token: &'a str) -> Self {
        Self { api, token }
    }

    pub fn run(&self, request: &DiscoveryRequest) -> Result<DiscoveryResult, WildtraxError> {
        if request.species.is_empty() {
            return Err(WildtraxError::NoSpecies);
        }
        let table = self.api.all_species(self.token)?;
        let targets = species::resolve_codes(&table, request.species.as_slice())?;

        let mut result = DiscoveryResult::default();
        for record in targets {
            let query = DiscoveryQuery {
                sensor: request.sensor,
                species_id: record.id,
                zoom_level: request.zoom_level,
                bounds: Bounds::GLOBAL,
                boundary: request.boundary.clone(),
            };
            let (projects, locations) = self.query_species(&query, record)?;
            debug!(
                species = %record.code,
                projects = projects.len(),
                locations = locations.len(),
                "species discovered"
            );
            result.projects.extend(projects);
            result.locations.extend(locations);
        }

        if result.projects.is_empty() || result.locations.is_empty() {
            return Err(WildtraxError::EmptyResult(format!(
                "{} data for species {} within the requested area",
                request.sensor,
                request.species.join(", ")
            )));
        }
        info!(
            projects = result.projects.len(),
            locations = result.locations.len(),
            "discovery complete"
        );
        Ok(result)
    }

    fn query_species(
        &self,
        query: &DiscoveryQuery,
        species: &SpeciesRecord,
    ) -> Result<(Vec<ProjectSummaryRow>, Vec<LocationCountRow>), WildtraxError> {
        let payload = query.payload();
        let summary = self.api.long_lat_summary(self.token, &payload)?;
        let map = self.api.map_and_projects(self.token, &payload)?;

        let locations = map
            .map
            .features
            .into_iter()
            .map(|feature| LocationCountRow {
                species_code: species.code.clone(),
                species_common_name: species.common_name.clone(),
                count: feature.properties.count,
                longitude: feature.geometry.coordinates[0],
                latitude: feature.geometry.coordinates[1],
            })
            .collect::<Vec<_>>();
        if locations.is_empty() {
            warn!(species = %species.code, "no map features returned");
        }

        Ok((project_rows(summary.projects, species), locations))
    }
}

/// Joins project counts onto `species` and drops exact duplicates, keeping the
/// first occurrence.
pub fn project_rows(projects: Vec<ProjectCount>, species: &SpeciesRecord) -> Vec<ProjectSummaryRow> {
    let mut seen = HashSet::new();
    projects
        .into_iter()
        .map(|project| ProjectSummaryRow {
            project_id: project.project_id,
            project_name: project.project_name,
            count: project.count,
            species_common_name: species.common_name.clone(),
            species_code: species.code.clone(),
            species_scientific_name: species.scientific_name.clone(),
        })
        .filter(|row| seen.insert(row.clone()))
        .collect()
}
