use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::discover::{DiscoveryPayload, LongLatSummary, MapAndProjects};
use crate::domain::SensorKind;
use crate::error::WildtraxError;
use crate::report::ReportQuery;
use crate::species::SpeciesRecord;

pub const DOWNLOAD_SUMMARY_PATH: &str = "/bis/get-download-summary";
pub const DOWNLOAD_REPORT_PATH: &str = "/bis/download-report";
pub const ALL_SPECIES_PATH: &str = "/bis/get-all-species";
pub const LONG_LAT_SUMMARY_PATH: &str = "/bis/get-data-discoverer-long-lat-summary";
pub const MAP_AND_PROJECTS_PATH: &str = "/bis/get-data-discoverer-map-and-projects";

pub(crate) fn user_agent() -> String {
    format!("wildtrax-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// A project the authenticated user may export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadableProject {
    pub id: u64,
    #[serde(default)]
    pub organization_id: Option<u64>,
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default, rename = "fullNm")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub tasks: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryEnvelope {
    Wrapped { results: Vec<DownloadableProject> },
    Bare(Vec<DownloadableProject>),
}

/// Remote surface of the platform. Every method except `download_file` needs a
/// bearer token.
pub trait WildtraxApi: Send + Sync {
    fn download_summary(
        &self,
        token: &str,
        sensor: SensorKind,
    ) -> Result<Vec<DownloadableProject>, WildtraxError>;
    /// Streams the export archive for `query` into `destination`.
    fn download_report(
        &self,
        token: &str,
        query: &ReportQuery,
        destination: &Path,
    ) -> Result<(), WildtraxError>;
    fn all_species(&self, token: &str) -> Result<Vec<SpeciesRecord>, WildtraxError>;
    fn long_lat_summary(
        &self,
        token: &str,
        payload: &DiscoveryPayload,
    ) -> Result<LongLatSummary, WildtraxError>;
    fn map_and_projects(
        &self,
        token: &str,
        payload: &DiscoveryPayload,
    ) -> Result<MapAndProjects, WildtraxError>;
    fn download_file(&self, url: &str, destination: &Path) -> Result<(), WildtraxError>;
}

#[derive(Clone)]
pub struct WildtraxHttpClient {
    client: Client,
    base_url: String,
    origin: String,
    referer: String,
}

impl WildtraxHttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, WildtraxError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent())
                .map_err(|err| WildtraxError::ConfigParse(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|err| WildtraxError::Transport {
                endpoint: config.base_url.clone(),
                message: err.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            origin: config.origin.clone(),
            referer: config.referer(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(endpoint: &str, request: RequestBuilder) -> Result<Response, WildtraxError> {
        let response = request.send().map_err(|err| WildtraxError::Transport {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })?;
        Self::handle_status(endpoint, response)
    }

    fn handle_status(endpoint: &str, response: Response) -> Result<Response, WildtraxError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .ok()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "request failed".to_string());
        Err(WildtraxError::Http {
            endpoint: endpoint.to_string(),
            status,
            message,
        })
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, WildtraxError> {
        response.json().map_err(|err| WildtraxError::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }

    fn discover<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        payload: &DiscoveryPayload,
    ) -> Result<T, WildtraxError> {
        debug!(endpoint = path, species = ?payload.species_ids, "discovery query");
        let request = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(ORIGIN, &self.origin)
            .header(REFERER, &self.referer)
            .json(payload);
        let response = Self::send(path, request)?;
        Self::decode(path, response)
    }
}

impl WildtraxApi for WildtraxHttpClient {
    fn download_summary(
        &self,
        token: &str,
        sensor: SensorKind,
    ) -> Result<Vec<DownloadableProject>, WildtraxError> {
        let request = self
            .client
            .get(self.url(DOWNLOAD_SUMMARY_PATH))
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .query(&[
                ("sensorId", sensor.as_str()),
                ("sort", "fullNm"),
                ("order", "asc"),
            ]);
        let response = Self::send(DOWNLOAD_SUMMARY_PATH, request)?;
        let envelope: SummaryEnvelope = Self::decode(DOWNLOAD_SUMMARY_PATH, response)?;
        Ok(match envelope {
            SummaryEnvelope::Wrapped { results } => results,
            SummaryEnvelope::Bare(results) => results,
        })
    }

    fn download_report(
        &self,
        token: &str,
        query: &ReportQuery,
        destination: &Path,
    ) -> Result<(), WildtraxError> {
        let request = self
            .client
            .get(self.url(DOWNLOAD_REPORT_PATH))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/zip")
            .query(&query.to_params());
        let mut response = Self::send(DOWNLOAD_REPORT_PATH, request)?;
        let mut file = File::create(destination)
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        let written = std::io::copy(&mut response, &mut file).map_err(|err| {
            WildtraxError::Transport {
                endpoint: DOWNLOAD_REPORT_PATH.to_string(),
                message: err.to_string(),
            }
        })?;
        debug!(bytes = written, path = %destination.display(), "report archive written");
        Ok(())
    }

    fn all_species(&self, token: &str) -> Result<Vec<SpeciesRecord>, WildtraxError> {
        let request = self
            .client
            .post(self.url(ALL_SPECIES_PATH))
            .bearer_auth(token)
            .header(ACCEPT, "application/json");
        let response = Self::send(ALL_SPECIES_PATH, request)?;
        Self::decode(ALL_SPECIES_PATH, response)
    }

    fn long_lat_summary(
        &self,
        token: &str,
        payload: &DiscoveryPayload,
    ) -> Result<LongLatSummary, WildtraxError> {
        self.discover(LONG_LAT_SUMMARY_PATH, token, payload)
    }

    fn map_and_projects(
        &self,
        token: &str,
        payload: &DiscoveryPayload,
    ) -> Result<MapAndProjects, WildtraxError> {
        self.discover(MAP_AND_PROJECTS_PATH, token, payload)
    }

    fn download_file(&self, url: &str, destination: &Path) -> Result<(), WildtraxError> {
        let mut response = Self::send(url, self.client.get(url))?;
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        }
        let mut file = File::create(destination)
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| WildtraxError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
