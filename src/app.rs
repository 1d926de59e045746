use std::path::{Path, PathBuf};

use tracing::info;

use crate::api::{DownloadableProject, WildtraxApi, WildtraxHttpClient};
use crate::auth::{AuthToken, CredentialExchange, HttpCredentialExchange, Session};
use crate::config::{ClientConfig, Credentials};
use crate::discover::{DiscoveryEngine, DiscoveryRequest, DiscoveryResult};
use crate::domain::SensorKind;
use crate::error::WildtraxError;
use crate::media::{self, MediaKind};
use crate::report::{self, ReportOutput, ReportRequest};
use crate::species::{SpeciesCache, SpeciesRecord};
use crate::table::ReportTable;

/// Entry point bundling the API client, the session and scratch space.
pub struct WildTrax<A: WildtraxApi, X: CredentialExchange> {
    api: A,
    session: Session<X>,
    scratch_dir: PathBuf,
}

impl WildTrax<WildtraxHttpClient, HttpCredentialExchange> {
    pub fn connect(config: &ClientConfig, credentials: Credentials) -> Result<Self, WildtraxError> {
        let api = WildtraxHttpClient::new(config)?;
        let exchange = HttpCredentialExchange::new(config)?;
        Ok(Self::new(
            api,
            Session::new(exchange, credentials),
            config.scratch_dir(),
        ))
    }

    /// Builds a client from `config` with credentials taken from the environment.
    pub fn from_env(config: &ClientConfig) -> Result<Self, WildtraxError> {
        Self::connect(config, Credentials::from_env()?)
    }
}

impl<A: WildtraxApi, X: CredentialExchange> WildTrax<A, X> {
    pub fn new(api: A, session: Session<X>, scratch_dir: PathBuf) -> Self {
        Self {
            api,
            session,
            scratch_dir,
        }
    }

    pub fn authenticate(&mut self, force: bool) -> Result<&AuthToken, WildtraxError> {
        self.session.authenticate(force)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn session(&self) -> &Session<X> {
        &self.session
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn download_summary(
        &self,
        sensor: SensorKind,
    ) -> Result<Vec<DownloadableProject>, WildtraxError> {
        let token = self.session.bearer()?;
        self.api.download_summary(token, sensor)
    }

    pub fn download_report(&self, request: &ReportRequest) -> Result<ReportOutput, WildtraxError> {
        let token = self.session.bearer()?;
        report::download(&self.api, token, request, &self.scratch_dir)
    }

    pub fn species(&self) -> Result<Vec<SpeciesRecord>, WildtraxError> {
        let token = self.session.bearer()?;
        self.api.all_species(token)
    }

    /// Fetches the species table and writes it to `cache` when absent or when
    /// `overwrite` is set. Returns the fetched table and whether it was written.
    pub fn refresh_species_cache(
        &self,
        cache: &SpeciesCache,
        overwrite: bool,
    ) -> Result<(Vec<SpeciesRecord>, bool), WildtraxError> {
        let records = self.species()?;
        let written = cache.store(&records, overwrite)?;
        Ok((records, written))
    }

    pub fn discover(&self, request: &DiscoveryRequest) -> Result<DiscoveryResult, WildtraxError> {
        let token = self.session.bearer()?;
        info!(
            sensor = %request.sensor,
            species = request.species.len(),
            bounded = request.boundary.is_some(),
            "starting discovery"
        );
        DiscoveryEngine::new(&self.api, token).run(request)
    }

    pub fn download_tag_media(
        &self,
        tags: &ReportTable,
        kind: MediaKind,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, WildtraxError> {
        media::download_tag_media(&self.api, tags, kind, output_dir)
    }
}
