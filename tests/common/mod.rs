#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use chrono::{TimeDelta, Utc};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use wildtrax::WildTrax;
use wildtrax::api::{DownloadableProject, WildtraxApi};
use wildtrax::auth::{AuthToken, CredentialExchange, Session};
use wildtrax::config::Credentials;
use wildtrax::discover::{DiscoveryPayload, LongLatSummary, MapAndProjects};
use wildtrax::domain::SensorKind;
use wildtrax::error::WildtraxError;
use wildtrax::report::ReportQuery;
use wildtrax::species::SpeciesRecord;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct MockExchange {
    pub calls: Mutex<usize>,
}

impl CredentialExchange for MockExchange {
    fn exchange(&self, _credentials: &Credentials) -> Result<AuthToken, WildtraxError> {
        let mut guard = self.calls.lock().unwrap();
        *guard += 1;
        Ok(AuthToken::new(
            format!("token-{}", *guard),
            Utc::now() + TimeDelta::hours(12),
        ))
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("observer@example.org", "secret")
}

pub fn live_session() -> Session<MockExchange> {
    Session::with_token(
        MockExchange::default(),
        credentials(),
        AuthToken::new("live-token", Utc::now() + TimeDelta::hours(1)),
    )
}

#[derive(Default)]
pub struct MockApi {
    pub projects: Vec<DownloadableProject>,
    pub archive: Vec<u8>,
    pub report_failure: Option<(u16, String)>,
    pub species: Vec<SpeciesRecord>,
    pub summaries: HashMap<u64, LongLatSummary>,
    pub maps: HashMap<u64, MapAndProjects>,
    pub media: HashMap<String, Vec<u8>>,
    pub calls: Mutex<Vec<String>>,
    pub payloads: Mutex<Vec<DiscoveryPayload>>,
    pub queries: Mutex<Vec<ReportQuery>>,
}

impl MockApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

impl WildtraxApi for MockApi {
    fn download_summary(
        &self,
        token: &str,
        _sensor: SensorKind,
    ) -> Result<Vec<DownloadableProject>, WildtraxError> {
        assert!(!token.is_empty());
        self.record("download_summary");
        Ok(self.projects.clone())
    }

    fn download_report(
        &self,
        _token: &str,
        query: &ReportQuery,
        destination: &Path,
    ) -> Result<(), WildtraxError> {
        self.record("download_report");
        self.queries.lock().unwrap().push(query.clone());
        if let Some((status, message)) = &self.report_failure {
            std::fs::write(destination, b"partial").unwrap();
            return Err(WildtraxError::Http {
                endpoint: "/bis/download-report".to_string(),
                status: *status,
                message: message.clone(),
            });
        }
        std::fs::write(destination, &self.archive).unwrap();
        Ok(())
    }

    fn all_species(&self, _token: &str) -> Result<Vec<SpeciesRecord>, WildtraxError> {
        self.record("all_species");
        Ok(self.species.clone())
    }

    fn long_lat_summary(
        &self,
        _token: &str,
        payload: &DiscoveryPayload,
    ) -> Result<LongLatSummary, WildtraxError> {
        self.record("long_lat_summary");
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(self
            .summaries
            .get(&payload.species_ids[0])
            .cloned()
            .unwrap_or_default())
    }

    fn map_and_projects(
        &self,
        _token: &str,
        payload: &DiscoveryPayload,
    ) -> Result<MapAndProjects, WildtraxError> {
        self.record("map_and_projects");
        Ok(self
            .maps
            .get(&payload.species_ids[0])
            .cloned()
            .unwrap_or_default())
    }

    fn download_file(&self, url: &str, destination: &Path) -> Result<(), WildtraxError> {
        self.record("download_file");
        let bytes = self.media.get(url).ok_or_else(|| WildtraxError::Http {
            endpoint: url.to_string(),
            status: 404,
            message: "no such object".to_string(),
        })?;
        std::fs::write(destination, bytes).unwrap();
        Ok(())
    }
}

pub fn app(api: MockApi, scratch: &Path) -> WildTrax<MockApi, MockExchange> {
    WildTrax::new(api, live_session(), scratch.to_path_buf())
}

pub fn project(id: u64) -> DownloadableProject {
    serde_json::from_value(json!({
        "id": id,
        "organizationId": 1,
        "organizationName": "ABMI",
        "fullNm": format!("Project {id}"),
        "sensorId": "ARU",
        "tasks": 10,
        "status": "Published"
    }))
    .unwrap()
}

pub fn species_table() -> Vec<SpeciesRecord> {
    serde_json::from_value(json!([
        {"id": 101, "code": "WTSP", "commonName": "White-throated Sparrow", "className": "Aves", "order": "Passeriformes", "scientificName": "Zonotrichia albicollis"},
        {"id": 202, "code": "YEWA", "commonName": "Yellow Warbler", "className": "Aves", "order": "Passeriformes", "scientificName": "Setophaga petechia"},
        {"id": 303, "code": "OVEN", "commonName": "Ovenbird", "className": "Aves", "order": "Passeriformes", "scientificName": "Seiurus aurocapilla"}
    ]))
    .unwrap()
}

pub fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

/// A canned HTTP response for [`serve`].
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string().into_bytes(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn zip(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "application/zip",
            body,
        }
    }
}

/// Answers one connection per reply, in order, on a local port. Each raw request
/// (head and body) is forwarded on the returned channel.
pub fn serve(replies: Vec<Reply>) -> (String, Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (sender, requests) = mpsc::channel();
    thread::spawn(move || {
        for reply in replies {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            sender.send(request).unwrap();
            let head = format!(
                "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                reply.content_type,
                reply.body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&reply.body).unwrap();
            stream.flush().unwrap();
        }
    });
    (base_url, requests)
}

fn read_request(stream: &mut impl Read) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let read = stream.read(&mut chunk).unwrap();
        assert!(read > 0, "connection closed before request head");
        raw.extend_from_slice(&chunk[..read]);
        if let Some(pos) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&raw[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .map(|value| value.trim().parse::<usize>().unwrap())
        .unwrap_or(0);
    while raw.len() < head_end + content_length {
        let read = stream.read(&mut chunk).unwrap();
        assert!(read > 0, "connection closed before request body");
        raw.extend_from_slice(&chunk[..read]);
    }
    String::from_utf8_lossy(&raw).into_owned()
}
