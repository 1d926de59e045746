mod common;

use std::path::Path;

use assert_matches::assert_matches;
use chrono::{TimeDelta, Utc};
use serde_json::json;

use wildtrax::WildTrax;
use wildtrax::api::WildtraxHttpClient;
use wildtrax::auth::{CredentialExchange, HttpCredentialExchange};
use wildtrax::config::ClientConfig;
use wildtrax::discover::DiscoveryRequest;
use wildtrax::domain::SensorKind;
use wildtrax::error::{ErrorKind, WildtraxError};
use wildtrax::report::ReportRequest;

use common::{MockExchange, Reply, build_zip, credentials, dir_entries, live_session, serve};

fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        ..ClientConfig::default()
    }
}

fn http_app(base_url: &str, scratch: &Path) -> WildTrax<WildtraxHttpClient, MockExchange> {
    WildTrax::new(
        WildtraxHttpClient::new(&config(base_url)).unwrap(),
        live_session(),
        scratch.to_path_buf(),
    )
}

fn summary_reply() -> Reply {
    Reply::json(200, json!({"results": [{"id": 42, "fullNm": "Boreal Grid", "sensorId": "ARU"}]}))
}

#[test]
fn refused_export_surfaces_status_and_server_message() {
    common::init_tracing();
    let scratch = tempfile::tempdir().unwrap();
    let (base_url, requests) = serve(vec![
        summary_reply(),
        Reply::text(403, "project is locked by its administrator"),
    ]);
    let client = http_app(&base_url, scratch.path());
    let request = ReportRequest::new(42, SensorKind::Aru, &["main", "tag"], true).unwrap();

    let err = client.download_report(&request).unwrap_err();

    assert_matches!(
        err,
        WildtraxError::Http { ref endpoint, status: 403, ref message }
            if endpoint == "/bis/download-report"
                && message == "project is locked by its administrator"
    );
    assert_eq!(err.kind(), ErrorKind::Http);
    assert!(dir_entries(scratch.path()).is_empty());

    let summary = requests.recv().unwrap().to_ascii_lowercase();
    assert!(summary.starts_with("get /bis/get-download-summary?sensorid=aru&sort=fullnm&order=asc "));
    assert!(summary.contains("authorization: bearer live-token"));

    let export = requests.recv().unwrap().to_ascii_lowercase();
    assert!(export.starts_with("get /bis/download-report?projectids=42&sensorid=aru&"));
    for flag in [
        "mainreport=true",
        "tagreport=true",
        "recordingreport=false",
        "pointcountreport=false",
        "includemetadata=true",
        "splitlocation=true",
    ] {
        assert!(export.contains(flag), "missing {flag} in {export}");
    }
    assert!(export.contains("accept: application/zip"));
    assert!(export.contains("authorization: bearer live-token"));
    assert!(export.contains("user-agent: wildtrax-rs/"));
}

#[test]
fn export_body_is_written_and_parsed() {
    let scratch = tempfile::tempdir().unwrap();
    let archive = build_zip(&[
        ("Boreal Grid_abstract.csv", "x\n"),
        ("Boreal Grid_main_report.csv", "location,species_code\nL-01,WTSP\nL-02,OVEN\n"),
    ]);
    let (base_url, _requests) = serve(vec![summary_reply(), Reply::zip(archive)]);
    let client = http_app(&base_url, scratch.path());
    let request = ReportRequest::new(42, SensorKind::Aru, &["main"], true).unwrap();

    let table = client.download_report(&request).unwrap().into_single().unwrap();

    assert_eq!(table.name(), "Boreal Grid_main_report");
    assert_eq!(table.num_rows(), 2);
    assert!(dir_entries(scratch.path()).is_empty());
}

#[test]
fn discovery_sends_browser_headers_and_single_species_payloads() {
    let scratch = tempfile::tempdir().unwrap();
    let (base_url, requests) = serve(vec![
        Reply::json(200, serde_json::to_value(common::species_table()).unwrap()),
        Reply::json(
            200,
            json!({"organizations": [], "projects": [{"projectId": 11, "projectName": "Boreal Grid", "count": 4}]}),
        ),
        Reply::json(
            200,
            json!({"map": {"features": [{"properties": {"count": 4}, "geometry": {"coordinates": [-113.5, 53.5]}}]}}),
        ),
    ]);
    let client = http_app(&base_url, scratch.path());

    let result = client
        .discover(&DiscoveryRequest::new(SensorKind::Aru, ["YEWA"]))
        .unwrap();

    assert_eq!(result.projects[0].project_id, 11);
    assert_eq!(result.locations[0].longitude, -113.5);

    let species = requests.recv().unwrap().to_ascii_lowercase();
    assert!(species.starts_with("post /bis/get-all-species "));
    for path in [
        "post /bis/get-data-discoverer-long-lat-summary ",
        "post /bis/get-data-discoverer-map-and-projects ",
    ] {
        let sent = requests.recv().unwrap().to_ascii_lowercase();
        assert!(sent.starts_with(path), "{sent}");
        assert!(sent.contains("authorization: bearer live-token"));
        assert!(sent.contains("origin: https://discover.wildtrax.ca"));
        assert!(sent.contains("referer: https://discover.wildtrax.ca/"));
        assert!(sent.contains(r#""speciesids":[202]"#));
        assert!(sent.contains(r#""sensorid":"aru""#));
    }
}

#[test]
fn undecodable_body_is_a_parsing_error() {
    let scratch = tempfile::tempdir().unwrap();
    let (base_url, _requests) = serve(vec![Reply::text(200, "<html>maintenance</html>")]);
    let client = http_app(&base_url, scratch.path());

    let err = client.download_summary(SensorKind::Cam).unwrap_err();

    assert_matches!(err, WildtraxError::Decode { ref endpoint, .. } if endpoint == "/bis/get-download-summary");
    assert_eq!(err.kind(), ErrorKind::Parsing);
}

#[test]
fn credential_exchange_bounds_the_token_lifetime() {
    let (base_url, requests) = serve(vec![
        Reply::json(200, json!({"access_token": "t", "expires_in": i64::MAX})),
        Reply::json(200, json!({"access_token": "t", "expires_in": -60})),
        Reply::json(200, json!({"access_token": "fresh", "expiry": 3600})),
    ]);
    let exchange = HttpCredentialExchange::new(&config(&base_url)).unwrap();

    for _ in 0..2 {
        let err = exchange.exchange(&credentials()).unwrap_err();
        assert_matches!(err, WildtraxError::CredentialExchange(_));
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    let before = Utc::now();
    let token = exchange.exchange(&credentials()).unwrap();
    assert_eq!(token.value, "fresh");
    assert!(token.expires_at >= before + TimeDelta::seconds(3600));
    assert!(token.expires_at <= Utc::now() + TimeDelta::seconds(3600));

    let sent = requests.recv().unwrap();
    assert!(sent.starts_with("POST /credential-exchange "));
    assert!(sent.contains(r#""username":"observer@example.org""#));
}
