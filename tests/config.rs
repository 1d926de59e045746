mod common;

use assert_matches::assert_matches;

use wildtrax::config::{ConfigLoader, DEFAULT_BASE_URL};
use wildtrax::error::{ErrorKind, WildtraxError};
use wildtrax::species::SpeciesCache;

use common::{MockApi, app, species_table};

#[test]
fn resolve_reads_an_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wildtrax.json");
    std::fs::write(
        &path,
        r#"{"base_url": "https://staging.example.org", "timeout_secs": 30, "scratch_dir": "/var/tmp/wt"}"#,
    )
    .unwrap();

    let config = ConfigLoader::resolve(path.to_str()).unwrap();

    assert_eq!(config.base_url, "https://staging.example.org");
    assert_eq!(config.auth_url(), "https://staging.example.org/credential-exchange");
    assert_eq!(config.timeout_secs, Some(30));
    assert_eq!(config.scratch_dir(), std::path::PathBuf::from("/var/tmp/wt"));
    assert_eq!(config.referer(), "https://discover.wildtrax.ca/");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();

    assert_matches!(err, WildtraxError::ConfigRead(ref missing) if *missing == path);
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn empty_object_takes_defaults() {
    let config = ConfigLoader::parse("{}").unwrap();
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.timeout_secs, None);
    assert_matches!(
        ConfigLoader::parse(r#"{"base_url": "  "}"#),
        Err(WildtraxError::ConfigParse(_))
    );
}

#[test]
fn species_cache_refresh_respects_overwrite() {
    let scratch = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache_path =
        camino::Utf8PathBuf::from_path_buf(cache_dir.path().join("nested").join("species.json"))
            .unwrap();
    let cache = SpeciesCache::new_with_path(cache_path);
    let client = app(
        MockApi {
            species: species_table(),
            ..MockApi::default()
        },
        scratch.path(),
    );

    assert_eq!(cache.load().unwrap(), None);
    let (records, written) = client.refresh_species_cache(&cache, false).unwrap();
    assert!(written);
    assert_eq!(cache.load().unwrap(), Some(records.clone()));

    std::fs::write(cache.path(), "[]").unwrap();
    let (_, written) = client.refresh_species_cache(&cache, false).unwrap();
    assert!(!written);
    assert_eq!(cache.load().unwrap(), Some(Vec::new()));

    let (_, written) = client.refresh_species_cache(&cache, true).unwrap();
    assert!(written);
    assert_eq!(cache.load().unwrap(), Some(records));
}
