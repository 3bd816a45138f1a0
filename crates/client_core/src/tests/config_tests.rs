use super::*;

use std::{collections::HashMap, io::Write};

#[test]
fn normalizes_trailing_slashes_and_whitespace() {
    assert_eq!(
        normalize_base_url(" https://artifacts.example.com/ ").expect("url"),
        "https://artifacts.example.com"
    );
    assert_eq!(
        normalize_base_url("http://localhost:8080//").expect("url"),
        "http://localhost:8080"
    );
    assert_eq!(normalize_base_url("").expect("url"), DEFAULT_API_BASE_URL);
}

#[test]
fn rejects_non_http_base_urls() {
    assert!(normalize_base_url("ftp://example.com").is_err());
    assert!(normalize_base_url("not a url").is_err());
}

#[test]
fn file_values_override_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "api_base_url = \"https://catalog.internal\"\nrequest_timeout_secs = 5"
    )
    .expect("write");

    let mut settings = ClientSettings::default();
    let raw = fs::read_to_string(file.path()).expect("read");
    apply_file_settings(&mut settings, parse_file_settings(&raw).expect("toml"));

    assert_eq!(settings.api_base_url, "https://catalog.internal");
    assert_eq!(settings.request_timeout_secs, 5);
    assert_eq!(settings.database_url, ClientSettings::default().database_url);
}

#[test]
fn malformed_settings_file_is_rejected_as_a_whole() {
    assert!(parse_file_settings("request_timeout_secs = \"soon\"").is_err());
    assert!(parse_file_settings("api_base_url = ").is_err());

    let empty = parse_file_settings("").expect("empty file");
    let mut settings = ClientSettings::default();
    apply_file_settings(&mut settings, empty);
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn prefixed_env_vars_win_over_plain_ones() {
    let env: HashMap<&str, &str> = [
        ("API_URL", "http://plain:1"),
        ("APP__API_URL", "http://prefixed:2"),
        ("DATABASE_URL", "sqlite://plain.db"),
        ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
    ]
    .into_iter()
    .collect();

    let mut settings = ClientSettings::default();
    apply_env_settings(&mut settings, |key| env.get(key).map(|v| v.to_string()));

    assert_eq!(settings.api_base_url, "http://prefixed:2");
    assert_eq!(settings.database_url, "sqlite://plain.db");
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn missing_settings_file_yields_defaults_plus_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("absent.toml"));
    assert!(settings.request_timeout() >= Duration::from_secs(1));
    assert!(!settings.database_url.is_empty());
}
