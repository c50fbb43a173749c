//! Integration tests for configuration loading

use flowtrack::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[site]
id = "test-site"

[segmentation]
max_gap_ms = 3000
stickiness_eps_m = 0.5
nearest_fallback_m = 0.25

[partition]
min_sliver_area_m2 = 0.001

[output]
report_file = "r.json"
segments_file = "s.jsonl"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "test-site");
    assert_eq!(config.segmentation().max_gap_ms, 3000);
    assert_eq!(config.segmentation().stickiness_eps_m, 0.5);
    assert_eq!(config.segmentation().nearest_fallback_m, Some(0.25));
    assert_eq!(config.partition().min_sliver_area_m2, 0.001);
    assert_eq!(config.report_file(), "r.json");
    assert_eq!(config.segments_file(), "s.jsonl");
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.site_id(), "flowtrack");
    assert_eq!(config.segmentation().max_gap_ms, 5000);
    assert_eq!(config.segments_file(), "segments.jsonl");
}

#[test]
fn test_invalid_gap_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[segmentation]\nmax_gap_ms = 0\n").unwrap();
    temp_file.flush().unwrap();
    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_malformed_file_error_names_path() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[segmentation\n").unwrap();
    temp_file.flush().unwrap();
    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.site_id(), "flowtrack");
    assert_eq!(config.segmentation().max_gap_ms, 5000);
    assert_eq!(config.config_file(), "default");
}
