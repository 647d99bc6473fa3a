//! Configuration layering: defaults, TOML file, environment overrides.

use inserv_manager::config::{AppConfig, LogFormat};
use serial_test::serial;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
[logging]
format = "json"

[controls]
float_decimals = 3

[actions]
reserved = ["initialize"]
"#,
    );
    let config = AppConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.controls.float_decimals, 3);
    assert_eq!(config.controls.float_min_step, 1e-6);

    let options = config.assembly_options();
    assert!(options.actions.is_exposed("refresh"));
    assert!(!options.actions.is_exposed("initialize"));
    assert!(!options.actions.is_exposed("scan_async"));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let file = write_config("[logging]\nlevel = \"warn\"\n");
    std::env::set_var("INSERV_LOGGING__LEVEL", "debug");
    std::env::set_var("INSERV_CONTROLS__FLOAT_MIN_STEP", "0.01");
    let result = AppConfig::load(Some(file.path()));
    std::env::remove_var("INSERV_LOGGING__LEVEL");
    std::env::remove_var("INSERV_CONTROLS__FLOAT_MIN_STEP");

    let config = result.unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.controls.float_min_step, 0.01);
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    let file = write_config("[logging]\nlevel = \"chatty\"\n");
    let err = AppConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Invalid logging.level"));
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    let err = AppConfig::load(Some(Path::new("/nonexistent/inserv.toml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
#[serial]
fn test_bench_path_from_config() {
    let mut bench = NamedTempFile::new().unwrap();
    writeln!(
        bench,
        r#"
[[servers]]
name = "bench"

[[servers.devices]]
name = "psu"

[[servers.devices.attributes]]
name = "voltage"
kind = "numeric"
unit = "V"
value = 12.0
"#
    )
    .unwrap();
    let file = write_config(&format!(
        "[bench]\npath = {:?}\n",
        bench.path().display().to_string()
    ));

    let config = AppConfig::load(Some(file.path())).unwrap();
    let loaded = config.load_bench().unwrap();
    assert_eq!(loaded.servers[0].devices[0].name, "psu");
}
