//! Configuration loading from files.

use std::io::Write;
use std::time::Duration;
use xo_server::{PORT_ENV, ServerConfig};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
host = "0.0.0.0"
port = 9100
outbound_buffer = 4
waiting_timeout_secs = 5
sweep_interval_secs = 1
"#
    )
    .unwrap();

    let config = ServerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.bind_address(), "0.0.0.0:9100");
    assert_eq!(*config.outbound_buffer(), 4);
    assert_eq!(config.waiting_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.sweep_interval(), Duration::from_secs(1));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ServerConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.message.contains("Failed to read config file"));
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();
    assert!(ServerConfig::from_file(file.path()).is_err());
}

#[test]
fn test_rendered_config_loads_back() {
    let config = ServerConfig::default().with_port(7777);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", config.to_toml().unwrap()).unwrap();
    assert_eq!(ServerConfig::from_file(file.path()).unwrap(), config);
}

#[test]
fn test_override_beats_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 9100").unwrap();
    let config = ServerConfig::from_file(file.path())
        .unwrap()
        .with_overrides(|key| (key == PORT_ENV).then(|| "9200".to_string()))
        .unwrap();
    assert_eq!(*config.port(), 9200);
}
