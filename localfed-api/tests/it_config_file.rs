//! Loading federation config from files

use localfed_api::{ApiError, ConfigError, FederationBuilder, FederationConfig};
use localfed_query::RegistrationPolicy;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn load_toml_file() {
    let file = config_file(
        ".toml",
        r#"
registration_policy = "replace"
batch_size = 32
warn_on_nonstandard_iri = false
"#,
    );
    let config = FederationConfig::load(file.path()).unwrap();
    assert_eq!(config.registration_policy, RegistrationPolicy::Replace);
    assert_eq!(config.batch_size, 32);
    assert!(!config.warn_on_nonstandard_iri);
    assert_eq!(config.query_timeout_ms, None);
}

#[test]
fn load_json_file() {
    let file = config_file(".json", r#"{"query_timeout_ms": 2500, "auto_initialize": false}"#);
    let config = FederationConfig::load(file.path()).unwrap();
    assert_eq!(config.query_timeout_ms, Some(2500));
    assert!(!config.auto_initialize);
    assert_eq!(config.batch_size, 1000);
}

#[test]
fn empty_file_yields_defaults() {
    let file = config_file(".toml", "  \n");
    assert_eq!(
        FederationConfig::load(file.path()).unwrap(),
        FederationConfig::default()
    );
}

#[test]
fn parse_error_names_the_file() {
    let file = config_file(".json", "{ not json");
    let err = FederationConfig::load(file.path()).unwrap_err();
    match &err {
        ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn unknown_extension_is_rejected() {
    let file = config_file(".yaml", "batch_size = 7\n");
    let err = FederationConfig::load(file.path()).unwrap_err();
    match &err {
        ConfigError::Parse { path, message } => {
            assert_eq!(path, file.path());
            assert!(message.contains(".toml"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }

    let bare = config_file("", "batch_size = 7\n");
    assert!(matches!(
        FederationConfig::load(bare.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = FederationConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn builder_from_file_applies_config() {
    let file = config_file(".toml", "batch_size = 7\nauto_initialize = false\n");
    let federation = FederationBuilder::from_config_file(file.path())
        .unwrap()
        .build();
    assert!(!federation.is_initialized());
    if std::env::var_os("LOCALFED_BATCH_SIZE").is_none() {
        assert_eq!(federation.config().batch_size, 7);
    }

    let bad = config_file(".toml", "batch_size = \"many\"\n");
    assert!(matches!(
        FederationBuilder::from_config_file(bad.path()),
        Err(ApiError::Config(ConfigError::Parse { .. }))
    ));
}
