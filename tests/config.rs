use std::{fs, path::PathBuf};

use rdf_composer::{
    compose::Composer,
    config::{Config, PropertySettings},
    logger::{self, LogLevel},
    ordering::CyclePolicy,
    Error,
};
use rstest::rstest;

fn write_config(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rdf-composer-config-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join(name);
    fs::write(&path, content).expect("write config");
    path
}

#[rstest]
#[case(
    "session.yaml",
    "composer:\n  cycle_policy: reject\nproperties:\n  cache_limit: 25\n  locale: de\n"
)]
#[case(
    "session.yml",
    "composer:\n  cycle_policy: reject\nproperties:\n  cache_limit: 25\n  locale: de\n"
)]
#[case(
    "session.toml",
    "[composer]\ncycle_policy = \"reject\"\n\n[properties]\ncache_limit = 25\nlocale = \"de\"\n"
)]
fn loads_files_by_extension(#[case] name: &str, #[case] content: &str) {
    let path = write_config(name, content);
    let config = Config::from_path(&path).expect("config");
    assert_eq!(config.composer.cycle_policy, CyclePolicy::Reject);
    assert_eq!(config.properties.cache_limit, 25);
    assert_eq!(config.properties.locale, "de");
    assert_eq!(config.properties.max_sets, PropertySettings::default().max_sets);
}

#[test]
fn rejects_unknown_extensions_and_missing_files() {
    let path = write_config("session.json", "{}");
    assert!(matches!(Config::from_path(&path), Err(Error::Message(_))));

    let missing = std::env::temp_dir().join("rdf-composer-config-missing.yaml");
    assert!(matches!(Config::from_path(missing), Err(Error::IO(_))));
}

#[test]
fn composers_take_their_settings_from_configuration() {
    let config = Config::from_yaml_str(
        "properties:\n  order_predicate: urn:test:next\n  cache_limit: 4\n",
    )
    .expect("config");
    let composer = Composer::builder().config(&config).build().expect("composer");
    assert_eq!(composer.order_predicate().as_str(), "urn:test:next");
    assert_eq!(composer.property_settings().cache_limit, 4);
    assert_eq!(composer.settings().cycle_policy, CyclePolicy::DropEdge);

    let invalid = Config::from_yaml_str("properties:\n  order_predicate: not an iri\n")
        .expect("config");
    assert!(Composer::builder().config(&invalid).build().is_err());
}

#[test]
fn logger_initializes_once() {
    let mut config = Config::default().logger;
    config.enable = true;
    config.level = LogLevel::Debug;
    logger::init(&config).expect("first init");
    logger::init(&config).expect("second init is a no-op");
}
