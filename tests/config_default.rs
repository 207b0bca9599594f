// tests/config_default.rs
use nrb_watch::config::{load_config_default, load_config_from, ENV_CONFIG_PATH};
use nrb_watch::ExtractionStrategy;
use std::{env, fs};

#[test]
fn explicit_toml_path_parses_strategies() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("watch.toml");
    fs::write(
        &p,
        r#"
state_dir = "var/state"
http_timeout_secs = 10

[smtp]
host = "smtp.example.test"
port = 587

[[sources]]
id = "month"
label = "Monthly Statistics (BFR)"
locator = "https://example.test/monthly"
strategy = { kind = "topmost_prefixed_anchor", prefix = "208" }

[[sources]]
id = "macro"
label = "Current Macro-Economic & Financial Situation"
locator = "https://example.test/macro"
strategy = { kind = "prefix_first_match_with_fallback", prefix = "Current", fallback_prefix = "208" }
"#,
    )
    .unwrap();

    let cfg = load_config_from(&p).unwrap();
    assert_eq!(cfg.http_timeout_secs, 10);
    assert_eq!(cfg.smtp.port, 587);
    assert_eq!(cfg.smtp.timeout_secs, 30);
    assert_eq!(cfg.sources.len(), 2);
    assert_eq!(
        cfg.sources[1].strategy,
        ExtractionStrategy::PrefixFirstMatchWithFallback {
            prefix: "Current".into(),
            fallback_prefix: "208".into(),
        }
    );
}

#[test]
fn invalid_file_is_rejected_with_path_in_message() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("watch.json");
    fs::write(
        &p,
        r#"{"sources":[{"id":"a b","label":"x","locator":"u","strategy":{"kind":"prefix_first_match","prefix":"2"}}]}"#,
    )
    .unwrap();
    let err = load_config_from(&p).unwrap_err();
    assert!(format!("{err:#}").contains("a b"));

    fs::write(&p, "{ not json").unwrap();
    let err = load_config_from(&p).unwrap_err();
    assert!(format!("{err:#}").contains("watch.json"));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var(ENV_CONFIG_PATH);

    // 1) Nothing on disk → built-in sources
    let v = load_config_default().unwrap();
    assert_eq!(v.sources.len(), 3);

    // 2) Fallback TOML in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("watch.toml"),
        r#"
[[sources]]
id = "only"
label = "Only"
locator = "https://example.test/"
strategy = { kind = "prefix_first_match", prefix = "208" }
"#,
    )
    .unwrap();
    let vt = load_config_default().unwrap();
    assert_eq!(vt.sources.len(), 1);
    assert_eq!(vt.sources[0].id, "only");

    // 3) Env wins; a dangling path is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
    assert!(load_config_default().is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}
