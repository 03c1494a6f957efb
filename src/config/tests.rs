use std::io::Write;

use serial_test::serial;

use super::*;

#[test]
fn defaults_point_at_public_services() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(
        settings.api.posts_base_url.as_str(),
        "https://jsonplaceholder.typicode.com/"
    );
    assert_eq!(
        settings.api.catalog_base_url.as_str(),
        "https://swapi.dev/api/people/"
    );
    assert_eq!(settings.cache.stale_time, Duration::ZERO);
    assert_eq!(settings.cache.gc_time, Duration::from_secs(300));
    assert_eq!(settings.cache.retry, 3);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(!settings.devtools.initial_open);
    assert!(!settings.app.show_people);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.cache.retry = Some(1);
    raw.logging.level = Some("info".to_string());

    let overrides = Overrides {
        cache_retry: Some(5),
        log_level: Some("debug".to_string()),
        posts_base_url: Some("http://127.0.0.1:9000".to_string()),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.retry, 5);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.api.posts_base_url.port(), Some(9000));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = Overrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn invalid_url_names_the_key() {
    let mut raw = RawSettings::default();
    raw.api.posts_base_url = Some("not a url".to_string());

    let error = Settings::from_raw(raw).expect_err("invalid url");
    match error {
        LoadError::Invalid { key, .. } => assert_eq!(key, "api.posts_base_url"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn non_http_scheme_is_rejected() {
    let mut raw = RawSettings::default();
    raw.api.catalog_base_url = Some("ftp://example.com/people/".to_string());

    let error = Settings::from_raw(raw).expect_err("unsupported scheme");
    assert!(error.to_string().contains("api.catalog_base_url"));
}

#[test]
fn invalid_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let error = Settings::from_raw(raw).expect_err("invalid level");
    assert!(error.to_string().contains("logging.level"));
}

#[test]
fn zero_gc_time_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.gc_time_ms = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn excessive_retry_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.retry = Some(MAX_RETRY + 1);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
#[serial]
fn config_file_is_layered_under_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        "[cache]\nstale_time_ms = 5000\nretry = 2\n\n[devtools]\ninitial_open = true"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().into_owned();
    let args = CliArgs::parse_from(["ipsum", "--config-file", path.as_str(), "--cache-retry", "0"]);
    let settings = load(&args).expect("settings load");

    assert_eq!(settings.cache.stale_time, Duration::from_secs(5));
    assert_eq!(settings.cache.retry, 0);
    assert!(settings.devtools.initial_open);
}

#[test]
fn default_to_browse_command() {
    let args = CliArgs::parse_from(["ipsum"]);
    assert_eq!(args.command(), Command::Browse);
}

#[test]
fn parse_people_with_overrides() {
    let args = CliArgs::parse_from([
        "ipsum",
        "people",
        "--catalog-base-url",
        "http://localhost:8080/api/people/",
        "--log-json",
        "true",
    ]);

    assert_eq!(args.command(), Command::People);
    assert_eq!(
        args.overrides.catalog_base_url.as_deref(),
        Some("http://localhost:8080/api/people/")
    );
    assert_eq!(args.overrides.log_json, Some(true));
}

#[test]
#[serial]
fn environment_overrides_file_but_not_cli() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(file, "[cache]\nretry = 2\n\n[app]\nshow_people = false").expect("write config");

    // SAFETY: serialized with every other test touching the environment.
    unsafe {
        std::env::set_var("IPSUM__CACHE__RETRY", "4");
        std::env::set_var("IPSUM__APP__SHOW_PEOPLE", "true");
    }
    let path = file.path().to_string_lossy().into_owned();
    let from_env = load(&CliArgs::parse_from(["ipsum", "--config-file", path.as_str()]));
    let from_cli = load(&CliArgs::parse_from([
        "ipsum",
        "--config-file",
        path.as_str(),
        "--cache-retry",
        "1",
    ]));
    unsafe {
        std::env::remove_var("IPSUM__CACHE__RETRY");
        std::env::remove_var("IPSUM__APP__SHOW_PEOPLE");
    }

    let from_env = from_env.expect("settings load");
    assert_eq!(from_env.cache.retry, 4);
    assert!(from_env.app.show_people);
    assert_eq!(from_cli.expect("settings load").cache.retry, 1);
}
