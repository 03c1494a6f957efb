use assert_cmd::Command;
use httpmock::MockServer;
use predicates::str::contains;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

fn ipsum() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ipsum"));
    cmd.env_remove("IPSUM_CONFIG_FILE")
        .env_remove("RUST_LOG")
        .current_dir(std::env::temp_dir());
    cmd
}

#[test]
fn invalid_posts_url_fails_fast() {
    ipsum()
        .args(["--posts-base-url", "not a url"])
        .write_stdin("q\n")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("api.posts_base_url"));
}

#[test]
fn invalid_config_file_value_is_reported() {
    let file = config_file("[cache]\nretry = 99\n");
    ipsum()
        .arg("--config-file")
        .arg(file.path())
        .write_stdin("q\n")
        .assert()
        .failure()
        .stderr(contains("cache.retry"));
}

#[test]
fn piped_session_prints_the_first_page() {
    let server = MockServer::start();
    let page = server.mock(|when, then| {
        when.method("GET")
            .path("/posts")
            .query_param("_limit", "10")
            .query_param("_page", "1");
        then.status(200).json_body(json!([
            {"userId": 1, "id": 1, "title": "sunt aut facere", "body": "quia et suscipit"},
            {"userId": 1, "id": 2, "title": "qui est esse", "body": "est rerum tempore"}
        ]));
    });

    let assert = ipsum()
        .args(["--posts-base-url", &server.base_url(), "--cache-retry", "0"])
        .write_stdin("")
        .assert()
        .success();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Blog 'em Ipsum"));
    assert!(output.contains("1. sunt aut facere"));
    assert!(output.contains("2. qui est esse"));
    page.assert_hits(2);
}

#[test]
fn people_command_reads_the_catalog() {
    let server = MockServer::start();
    let catalog = server.mock(|when, then| {
        when.method("GET").path("/api/people/");
        then.status(200).json_body(json!({
            "count": 1,
            "next": null,
            "previous": null,
            "results": [{"name": "Leia Organa", "hair_color": "brown", "eye_color": "brown"}]
        }));
    });

    let assert = ipsum()
        .arg("people")
        .args(["--catalog-base-url", &server.url("/api/people/")])
        .write_stdin("")
        .assert()
        .success();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Infinite Loading"));
    assert!(output.contains("Leia Organa"));
    assert!(!output.contains("Blog 'em Ipsum"));
    catalog.assert_hits(1);
}
