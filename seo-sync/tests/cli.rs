use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a config file for the CLI pointing at the given API and target directory.
fn create_config(api_base_url: &str, target_directory: &Path) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    let yaml = format!(
        "api_base_url: \"{api_base_url}\"\nsources:\n  - id: main\n    domain: example.com\n    install_id: test-install\n    target_directory: \"{}\"\n",
        target_directory.display()
    );
    write(config.path(), yaml).expect("Writing temp config failed");
    config
}

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("seo-sync").expect("Binary exists");
    cmd.env_remove("SEO_SYNC_API_BASE_URL");
    cmd
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_cli_happy_flow_writes_files_and_reports() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/example.com/content"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"sitemapXml":"<urlset/>","robotTxt":"User-agent: *","pages":[{"urlPath":"/about","title":"About","html":"<p>hi</p>"}]}"#,
            "application/json",
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/example.com/content/previously-published"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(
            r#"{"error":"No generated pages to publish."}"#,
            "application/json",
        ))
        .mount(&mock_server)
        .await;

    let temp_out = tempdir().unwrap();
    let target = temp_out.path().join("public");
    let config = create_config(&mock_server.uri(), &target);

    cli()
        .arg("sync")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Synchronise complete")
                .and(predicate::str::contains("about.html")),
        );

    assert!(target.join("sitemap.xml").is_file());
    assert!(target.join("robots.txt").is_file());
    assert!(target.join("about.html").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetch_cli_previous_mode_writes_only_previous_content() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/example.com/content/previously-published"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"pages":[{"urlPath":"/guides/","title":"Guides","html":"<h1>Guides</h1>"}]}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_out = tempdir().unwrap();
    let target = temp_out.path().join("public");
    let config = create_config(&mock_server.uri(), &target);

    cli()
        .arg("fetch")
        .arg("--config")
        .arg(config.path())
        .arg("--source")
        .arg("main")
        .arg("--mode")
        .arg("previous")
        .assert()
        .success()
        .stdout(predicate::str::contains("guides/index.html"));

    assert!(target.join("guides/index.html").is_file());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_cli_fails_when_api_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&mock_server)
        .await;

    let temp_out = tempdir().unwrap();
    let config = create_config(&mock_server.uri(), temp_out.path());

    // First sync tolerates both branches failing, so force the new-only path.
    cli()
        .arg("fetch")
        .arg("--config")
        .arg(config.path())
        .arg("--source")
        .arg("main")
        .arg("--mode")
        .arg("new")
        .assert()
        .failure();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watch_cli_runs_immediate_sync_and_keeps_running() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/example.com/content"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"sitemapXml":"<urlset/>","pages":[{"urlPath":"/about","title":"About","html":"<p>hi</p>"}]}"#,
            "application/json",
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/example.com/content/previously-published"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&mock_server)
        .await;

    let temp_out = tempdir().unwrap();
    let target = temp_out.path().join("public");
    let config = create_config(&mock_server.uri(), &target);

    let mut child = std::process::Command::cargo_bin("seo-sync")
        .expect("Binary exists")
        .env_remove("SEO_SYNC_API_BASE_URL")
        .arg("watch")
        .arg("--config")
        .arg(config.path())
        .stdout(Stdio::piped())
        .spawn()
        .expect("watch should start");

    let page = target.join("about.html");
    let mut waited = Duration::ZERO;
    while !page.is_file() && waited < Duration::from_secs(20) {
        tokio::time::sleep(Duration::from_millis(100)).await;
        waited += Duration::from_millis(100);
    }

    let still_running = child.try_wait().expect("try_wait").is_none();
    child.kill().expect("kill watch");
    let output = child.wait_with_output().expect("collect output");

    assert!(page.is_file(), "immediate sync should write the page");
    assert!(target.join("sitemap.xml").is_file());
    assert!(still_running, "watch must keep running after the first sync");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Watching 1 source(s)"), "got: {stdout}");
}

#[test]
fn sync_cli_unknown_source_fails() {
    let temp_out = tempdir().unwrap();
    let config = create_config("http://127.0.0.1:9", temp_out.path());

    cli()
        .arg("sync")
        .arg("--config")
        .arg(config.path())
        .arg("--source")
        .arg("ghost")
        .assert()
        .failure();
}

#[test]
fn sync_cli_rejects_missing_config() {
    cli()
        .arg("sync")
        .arg("--config")
        .arg("/definitely/not/here.yaml")
        .assert()
        .failure();
}
