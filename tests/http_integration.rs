//! End-to-end tests against a real listener.

mod common;

use common::{client, read_pid, sh, wait_until_dead, TestServer};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_reload_delivers_all_lines_in_order() {
    let server = TestServer::start(None, |config, _| {
        config.reload_command = sh("for i in 1 2 3 4 5; do echo line-$i; done");
    })
    .await;

    let response = client().get(server.url("/reload")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        response.text().await.unwrap(),
        "line-1\nline-2\nline-3\nline-4\nline-5\n"
    );
}

#[tokio::test]
async fn test_lines_arrive_before_command_exits() {
    let server = TestServer::start(None, |config, _| {
        config.logs_command = sh("echo history; sleep 30; echo later");
    })
    .await;

    let mut response = client().get(server.url("/logs")).send().await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), response.chunk())
        .await
        .expect("first line should not wait for the command to finish")
        .unwrap()
        .unwrap();
    assert_eq!(&first[..], b"history\n");
}

#[tokio::test]
async fn test_client_disconnect_kills_command_group() {
    let server = TestServer::start(None, |config, dir| {
        let shell_pid = dir.path().join("shell.pid");
        let sleep_pid = dir.path().join("sleep.pid");
        config.logs_command = sh(&format!(
            "echo $$ > {}; sleep 60 & echo $! > {}; echo started; wait",
            shell_pid.display(),
            sleep_pid.display()
        ));
    })
    .await;

    let mut response = client().get(server.url("/logs")).send().await.unwrap();
    let first = response.chunk().await.unwrap().unwrap();
    assert_eq!(&first[..], b"started\n");

    let shell = read_pid(&server.path("shell.pid")).await;
    let sleeper = read_pid(&server.path("sleep.pid")).await;
    drop(response);

    assert!(
        wait_until_dead(shell, Duration::from_secs(5)).await,
        "shell {shell} survived the disconnect"
    );
    assert!(
        wait_until_dead(sleeper, Duration::from_secs(5)).await,
        "grandchild {sleeper} survived the disconnect"
    );
}

#[tokio::test]
async fn test_missing_script_is_reported_in_band() {
    let server = TestServer::start(None, |config, dir| {
        config.reload_command =
            mihomo_panel::config::reload_command(&dir.path().join("missing.sh").to_string_lossy());
    })
    .await;

    let response = client().get(server.url("/reload")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = response.text().await.unwrap();
    assert_eq!(text.lines().count(), 1, "got {text:?}");
    assert!(text.starts_with("Execution failed:"));
}

#[tokio::test]
async fn test_failing_script_reports_exit_status() {
    let server = TestServer::start(None, |config, _| {
        config.reload_command = sh("echo working; exit 4");
    })
    .await;

    let text = client()
        .get(server.url("/reload"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(text, "working\nExecution failed: exit status 4\n");
}

#[tokio::test]
async fn test_settings_round_trip() {
    let server = TestServer::start(None, |_, _| {}).await;
    std::fs::write(server.path(".env"), "PORT=8000\n").unwrap();
    let client = client();

    let saved: Value = client
        .post(server.url("/save_settings"))
        .json(&json!({"PORT": "9000", "SUB_URL": "https://sub.example/x", "secret": "abc"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saved, json!({"success": true}));

    let stored = std::fs::read_to_string(server.path(".env")).unwrap();
    assert!(stored.starts_with("PORT=9000\n"), "got {stored:?}");
    assert!(stored.contains("MIHOMO_SECRET=abc\n"));
    assert!(stored.contains("SUB_URL=https://sub.example/x\n"));

    let listed: Value = client
        .get(server.url("/get_settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        listed,
        json!({"success": true, "data": {"PORT": "9000", "SUB_URL": "https://sub.example/x"}})
    );
}

#[tokio::test]
async fn test_secret_guards_saves() {
    let server = TestServer::start(Some("letmein"), |_, _| {}).await;
    std::fs::write(server.path(".env"), "MIHOMO_SECRET=letmein\n").unwrap();
    let client = client();

    let rejected = client
        .post(server.url("/save_settings"))
        .json(&json!({"secret": "guess", "PORT": "1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        rejected.json::<Value>().await.unwrap(),
        json!({"success": false, "msg": "invalid secret"})
    );

    let checked: Value = client
        .post(server.url("/check_secret"))
        .json(&json!({"secret": "letmein"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(checked, json!({"success": true, "msg": ""}));

    let accepted = client
        .post(server.url("/save_settings"))
        .json(&json!({"secret": "letmein", "PORT": "1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(
        std::fs::read_to_string(server.path(".env")).unwrap(),
        "MIHOMO_SECRET=letmein\nPORT=1\n"
    );
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let server = TestServer::start(None, |_, _| {}).await;

    let response = client()
        .post(server.url("/save_settings"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>().await.unwrap()["success"], false);
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let server = TestServer::start(None, |_, _| {}).await;

    let response = client().get(server.url("/admin")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), "Not Found");
}
