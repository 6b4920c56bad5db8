//! Integration tests for the bear-mcp command line
//!
//! These run the compiled binary. Only `preview` and startup failures are
//! exercised, since `serve` needs an MCP client on stdio.

use assert_cmd::Command;
use predicates::prelude::*;

/// A command with every configuration variable cleared.
fn bear_mcp() -> Command {
    let mut cmd = Command::cargo_bin("bear-mcp").expect("binary should build");
    cmd.env_remove("BEAR_API_TOKEN")
        .env_remove("BEAR_CALLBACK_TIMEOUT")
        .env_remove("BEAR_BACKGROUND")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_missing_token_fails_startup() {
    bear_mcp()
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BEAR_API_TOKEN"));
}

#[test]
fn test_blank_token_fails_startup() {
    bear_mcp()
        .env("BEAR_API_TOKEN", "   ")
        .args(["preview", r#"{"action":"tags"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing Bear API token"));
}

#[test]
fn test_preview_masks_token() {
    bear_mcp()
        .env("BEAR_API_TOKEN", "secret")
        .args([
            "preview",
            r#"{"action":"create","title":"Grocery list","text":"milk, eggs"}"#,
        ])
        .assert()
        .success()
        .stdout(
            "bear://x-callback-url/create?title=Grocery%20list&text=milk%2C%20eggs&token=***\n",
        );
}

#[test]
fn test_preview_reveal_token_from_flag() {
    bear_mcp()
        .args([
            "--token",
            "secret",
            "preview",
            "--reveal-token",
            r#"{"action":"trash","id":"abc123"}"#,
        ])
        .assert()
        .success()
        .stdout("bear://x-callback-url/trash?id=abc123&token=secret\n");
}

#[test]
fn test_preview_background_from_env() {
    bear_mcp()
        .env("BEAR_API_TOKEN", "secret")
        .env("BEAR_BACKGROUND", "true")
        .args(["preview", r#"{"action":"delete-tag","name":"old"}"#])
        .assert()
        .success()
        .stdout("bear://x-callback-url/delete-tag?name=old&show_window=no&token=***\n");
}

#[test]
fn test_preview_rejects_invalid_parameters() {
    bear_mcp()
        .env("BEAR_API_TOKEN", "secret")
        .args(["preview", r#"{"action":"rename-tag","old_name":"work"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("new_name"));
}

#[test]
fn test_preview_rejects_unknown_action() {
    bear_mcp()
        .env("BEAR_API_TOKEN", "secret")
        .args(["preview", r#"{"action":"explode"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse action JSON"));
}

#[test]
fn test_zero_timeout_rejected() {
    bear_mcp()
        .args(["--token", "secret", "--timeout", "0", "preview", r#"{"action":"tags"}"#])
        .assert()
        .failure();
}
