//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each test
//! gets its own data directory through `DAYSLOT_HOME`.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command against `home` and return output.
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "dayslot-cli", "--"])
        .args(args)
        .env("DAYSLOT_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn created_id(stdout: &str, prefix: &str) -> String {
    stdout
        .lines()
        .find_map(|l| l.strip_prefix(prefix))
        .expect("no id in output")
        .trim()
        .to_string()
}

fn list_json(home: &Path, extra: &[&str]) -> Vec<serde_json::Value> {
    let mut args = vec!["item", "list", "--json"];
    args.extend_from_slice(extra);
    let stdout = run_ok(home, &args);
    serde_json::from_str::<serde_json::Value>(&stdout)
        .expect("list output is JSON")
        .as_array()
        .cloned()
        .unwrap_or_default()
}

#[test]
fn test_item_add_and_list() {
    let home = TempDir::new().unwrap();
    let out = run_ok(home.path(), &["item", "add", "Water plants", "--category", "evening", "--kind", "want_to"]);
    let id = created_id(&out, "Item created:");

    let items = list_json(home.path(), &["--category", "evening"]);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], id.as_str());
    assert_eq!(items[0]["title"], "Water plants");
    assert_eq!(items[0]["kind"], "want_to");
    assert_eq!(items[0]["category"], "evening");

    let text = run_ok(home.path(), &["item", "list"]);
    assert!(text.contains("Water plants"));
}

#[test]
fn test_item_status_cycles() {
    let home = TempDir::new().unwrap();
    let out = run_ok(home.path(), &["item", "add", "Stretch"]);
    let id = created_id(&out, "Item created:");
    let short = &id[..8];

    assert_eq!(run_ok(home.path(), &["item", "status", short]).trim(), "in progress");
    assert_eq!(run_ok(home.path(), &["item", "status", short]).trim(), "done");
    let shown: serde_json::Value = serde_json::from_str(&run_ok(home.path(), &["item", "show", &id])).unwrap();
    assert_eq!(shown["status"], "done");
    assert!(shown["completed_at"].is_string());
    assert_eq!(run_ok(home.path(), &["item", "status", short]).trim(), "not started");
}

#[test]
fn test_item_move_and_adjacent() {
    let home = TempDir::new().unwrap();
    let out = run_ok(home.path(), &["item", "add", "Read", "--category", "daytime"]);
    let id = created_id(&out, "Item created:");

    assert!(run_ok(home.path(), &["item", "move", &id, "night"]).contains("night"));
    assert!(run_ok(home.path(), &["item", "next", &id]).contains("not moved"));
    assert!(run_ok(home.path(), &["item", "prev", &id]).contains("evening"));
}

#[test]
fn test_item_update_and_delete() {
    let home = TempDir::new().unwrap();
    let out = run_ok(home.path(), &["item", "add", "Call bank", "--memo", "before noon"]);
    let id = created_id(&out, "Item created:");

    run_ok(home.path(), &["item", "update", &id, "--title", "Call the bank", "--memo", ""]);
    let shown: serde_json::Value = serde_json::from_str(&run_ok(home.path(), &["item", "show", &id])).unwrap();
    assert_eq!(shown["title"], "Call the bank");
    assert!(shown["memo"].is_null());

    run_ok(home.path(), &["item", "delete", &id]);
    let (_, stderr, code) = run_cli(home.path(), &["item", "show", &id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_item_with_reminder_creates_entry() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["item", "add", "Vitamins", "--category", "morning", "--reminder"]);

    let entries: serde_json::Value =
        serde_json::from_str(&run_ok(home.path(), &["source", "list", "reminders", "--json"])).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["title"], "Vitamins");
    assert_eq!(entries[0]["is_done"], false);
}

#[test]
fn test_refresh_imports_calendar_entry() {
    let home = TempDir::new().unwrap();
    // an entry on today's date at the boundary always falls in the active window
    let now = chrono::Local::now().naive_local();
    let day = if now.time() < chrono::NaiveTime::from_hms_opt(6, 0, 0).unwrap() {
        now.date() - chrono::Duration::days(1)
    } else {
        now.date()
    };
    let at = format!("{} 06:30", day.format("%Y-%m-%d"));
    run_ok(home.path(), &["source", "add", "calendar", "Standup", "--at", &at]);

    let report = run_ok(home.path(), &["refresh"]);
    assert!(report.contains("calendar: 1 added"), "{report}");

    let items = list_json(home.path(), &[]);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Standup");
    assert_eq!(items[0]["category"], "morning");
    assert!(items[0]["calendar_event_id"].is_string());

    let again = run_ok(home.path(), &["refresh"]);
    assert!(again.contains("calendar: up to date"), "{again}");
}

#[test]
fn test_now_reports_current_window() {
    let home = TempDir::new().unwrap();
    let snapshot: serde_json::Value = serde_json::from_str(&run_ok(home.path(), &["now", "--json"])).unwrap();
    let category = snapshot["category"].as_str().unwrap();
    assert!(["morning", "daytime", "evening", "night"].contains(&category));
    assert_eq!(snapshot["open_count"], 0);
}

#[cfg(unix)]
#[test]
fn test_refused_source_prompts_once() {
    use std::os::unix::fs::PermissionsExt;

    let home = TempDir::new().unwrap();
    let calendar = home.path().join("calendar.json");
    std::fs::write(&calendar, "").unwrap();
    std::fs::set_permissions(&calendar, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::read(&calendar).is_ok() {
        // privileged users read through the mode bits
        return;
    }

    let (_, stderr, code) = run_cli(home.path(), &["now"]);
    assert_eq!(code, 0, "{stderr}");
    assert!(stderr.contains("calendar access was refused"), "{stderr}");

    let (_, stderr, _) = run_cli(home.path(), &["item", "list"]);
    assert!(!stderr.contains("access was refused"), "{stderr}");

    run_ok(home.path(), &["source", "reset-prompt", "calendar"]);
    let (_, stderr, _) = run_cli(home.path(), &["refresh"]);
    assert!(stderr.contains("calendar access was refused"), "{stderr}");
}

#[test]
fn test_config_get() {
    let home = TempDir::new().unwrap();
    assert_eq!(run_ok(home.path(), &["config", "get", "windows.evening.start"]).trim(), "18:00");
}

#[test]
fn test_config_set() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["config", "set", "windows.evening.start", "17:30"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "windows.evening.start"]).trim(), "17:30");

    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "windows.evening.start", "27:00"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_config_list_and_reset() {
    let home = TempDir::new().unwrap();
    run_ok(home.path(), &["config", "set", "widget.limit", "3"]);
    assert!(run_ok(home.path(), &["config", "list"]).contains("widget.limit = 3"));
    run_ok(home.path(), &["config", "reset"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "widget.limit"]).trim(), "5");
}

#[test]
fn test_completions() {
    let home = TempDir::new().unwrap();
    assert!(run_ok(home.path(), &["completions", "bash"]).contains("dayslot"));
}
