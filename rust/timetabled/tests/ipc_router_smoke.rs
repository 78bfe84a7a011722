mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{request, request_err_code, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("timetable-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "branches.upsert",
        json!({ "id": "b1", "name": "Main campus" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "4", "branches.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.import",
        json!({ "payload": { "schedule": { "Monday": [
            { "id": "m1", "startTime": "09:00", "endTime": "10:00", "subject": "Math", "branchId": "b1" }
        ] } } }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "6", "schedule.events.list", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "7", "schedule.layout", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "schedule.color",
        json!({ "subject": "Math" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "9", "schedule.settings.get", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "schedule.settings.update",
        json!({ "patch": { "pixelsPerMinute": 1.5 } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "workspace.backup.export",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    assert!(bundle_out.is_file());

    let code = request_err_code(&mut stdin, &mut reader, "12", "grades.list", json!({}));
    assert_eq!(code, "not_implemented");
}

#[test]
fn unparseable_line_gets_bad_json_and_loop_continues() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{ this is not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));

    let health = request(&mut stdin, &mut reader, "after", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
}

#[test]
fn workspace_methods_require_a_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    for (i, method) in [
        "schedule.import",
        "schedule.events.create",
        "schedule.events.update",
        "schedule.events.delete",
        "schedule.settings.update",
        "branches.upsert",
        "workspace.backup.export",
    ]
    .iter()
    .enumerate()
    {
        let code = request_err_code(&mut stdin, &mut reader, &format!("w{}", i), method, json!({}));
        assert_eq!(code, "no_workspace", "{}", method);
    }

    // Read-only views fall back to empty results or defaults.
    let branches = request_ok(&mut stdin, &mut reader, "r1", "branches.list", json!({}));
    assert_eq!(branches["branches"], json!([]));
    let settings = request_ok(&mut stdin, &mut reader, "r2", "schedule.settings.get", json!({}));
    assert_eq!(settings["pixelsPerMinute"], json!(1.0));
    let code = request_err_code(&mut stdin, &mut reader, "r3", "schedule.layout", json!({}));
    assert_eq!(code, "no_workspace");
}
