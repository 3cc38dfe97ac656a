use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_timetabled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn timetabled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("ttd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));

    // Everything but health/workspace.select needs an open workspace first.
    let gated = request(
        &mut stdin,
        &mut reader,
        "2",
        "periods.list",
        json!({ "schoolId": "s1" }),
    );
    assert_eq!(
        gated["error"]["code"].as_str(),
        Some("no_workspace"),
        "{}",
        gated
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request(
        &mut stdin,
        &mut reader,
        "4",
        "periods.create",
        json!({
            "schoolId": "s1",
            "label": "Period 1",
            "startTime": "08:00",
            "endTime": "09:00",
            "type": "class",
            "orderIndex": 0,
        }),
    );
    let period_id = created["result"]["id"].as_str().expect("period id").to_string();

    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "periods.list",
        json!({ "schoolId": "s1" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "periods.update",
        json!({
            "periodId": period_id,
            "label": "Period 1",
            "startTime": "08:00",
            "endTime": "09:00",
            "type": "class",
            "orderIndex": 0,
        }),
    );

    let entry = request(
        &mut stdin,
        &mut reader,
        "7",
        "schedule.create",
        json!({
            "schoolId": "s1",
            "academicYearId": "y1",
            "academicTermId": "term1",
            "classId": "c1",
            "subjectId": "sub1",
            "teacherId": "t1",
            "day": "monday",
            "periodId": period_id,
            "room": "101",
        }),
    );
    let entry_id = entry["result"]["id"].as_str().expect("entry id").to_string();

    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "schedule.list",
        json!({ "schoolId": "s1", "academicYearId": "y1", "academicTermId": "term1" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "schedule.update",
        json!({
            "entryId": entry_id,
            "schoolId": "s1",
            "academicYearId": "y1",
            "academicTermId": "term1",
            "classId": "c1",
            "subjectId": "sub1",
            "teacherId": "t1",
            "day": "tuesday",
            "periodId": period_id,
            "room": "101",
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "timetable.grid",
        json!({ "schoolId": "s1", "academicYearId": "y1", "academicTermId": "term1" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "schedule.delete",
        json!({ "entryId": entry_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "periods.delete",
        json!({ "periodId": period_id }),
    );

    let health = request(&mut stdin, &mut reader, "13", "health", json!({}));
    assert_eq!(health["ok"].as_bool(), Some(true));

    let _ = child.kill();
}

#[test]
fn unknown_methods_are_reported_as_not_implemented() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let payload = json!({ "id": "x", "method": "nope.nothing", "params": {} });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(value["ok"].as_bool(), Some(false));
    assert_eq!(value["error"]["code"].as_str(), Some("not_implemented"));

    let _ = child.kill();
}
