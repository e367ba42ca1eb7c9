use serde_json::json;
use std::io::{BufRead, Write};

mod test_support;
use test_support::{login_admin, request, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn health_answers_before_login_and_everything_else_waits() {
    let workspace = temp_dir("academyd-protocol-health");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["signedIn"].as_bool(), Some(false));
    assert!(health["version"].as_str().is_some());

    let code = request_err(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(code, "unauthorized");

    let code = request_err(&mut stdin, &mut reader, "3", "auth.session", json!({}));
    assert_eq!(code, "unauthorized");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_lines_and_unknown_methods_are_reported() {
    let workspace = temp_dir("academyd-protocol-errors");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["ok"].as_bool(), Some(false));
    assert_eq!(value["error"]["code"].as_str(), Some("bad_json"));

    login_admin(&mut stdin, &mut reader);
    let code = request_err(&mut stdin, &mut reader, "2", "grid.get", json!({}));
    assert_eq!(code, "not_implemented");

    let missing = request(&mut stdin, &mut reader, "3", "students.get", json!({}));
    assert_eq!(missing["error"]["code"].as_str(), Some("bad_params"));

    let none = request_ok(&mut stdin, &mut reader, "4", "students.get", json!({ "id": 9999 }));
    assert!(none.is_null());

    let update_missing = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({ "id": 9999, "name": "누구" }),
    );
    assert_eq!(update_missing, "not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn student_registration_flow_over_the_wire() {
    let workspace = temp_dir("academyd-protocol-register");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    login_admin(&mut stdin, &mut reader);

    let registered = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.register",
        json!({
            "student": { "name": "김하늘", "gender": "female", "birthDate": "2012-03-04", "grade": 6 },
            "guardians": [
                { "name": "김아빠", "relationshipType": "father", "phone": "010-1111-2222", "isPrimary": true },
                { "name": "이엄마", "relationshipType": "mother", "phone": "010-3333-4444" }
            ]
        }),
    );
    let student_id = registered["student"]["id"].as_i64().expect("student id");
    let academy_id = registered["student"]["academyId"]
        .as_str()
        .expect("academy id")
        .to_string();
    assert_eq!(registered["guardians"].as_array().map(|g| g.len()), Some(2));

    let by_academy_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.getByAcademyId",
        json!({ "academyId": academy_id.to_lowercase() }),
    );
    assert_eq!(by_academy_id["id"].as_i64(), Some(student_id));

    let guardians = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.guardians",
        json!({ "studentId": student_id }),
    );
    assert_eq!(guardians["guardians"].as_array().map(|g| g.len()), Some(2));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.list",
        json!({ "search": "하늘" }),
    );
    assert_eq!(listed["students"].as_array().map(|s| s.len()), Some(1));

    request_ok(&mut stdin, &mut reader, "5", "students.delete", json!({ "id": student_id }));
    let active = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.list",
        json!({ "status": "active" }),
    );
    assert_eq!(active["students"].as_array().map(|s| s.len()), Some(0));

    let summary = request_ok(&mut stdin, &mut reader, "7", "dashboard.summary", json!({}));
    assert_eq!(summary["totalStudents"].as_i64(), Some(1));
    assert_eq!(summary["activeStudents"].as_i64(), Some(0));
    assert_eq!(summary["totalGuardians"].as_i64(), Some(2));

    drop(stdin);
    let _ = child.wait();
}
