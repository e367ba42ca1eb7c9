use serde_json::json;

mod test_support;
use test_support::{id_of, login_admin, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn duplicates_merge_into_primary_and_linked_guardians_resist_delete() {
    let workspace = temp_dir("academyd-guardian-merge");
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&workspace);
    login_admin(&mut stdin, &mut reader);

    let student_a = id_of(&request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "students.create",
        json!({ "name": "박솔" }),
    ));
    let student_b = id_of(&request_ok(
        &mut stdin,
        &mut reader,
        "s2",
        "students.create",
        json!({ "name": "박별" }),
    ));

    let primary = id_of(&request_ok(
        &mut stdin,
        &mut reader,
        "g1",
        "guardians.create",
        json!({ "name": "박엄마", "relationshipType": "mother", "phone": "010-5555-6666" }),
    ));
    let duplicate = id_of(&request_ok(
        &mut stdin,
        &mut reader,
        "g2",
        "guardians.create",
        json!({ "name": "박 엄마", "relationshipType": "mother", "phone": "010-5555-6666" }),
    ));

    request_ok(
        &mut stdin,
        &mut reader,
        "l1",
        "guardians.link",
        json!({ "guardianId": primary, "studentId": student_a }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "l2",
        "guardians.link",
        json!({ "guardianId": duplicate, "studentId": student_a }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "l3",
        "guardians.link",
        json!({ "guardianId": duplicate, "studentId": student_b }),
    );

    let by_phone = request_ok(
        &mut stdin,
        &mut reader,
        "p1",
        "guardians.findByPhone",
        json!({ "phone": "010-5555-6666" }),
    );
    assert_eq!(by_phone["guardians"].as_array().map(|g| g.len()), Some(2));

    let dupes = request_ok(&mut stdin, &mut reader, "d1", "guardians.duplicates", json!({}));
    let groups = dupes["groups"].as_array().expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["phone"].as_str(), Some("010-5555-6666"));
    assert_eq!(groups[0]["count"].as_i64(), Some(2));

    let blocked = request_err(
        &mut stdin,
        &mut reader,
        "x1",
        "guardians.delete",
        json!({ "id": duplicate }),
    );
    assert_eq!(blocked, "rule_violation");

    let merged = request_ok(
        &mut stdin,
        &mut reader,
        "m1",
        "guardians.merge",
        json!({ "primaryId": primary, "duplicateIds": [duplicate, primary, 4040] }),
    );
    assert_eq!(merged["mergedIds"], json!([duplicate]));
    assert_eq!(merged["skippedIds"], json!([primary, 4040]));
    assert_eq!(merged["linksMoved"].as_i64(), Some(1));

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "q1",
        "guardians.students",
        json!({ "guardianId": primary }),
    );
    let mut ids: Vec<i64> = students["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(id_of)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![student_a, student_b]);

    let gone = request_ok(&mut stdin, &mut reader, "q2", "guardians.get", json!({ "id": duplicate }));
    assert!(gone.is_null());

    let dupes = request_ok(&mut stdin, &mut reader, "d2", "guardians.duplicates", json!({}));
    assert_eq!(dupes["groups"].as_array().map(|g| g.len()), Some(0));

    request_ok(
        &mut stdin,
        &mut reader,
        "u1",
        "guardians.unlink",
        json!({ "guardianId": primary, "studentId": student_a }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "u2",
        "guardians.unlink",
        json!({ "guardianId": primary, "studentId": student_b }),
    );
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "x2",
        "guardians.delete",
        json!({ "id": primary }),
    );
    assert_eq!(deleted["deleted"].as_i64(), Some(primary));

    drop(stdin);
    let _ = child.wait();
}
