use serde::Deserialize;
use serde_json::json;

use crate::ipc::error::err;
use crate::ipc::helpers::{id_param, limit_param, params, patch_params, path_param, respond, str_param};
use crate::ipc::types::{AppState, Request};
use crate::models::{NewGuardian, NewStudent, StudentPatch};
use crate::services::student::{StudentFilter, StudentService};

#[derive(Deserialize)]
struct RegisterParams {
    student: NewStudent,
    #[serde(default)]
    guardians: Vec<NewGuardian>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportParams {
    path: String,
    #[serde(flatten)]
    filter: StudentFilter,
}

fn link_ids(req: &Request) -> Result<(i64, i64), serde_json::Value> {
    Ok((id_param(req, "studentId")?, id_param(req, "guardianId")?))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: StudentFilter = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = StudentService::new(&state.db);
    respond(req, svc.list(&filter).map(|students| json!({ "students": students })))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, StudentService::new(&state.db).get(id))
}

fn handle_students_by_academy_id(state: &mut AppState, req: &Request) -> serde_json::Value {
    let academy_id = match str_param(req, "academyId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, StudentService::new(&state.db).get_by_academy_id(&academy_id))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let input: NewStudent = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, StudentService::new(&state.db).create(input))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (id, patch): (i64, StudentPatch) = match patch_params(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, StudentService::new(&state.db).update(id, patch))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, StudentService::new(&state.db).delete(id))
}

fn handle_students_link(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (student_id, guardian_id) = match link_ids(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = StudentService::new(&state.db);
    respond(
        req,
        svc.link_guardian(student_id, guardian_id)
            .map(|created| json!({ "linked": created })),
    )
}

fn handle_students_unlink(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (student_id, guardian_id) = match link_ids(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = StudentService::new(&state.db);
    respond(
        req,
        svc.unlink_guardian(student_id, guardian_id)
            .map(|removed| json!({ "unlinked": removed })),
    )
}

fn handle_students_guardians(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = StudentService::new(&state.db);
    respond(req, svc.guardians(id).map(|g| json!({ "guardians": g })))
}

fn handle_students_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p: RegisterParams = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, StudentService::new(&state.db).register(p.student, p.guardians))
}

fn handle_students_statistics(state: &mut AppState, req: &Request) -> serde_json::Value {
    let today = chrono::Local::now().date_naive();
    respond(req, StudentService::new(&state.db).statistics(today))
}

fn handle_students_recent(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = StudentService::new(&state.db);
    respond(
        req,
        svc.recent(limit_param(req, 5))
            .map(|students| json!({ "students": students })),
    )
}

fn handle_students_profile_image(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let path = match path_param(req, "path") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = StudentService::new(&state.db);
    respond(req, svc.set_profile_image(id, &path, &state.config))
}

fn handle_students_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match path_param(req, "path") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = StudentService::new(&state.db);
    respond(req, svc.import_file(&path, &state.config))
}

fn handle_students_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p: ExportParams = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if p.path.trim().is_empty() {
        return err(&req.id, "bad_params", "path must not be empty", None);
    }
    let svc = StudentService::new(&state.db);
    respond(
        req,
        svc.export_file(std::path::Path::new(&p.path), &p.filter)
            .map(|rows| json!({ "path": p.path, "rowsExported": rows })),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.getByAcademyId" => Some(handle_students_by_academy_id(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.link" => Some(handle_students_link(state, req)),
        "students.unlink" => Some(handle_students_unlink(state, req)),
        "students.guardians" => Some(handle_students_guardians(state, req)),
        "students.register" => Some(handle_students_register(state, req)),
        "students.statistics" => Some(handle_students_statistics(state, req)),
        "students.recent" => Some(handle_students_recent(state, req)),
        "students.profileImage" => Some(handle_students_profile_image(state, req)),
        "students.import" => Some(handle_students_import(state, req)),
        "students.export" => Some(handle_students_export(state, req)),
        _ => None,
    }
}
