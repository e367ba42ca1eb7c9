use serde::Deserialize;
use serde_json::json;

use crate::ipc::error::err;
use crate::ipc::helpers::{id_param, params, patch_params, path_param, respond, str_param};
use crate::ipc::types::{AppState, Request};
use crate::models::{GuardianPatch, NewGuardian};
use crate::services::guardian::{GuardianFilter, GuardianService};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeParams {
    primary_id: i64,
    duplicate_ids: Vec<i64>,
}

#[derive(Deserialize)]
struct ExportParams {
    path: String,
    #[serde(flatten)]
    filter: GuardianFilter,
}

fn link_ids(req: &Request) -> Result<(i64, i64), serde_json::Value> {
    Ok((id_param(req, "guardianId")?, id_param(req, "studentId")?))
}

fn handle_guardians_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: GuardianFilter = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = GuardianService::new(&state.db);
    respond(req, svc.list(&filter).map(|g| json!({ "guardians": g })))
}

fn handle_guardians_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, GuardianService::new(&state.db).get(id))
}

fn handle_guardians_find_by_phone(state: &mut AppState, req: &Request) -> serde_json::Value {
    let phone = match str_param(req, "phone") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = GuardianService::new(&state.db);
    respond(req, svc.get_by_phone(&phone).map(|g| json!({ "guardians": g })))
}

fn handle_guardians_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let input: NewGuardian = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, GuardianService::new(&state.db).create(input))
}

fn handle_guardians_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (id, patch): (i64, GuardianPatch) = match patch_params(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, GuardianService::new(&state.db).update(id, patch))
}

fn handle_guardians_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = GuardianService::new(&state.db);
    respond(req, svc.delete(id).map(|()| json!({ "deleted": id })))
}

fn handle_guardians_link(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (guardian_id, student_id) = match link_ids(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = GuardianService::new(&state.db);
    respond(
        req,
        svc.link_student(guardian_id, student_id)
            .map(|created| json!({ "linked": created })),
    )
}

fn handle_guardians_unlink(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (guardian_id, student_id) = match link_ids(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = GuardianService::new(&state.db);
    respond(
        req,
        svc.unlink_student(guardian_id, student_id)
            .map(|removed| json!({ "unlinked": removed })),
    )
}

fn handle_guardians_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "guardianId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = GuardianService::new(&state.db);
    respond(req, svc.students(id).map(|s| json!({ "students": s })))
}

fn handle_guardians_duplicates(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = GuardianService::new(&state.db);
    respond(req, svc.find_duplicates().map(|groups| json!({ "groups": groups })))
}

fn handle_guardians_merge(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p: MergeParams = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        req,
        GuardianService::new(&state.db).merge(p.primary_id, &p.duplicate_ids),
    )
}

fn handle_guardians_statistics(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, GuardianService::new(&state.db).statistics())
}

fn handle_guardians_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match path_param(req, "path") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = GuardianService::new(&state.db);
    respond(req, svc.import_file(&path, &state.config))
}

fn handle_guardians_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p: ExportParams = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if p.path.trim().is_empty() {
        return err(&req.id, "bad_params", "path must not be empty", None);
    }
    let svc = GuardianService::new(&state.db);
    respond(
        req,
        svc.export_file(std::path::Path::new(&p.path), &p.filter)
            .map(|rows| json!({ "path": p.path, "rowsExported": rows })),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "guardians.list" => Some(handle_guardians_list(state, req)),
        "guardians.get" => Some(handle_guardians_get(state, req)),
        "guardians.findByPhone" => Some(handle_guardians_find_by_phone(state, req)),
        "guardians.create" => Some(handle_guardians_create(state, req)),
        "guardians.update" => Some(handle_guardians_update(state, req)),
        "guardians.delete" => Some(handle_guardians_delete(state, req)),
        "guardians.link" => Some(handle_guardians_link(state, req)),
        "guardians.unlink" => Some(handle_guardians_unlink(state, req)),
        "guardians.students" => Some(handle_guardians_students(state, req)),
        "guardians.duplicates" => Some(handle_guardians_duplicates(state, req)),
        "guardians.merge" => Some(handle_guardians_merge(state, req)),
        "guardians.statistics" => Some(handle_guardians_statistics(state, req)),
        "guardians.import" => Some(handle_guardians_import(state, req)),
        "guardians.export" => Some(handle_guardians_export(state, req)),
        _ => None,
    }
}
