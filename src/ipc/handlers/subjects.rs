use serde_json::json;

use crate::ipc::helpers::{bool_param, id_param, params, patch_params, respond};
use crate::ipc::types::{AppState, Request};
use crate::models::{NewSubject, SubjectPatch};
use crate::services::course::CourseService;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = CourseService::new(&state.db);
    respond(
        req,
        svc.list_subjects(bool_param(req, "includeInactive"))
            .map(|subjects| json!({ "subjects": subjects })),
    )
}

fn handle_subjects_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).get_subject(id))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let input: NewSubject = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).create_subject(input))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (id, patch): (i64, SubjectPatch) = match patch_params(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).update_subject(id, patch))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).delete_subject(id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.get" => Some(handle_subjects_get(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
