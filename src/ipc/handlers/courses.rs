use serde_json::json;

use crate::ipc::helpers::{id_param, limit_param, params, patch_params, respond};
use crate::ipc::types::{AppState, Request};
use crate::models::{CoursePatch, NewCourse};
use crate::services::course::{CourseFilter, CourseService};

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filter: CourseFilter = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(req, svc.list_courses(&filter).map(|c| json!({ "courses": c })))
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).get_course(id))
}

fn handle_courses_detail(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).course_detail(id))
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let input: NewCourse = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).create_course(input))
}

fn handle_courses_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (id, patch): (i64, CoursePatch) = match patch_params(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).update_course(id, patch))
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(req, svc.delete_course(id).map(|()| json!({ "deleted": id })))
}

/// Courses a student could still join.
fn handle_courses_available(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match id_param(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(
        req,
        svc.available_courses(student_id)
            .map(|c| json!({ "courses": c })),
    )
}

fn handle_courses_popular(state: &mut AppState, req: &Request) -> serde_json::Value {
    let svc = CourseService::new(&state.db);
    respond(
        req,
        svc.popular(limit_param(req, 5))
            .map(|c| json!({ "courses": c })),
    )
}

fn handle_courses_statistics(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        req,
        CourseService::new(&state.db).statistics(limit_param(req, 5)),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "courses.detail" => Some(handle_courses_detail(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.update" => Some(handle_courses_update(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        "courses.available" => Some(handle_courses_available(state, req)),
        "courses.popular" => Some(handle_courses_popular(state, req)),
        "courses.statistics" => Some(handle_courses_statistics(state, req)),
        _ => None,
    }
}
