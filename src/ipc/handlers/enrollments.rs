use serde::Deserialize;
use serde_json::json;

use crate::ipc::helpers::{bool_param, id_param, params, respond};
use crate::ipc::types::{AppState, Request};
use crate::models::EnrollmentOverrides;
use crate::services::course::CourseService;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollParams {
    student_id: i64,
    course_id: i64,
    #[serde(flatten)]
    overrides: EnrollmentOverrides,
}

fn handle_enroll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p: EnrollParams = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(req, svc.enroll(p.student_id, p.course_id, p.overrides))
}

fn handle_unenroll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "enrollmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).unenroll(id))
}

fn handle_enrollments_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(req, CourseService::new(&state.db).get_enrollment(id))
}

fn handle_enrollments_by_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(
        req,
        svc.enrollments_for_student(id, bool_param(req, "includeInactive"))
            .map(|e| json!({ "enrollments": e })),
    )
}

fn handle_enrollments_by_course(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(
        req,
        svc.enrollments_for_course(id, bool_param(req, "includeInactive"))
            .map(|e| json!({ "enrollments": e })),
    )
}

fn handle_enrollments_active_count(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(
        req,
        svc.active_count(id)
            .map(|n| json!({ "courseId": id, "activeCount": n })),
    )
}

/// Active students not yet in the course.
fn handle_enrollments_available_students(
    state: &mut AppState,
    req: &Request,
) -> serde_json::Value {
    let id = match id_param(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = CourseService::new(&state.db);
    respond(
        req,
        svc.available_students(id)
            .map(|s| json!({ "students": s })),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.enroll" => Some(handle_enroll(state, req)),
        "enrollments.unenroll" => Some(handle_unenroll(state, req)),
        "enrollments.get" => Some(handle_enrollments_get(state, req)),
        "enrollments.byStudent" => Some(handle_enrollments_by_student(state, req)),
        "enrollments.byCourse" => Some(handle_enrollments_by_course(state, req)),
        "enrollments.activeCount" => Some(handle_enrollments_active_count(state, req)),
        "enrollments.availableStudents" => {
            Some(handle_enrollments_available_students(state, req))
        }
        _ => None,
    }
}
