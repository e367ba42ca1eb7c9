use super::handlers;
use super::types::{AppState, Request};
use crate::error::AppError;
use crate::ipc::error::{app_err, err};
use crate::models::Role;

/// Who may call a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Open,
    Role(Role),
}

fn gate(method: &str) -> Gate {
    match method {
        "health" | "auth.login" | "auth.verify" => Gate::Open,
        m if m.starts_with("users.") => Gate::Role(Role::Admin),
        "subjects.create" | "subjects.update" | "subjects.delete" | "courses.create"
        | "courses.update" | "courses.delete" => Gate::Role(Role::Teacher),
        "students.delete" | "students.import" | "students.export" | "guardians.delete"
        | "guardians.merge" | "guardians.import" | "guardians.export" => {
            Gate::Role(Role::Counselor)
        }
        _ => Gate::Role(Role::Staff),
    }
}

fn check_gate(state: &AppState, req: &Request) -> Result<(), AppError> {
    let Gate::Role(required) = gate(&req.method) else {
        return Ok(());
    };
    let Some(user) = state.session.as_ref() else {
        return Err(AppError::Unauthorized);
    };
    if !user.role.satisfies(required) {
        log::warn!(
            "{} ({}) denied {}: needs {}",
            user.username,
            user.role,
            req.method,
            required
        );
        return Err(AppError::Forbidden { required });
    }
    Ok(())
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    log::debug!("request {} {}", req.id, req.method);
    if let Err(e) = check_gate(state, &req) {
        return app_err(&req.id, &e);
    }

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::users::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::guardians::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::subjects::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::courses::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::enrollments::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::dashboard::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_follow_the_role_ladder() {
        assert_eq!(gate("health"), Gate::Open);
        assert_eq!(gate("auth.login"), Gate::Open);
        assert_eq!(gate("auth.logout"), Gate::Role(Role::Staff));
        assert_eq!(gate("students.list"), Gate::Role(Role::Staff));
        assert_eq!(gate("students.delete"), Gate::Role(Role::Counselor));
        assert_eq!(gate("guardians.merge"), Gate::Role(Role::Counselor));
        assert_eq!(gate("courses.create"), Gate::Role(Role::Teacher));
        assert_eq!(gate("enrollments.enroll"), Gate::Role(Role::Staff));
        assert_eq!(gate("users.create"), Gate::Role(Role::Admin));
    }
}
