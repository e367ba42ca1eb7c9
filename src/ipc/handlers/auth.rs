use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::ipc::error::{app_err, err, ok};
use crate::ipc::helpers::{params, respond, str_param};
use crate::ipc::types::{AppState, Request};
use crate::services::auth::AuthService;

#[derive(Deserialize)]
struct LoginParams {
    login: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordParams {
    old_password: String,
    new_password: String,
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p: LoginParams = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let auth = AuthService::new(&state.db, &state.config);
    match auth.login(&p.login, &p.password) {
        Ok(Some(session)) => {
            state.session = Some(session.user.clone());
            ok(&req.id, json!({ "user": session.user, "token": session.token }))
        }
        Ok(None) => err(&req.id, "auth_failed", "invalid username or password", None),
        Err(e) => app_err(&req.id, &e),
    }
}

/// Resumes a session from a previously issued token.
fn handle_verify(state: &mut AppState, req: &Request) -> serde_json::Value {
    let token = match str_param(req, "token") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let auth = AuthService::new(&state.db, &state.config);
    match auth.verify(&token) {
        Ok(user) => {
            if user.is_some() {
                state.session = user.clone();
            }
            ok(&req.id, json!({ "user": user }))
        }
        Err(e) => app_err(&req.id, &e),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(user) = state.session.take() {
        log::info!("user {} logged out", user.username);
    }
    ok(&req.id, json!({ "ok": true }))
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "user": state.session }))
}

fn handle_change_password(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p: ChangePasswordParams = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(user) = state.session.as_ref() else {
        return app_err(&req.id, &AppError::Unauthorized);
    };
    let auth = AuthService::new(&state.db, &state.config);
    respond(
        req,
        auth.change_password(user.id, &p.old_password, &p.new_password)
            .map(|()| json!({ "ok": true })),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.verify" => Some(handle_verify(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        "auth.changePassword" => Some(handle_change_password(state, req)),
        _ => None,
    }
}
