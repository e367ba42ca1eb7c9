use serde_json::json;

use crate::ipc::helpers::{bool_param, id_param, params, patch_params, respond};
use crate::ipc::types::{AppState, Request};
use crate::models::{NewUser, UserPatch};
use crate::services::auth::AuthService;

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let auth = AuthService::new(&state.db, &state.config);
    respond(
        req,
        auth.list(bool_param(req, "includeInactive"))
            .map(|users| json!({ "users": users })),
    )
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let input: NewUser = match params(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let auth = AuthService::new(&state.db, &state.config);
    respond(req, auth.create(input))
}

fn handle_users_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (id, patch): (i64, UserPatch) = match patch_params(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let auth = AuthService::new(&state.db, &state.config);
    respond(req, auth.update(id, patch))
}

fn handle_users_deactivate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match id_param(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let auth = AuthService::new(&state.db, &state.config);
    respond(req, auth.deactivate(id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_users_list(state, req)),
        "users.create" => Some(handle_users_create(state, req)),
        "users.update" => Some(handle_users_update(state, req)),
        "users.deactivate" => Some(handle_users_deactivate(state, req)),
        _ => None,
    }
}
