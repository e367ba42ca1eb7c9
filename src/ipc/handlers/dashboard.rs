use crate::ipc::helpers::respond;
use crate::ipc::types::{AppState, Request};
use crate::services::dashboard;

fn handle_dashboard_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let today = chrono::Local::now().date_naive();
    respond(req, dashboard::summary(&state.db, today))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(handle_dashboard_summary(state, req)),
        _ => None,
    }
}
