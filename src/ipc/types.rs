use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::models::SessionUser;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub db: Connection,
    /// Whoever logged in on this channel; cleared by `auth.logout`.
    pub session: Option<SessionUser>,
}

impl AppState {
    pub fn new(config: Config, db: Connection) -> Self {
        AppState {
            config,
            db,
            session: None,
        }
    }
}
