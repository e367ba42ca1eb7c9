mod config;
mod db;
mod error;
mod exchange;
mod ipc;
mod models;
mod security;
mod services;

use std::io::{self, BufRead, Write};

use anyhow::Context as _;

use crate::config::Config;

fn init_logging(config: &Config) {
    let default_level = if config.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_logging(&config);

    config
        .ensure_upload_directory()
        .with_context(|| format!("failed to create {}", config.upload_dir.to_string_lossy()))?;
    let conn = db::open_db(&config).context("failed to open database")?;
    db::seed_defaults(&conn, &config).context("failed to seed defaults")?;
    log::info!(
        "{} {} ready on {}",
        config.app_name,
        config.app_version,
        config.database_url
    );

    if config.uses_default_secrets() {
        log::warn!("SECRET_KEY or JWT_SECRET_KEY is unset; using the built-in placeholder");
    }
    log::debug!(
        "smtp {}:{}, providers configured: {:?}",
        config.email.smtp_server,
        config.email.smtp_port,
        config.configured_providers()
    );

    let mut state = ipc::AppState::new(config, conn);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("dropping malformed request: {e}");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    log::info!("stdin closed, shutting down");
    Ok(())
}
