//! Login, token checks, and administration of staff accounts.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::config::Config;
use crate::db::{self, SetClause};
use crate::error::{AppError, AppResult, Context};
use crate::models::user::USER_COLUMNS;
use crate::models::{clean, require_text, NewUser, SessionUser, User, UserPatch};
use crate::security;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    pub token: String,
}

pub struct AuthService<'a> {
    conn: &'a Connection,
    config: &'a Config,
}

impl<'a> AuthService<'a> {
    pub fn new(conn: &'a Connection, config: &'a Config) -> Self {
        AuthService { conn, config }
    }

    /// `None` for an unknown login, an inactive account, or a wrong password.
    pub fn login(&self, login: &str, password: &str) -> AppResult<Option<Session>> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Ok(None);
        }
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?1");
        let user = self
            .conn
            .query_row(&sql, [login], User::from_row)
            .optional()?;
        let Some(user) = user else {
            log::warn!("login refused: unknown user {login}");
            return Ok(None);
        };
        if !user.is_active {
            log::warn!("login refused: user {} is deactivated", user.id);
            return Ok(None);
        }
        if !security::verify_password(password, &user.password_hash) {
            log::warn!("login refused: wrong password for user {}", user.id);
            return Ok(None);
        }
        let mut set = SetClause::new();
        set.set("last_login", db::now());
        set.execute(self.conn, "users", user.id)
            .during("login")?;
        let token = security::issue_token(user.id, &user.username, self.config)?;
        log::info!("user {} logged in", user.username);
        Ok(Some(Session {
            user: SessionUser::from(&user),
            token,
        }))
    }

    /// Resolves a token back to an active user.
    pub fn verify(&self, token: &str) -> AppResult<Option<SessionUser>> {
        let Some(claims) = security::verify_token(token, self.config) else {
            return Ok(None);
        };
        let user = self.get(claims.sub)?;
        Ok(user
            .filter(|u| u.is_active && u.username == claims.username)
            .map(|u| SessionUser::from(&u)))
    }

    pub fn get(&self, id: i64) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = self.conn.query_row(&sql, [id], User::from_row).optional()?;
        Ok(user)
    }

    pub fn list(&self, include_inactive: bool) -> AppResult<Vec<User>> {
        let sql = if include_inactive {
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY username")
        } else {
            format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY username")
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], User::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn create(&self, input: NewUser) -> AppResult<User> {
        let username = require_text(&input.username, "username")?;
        let email = require_text(&input.email, "email")?;
        let name = require_text(&input.name, "name")?;
        check_password(&input.password)?;
        self.ensure_unique("username", &username, None)?;
        self.ensure_unique("email", &email, None)?;

        let hash = security::hash_password(&input.password, self.config.bcrypt_rounds)?;
        let now = db::now();
        self.conn
            .execute(
                "INSERT INTO users(username, email, password_hash, name, phone, role, is_active, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, 1, ?, ?)",
                rusqlite::params![
                    username,
                    email,
                    hash,
                    name,
                    clean(input.phone),
                    input.role,
                    now,
                    now
                ],
            )
            .during("user create")?;
        let id = self.conn.last_insert_rowid();
        log::info!("created user {id} ({username}, {})", input.role);
        self.require(id)
    }

    pub fn update(&self, id: i64, patch: UserPatch) -> AppResult<User> {
        let mut set = SetClause::new();
        if let Some(email) = patch.email {
            let email = require_text(&email, "email")?;
            self.ensure_unique("email", &email, Some(id))?;
            set.set("email", email);
        }
        if let Some(name) = patch.name {
            set.set("name", require_text(&name, "name")?);
        }
        if patch.phone.is_some() {
            set.set("phone", clean(patch.phone));
        }
        if let Some(role) = patch.role {
            set.set("role", role);
        }
        if set.is_empty() {
            return self.require(id);
        }
        let n = set.execute(self.conn, "users", id).during("user update")?;
        if n == 0 {
            return Err(AppError::not_found(format!("user {id} not found")));
        }
        log::info!("updated user {id}");
        self.require(id)
    }

    /// Accounts are never removed; a deactivated one can no longer log in.
    pub fn deactivate(&self, id: i64) -> AppResult<User> {
        let mut set = SetClause::new();
        set.set("is_active", false);
        let n = set
            .execute(self.conn, "users", id)
            .during("user deactivate")?;
        if n == 0 {
            return Err(AppError::not_found(format!("user {id} not found")));
        }
        log::info!("deactivated user {id}");
        self.require(id)
    }

    pub fn change_password(&self, id: i64, old: &str, new: &str) -> AppResult<()> {
        let user = self.require(id)?;
        if !security::verify_password(old, &user.password_hash) {
            log::warn!("password change refused for user {id}");
            return Err(AppError::validation("current password does not match"));
        }
        check_password(new)?;
        let hash = security::hash_password(new, self.config.bcrypt_rounds)?;
        let mut set = SetClause::new();
        set.set("password_hash", hash);
        set.execute(self.conn, "users", id)
            .during("password change")?;
        log::info!("password changed for user {id}");
        Ok(())
    }

    fn ensure_unique(&self, column: &str, value: &str, except: Option<i64>) -> AppResult<()> {
        let sql = format!("SELECT id FROM users WHERE {column} = ?");
        let taken: Option<i64> = self
            .conn
            .query_row(&sql, [value], |r| r.get(0))
            .optional()?;
        match taken {
            Some(other) if Some(other) != except => {
                Err(AppError::rule(format!("{column} already in use: {value}")))
            }
            _ => Ok(()),
        }
    }

    fn require(&self, id: i64) -> AppResult<User> {
        self.get(id)?
            .ok_or_else(|| AppError::not_found(format!("user {id} not found")))
    }
}

fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
