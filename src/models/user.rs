use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

labeled_enum! {
    /// Declared lowest to highest so the derived ordering is the permission ladder.
    Role, "role" {
        Staff => ("staff", "직원"),
        Counselor => ("counselor", "상담사"),
        Teacher => ("teacher", "강사"),
        Admin => ("admin", "관리자"),
    }
}

impl Role {
    pub fn rank(self) -> u8 {
        match self {
            Role::Staff => 1,
            Role::Counselor => 2,
            Role::Teacher => 3,
            Role::Admin => 4,
        }
    }

    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, password_hash, name, phone, role, is_active, last_login, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            name: row.get("name")?,
            phone: row.get("phone")?,
            role: row.get("role")?,
            is_active: row.get("is_active")?,
            last_login: row.get("last_login")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// The identity handed to the presentation layer after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        SessionUser {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Staff
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ladder_is_ordered() {
        assert!(Role::Admin.satisfies(Role::Teacher));
        assert!(Role::Teacher.satisfies(Role::Counselor));
        assert!(Role::Counselor.satisfies(Role::Staff));
        assert!(!Role::Staff.satisfies(Role::Counselor));
        assert!(!Role::Teacher.satisfies(Role::Admin));
        assert!(Role::Staff < Role::Admin);
    }
}
