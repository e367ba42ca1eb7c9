use anyhow::Context as _;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

use crate::config::{Config, DatabaseLocation};
use crate::error::AppResult;
use crate::models::Role;
use crate::security;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const DEFAULT_SUBJECTS: &[(&str, &str)] = &[
    ("수학", "수학 과목"),
    ("영어", "영어 과목"),
    ("국어", "국어 과목"),
    ("과학", "과학 과목"),
    ("사회", "사회 과목"),
    ("코딩", "프로그래밍 과목"),
];

pub fn open_db(config: &Config) -> anyhow::Result<Connection> {
    let conn = match config.database_location()? {
        DatabaseLocation::Memory => Connection::open_in_memory()?,
        DatabaseLocation::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create directory {}", parent.to_string_lossy())
                    })?;
                }
            }
            Connection::open(&path)
                .with_context(|| format!("failed to open database {}", path.to_string_lossy()))?
        }
    };
    create_schema(&conn)?;
    Ok(conn)
}

/// Empty schema without seed data.
#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

pub fn create_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT NOT NULL,
            phone TEXT,
            role TEXT NOT NULL DEFAULT 'staff',
            is_active INTEGER NOT NULL DEFAULT 1,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            academy_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            gender TEXT,
            birth_date TEXT,
            phone TEXT,
            email TEXT,
            postal_code TEXT,
            road_address TEXT,
            detail_address TEXT,
            extra_address TEXT,
            school_name TEXT,
            grade INTEGER,
            class_name TEXT,
            enrollment_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            emergency_contact_name TEXT,
            emergency_contact_relationship TEXT,
            emergency_contact_phone TEXT,
            allergies TEXT,
            medications TEXT,
            special_needs TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    // Older databases predate profile images.
    ensure_students_profile_image(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_status ON students(status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS guardians(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT,
            postal_code TEXT,
            road_address TEXT,
            detail_address TEXT,
            extra_address TEXT,
            occupation TEXT,
            workplace TEXT,
            work_phone TEXT,
            emergency_contact_name TEXT,
            emergency_contact_relationship TEXT,
            emergency_contact_phone TEXT,
            is_primary INTEGER NOT NULL DEFAULT 0,
            sms_enabled INTEGER NOT NULL DEFAULT 1,
            email_enabled INTEGER NOT NULL DEFAULT 1,
            kakao_enabled INTEGER NOT NULL DEFAULT 0,
            phone_enabled INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_guardians_phone ON guardians(phone)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_guardians(
            student_id INTEGER NOT NULL,
            guardian_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY(student_id, guardian_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(guardian_id) REFERENCES guardians(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_guardians_guardian ON student_guardians(guardian_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            level TEXT,
            capacity INTEGER NOT NULL CHECK(capacity >= 1),
            duration_minutes INTEGER,
            schedule_info TEXT,
            textbook TEXT,
            curriculum TEXT,
            start_date TEXT,
            end_date TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_subject ON courses(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            enrollment_date TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    ensure_enrollments_notes(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_id, status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id, status)",
        [],
    )?;
    // At most one active enrollment per (student, course); dropped rows stay as history.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_active_pair
         ON enrollments(student_id, course_id) WHERE status = 'active'",
        [],
    )?;

    Ok(())
}

/// Bootstrap rows: the default admin account and the stock subjects.
pub fn seed_defaults(conn: &Connection, config: &Config) -> anyhow::Result<()> {
    let now = now();
    let admin: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE username = ?",
            [DEFAULT_ADMIN_USERNAME],
            |r| r.get(0),
        )
        .optional()?;
    if admin.is_none() {
        let hash = security::hash_password(DEFAULT_ADMIN_PASSWORD, config.bcrypt_rounds)
            .context("failed to hash default admin password")?;
        conn.execute(
            "INSERT INTO users(username, email, password_hash, name, phone, role, is_active, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, 1, ?, ?)",
            (
                DEFAULT_ADMIN_USERNAME,
                "admin@academy.com",
                &hash,
                "시스템 관리자",
                "010-0000-0000",
                Role::Admin,
                &now,
                &now,
            ),
        )?;
        log::info!("created default admin account");
    }

    for (name, description) in DEFAULT_SUBJECTS {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subjects(name, description, is_active, created_at, updated_at)
             VALUES(?, ?, 1, ?, ?)",
            (name, description, &now, &now),
        )?;
        if inserted > 0 {
            log::debug!("seeded subject {name}");
        }
    }
    Ok(())
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Builds `UPDATE <table> SET a = ?, b = ? WHERE id = ?` from whichever
/// fields a patch carries.
#[derive(Default)]
pub struct SetClause {
    parts: Vec<String>,
    values: Vec<Box<dyn ToSql>>,
}

impl SetClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: ToSql + 'static>(&mut self, column: &str, value: T) {
        self.parts.push(format!("{column} = ?"));
        self.values.push(Box::new(value));
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns the number of rows touched (0 when the id does not exist).
    pub fn execute(mut self, conn: &Connection, table: &str, id: i64) -> AppResult<usize> {
        self.set("updated_at", now());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", table, self.parts.join(", "));
        self.values.push(Box::new(id));
        let n = conn.execute(&sql, params_from_iter(self.values.iter()))?;
        Ok(n)
    }
}

pub fn row_exists(conn: &Connection, table: &str, id: i64) -> AppResult<bool> {
    let sql = format!("SELECT 1 FROM {table} WHERE id = ?");
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

fn ensure_students_profile_image(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "profile_image_path")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN profile_image_path TEXT", [])?;
    Ok(())
}

fn ensure_enrollments_notes(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "notes")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN notes TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            bcrypt_rounds: 4,
            database_url: ":memory:".into(),
            ..Config::default()
        }
    }

    #[test]
    fn schema_is_idempotent_and_seeds_once() {
        let cfg = test_config();
        let conn = open_db(&cfg).expect("open");
        seed_defaults(&conn, &cfg).expect("seed");
        create_schema(&conn).expect("schema again");
        seed_defaults(&conn, &cfg).expect("seed again");

        let users: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .expect("count users");
        let subjects: i64 = conn
            .query_row("SELECT COUNT(*) FROM subjects", [], |r| r.get(0))
            .expect("count subjects");
        assert_eq!(users, 1);
        assert_eq!(subjects, DEFAULT_SUBJECTS.len() as i64);
        assert!(table_has_column(&conn, "students", "profile_image_path").expect("pragma"));
        assert!(table_has_column(&conn, "enrollments", "notes").expect("pragma"));
    }
}
