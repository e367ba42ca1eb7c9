//! The student <-> guardian join table. Both record services go through here.

use rusqlite::Connection;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::guardian::GUARDIAN_COLUMNS;
use crate::models::student::STUDENT_COLUMNS;
use crate::models::{Guardian, Student};

fn ensure_pair_exists(conn: &Connection, student_id: i64, guardian_id: i64) -> AppResult<()> {
    if !db::row_exists(conn, "students", student_id)? {
        return Err(AppError::not_found(format!("student {student_id} not found")));
    }
    if !db::row_exists(conn, "guardians", guardian_id)? {
        return Err(AppError::not_found(format!(
            "guardian {guardian_id} not found"
        )));
    }
    Ok(())
}

/// Idempotent. Returns whether a new row was written.
pub fn link(conn: &Connection, student_id: i64, guardian_id: i64) -> AppResult<bool> {
    ensure_pair_exists(conn, student_id, guardian_id)?;
    let n = conn.execute(
        "INSERT OR IGNORE INTO student_guardians(student_id, guardian_id, created_at)
         VALUES(?, ?, ?)",
        (student_id, guardian_id, db::now()),
    )?;
    if n > 0 {
        log::info!("linked guardian {guardian_id} to student {student_id}");
    }
    Ok(n > 0)
}

/// Returns whether a link existed and was removed.
pub fn unlink(conn: &Connection, student_id: i64, guardian_id: i64) -> AppResult<bool> {
    ensure_pair_exists(conn, student_id, guardian_id)?;
    let n = conn.execute(
        "DELETE FROM student_guardians WHERE student_id = ? AND guardian_id = ?",
        (student_id, guardian_id),
    )?;
    if n > 0 {
        log::info!("unlinked guardian {guardian_id} from student {student_id}");
    }
    Ok(n > 0)
}

pub fn link_count_for_guardian(conn: &Connection, guardian_id: i64) -> AppResult<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM student_guardians WHERE guardian_id = ?",
        [guardian_id],
        |r| r.get(0),
    )?;
    Ok(n)
}

pub fn guardians_of(conn: &Connection, student_id: i64) -> AppResult<Vec<Guardian>> {
    let sql = format!(
        "SELECT {GUARDIAN_COLUMNS} FROM guardians
         WHERE id IN (SELECT guardian_id FROM student_guardians WHERE student_id = ?)
         ORDER BY is_primary DESC, name, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], Guardian::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn students_of(conn: &Connection, guardian_id: i64) -> AppResult<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students
         WHERE id IN (SELECT student_id FROM student_guardians WHERE guardian_id = ?)
         ORDER BY name, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([guardian_id], Student::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
