use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::student::STUDENT_COLUMNS;
use crate::models::{Guardian, Student};
use crate::services::course::{CourseService, CourseStatistics};
use crate::services::guardian::GuardianService;
use crate::services::student::StudentService;

const RECENT_LIMIT: i64 = 5;
const POPULAR_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_students: i64,
    pub active_students: i64,
    pub total_guardians: i64,
    pub new_students_last_30_days: i64,
    pub average_guardians_per_student: f64,
    pub birthdays_today: Vec<Student>,
    pub recent_students: Vec<Student>,
    pub recent_guardians: Vec<Guardian>,
    pub status_distribution: BTreeMap<String, i64>,
    pub courses: CourseStatistics,
}

pub fn summary(conn: &Connection, today: NaiveDate) -> AppResult<DashboardSummary> {
    let students = StudentService::new(conn);
    let stats = students.statistics(today)?;

    let total_guardians: i64 = conn.query_row("SELECT COUNT(*) FROM guardians", [], |r| r.get(0))?;
    let since = today - Duration::days(30);
    let new_students: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE enrollment_date >= ?",
        [since],
        |r| r.get(0),
    )?;
    let links: i64 =
        conn.query_row("SELECT COUNT(*) FROM student_guardians", [], |r| r.get(0))?;
    let average = if stats.total_students > 0 {
        let raw = links as f64 / stats.total_students as f64;
        (raw * 100.0).round() / 100.0
    } else {
        0.0
    };

    Ok(DashboardSummary {
        total_students: stats.total_students,
        active_students: stats.active_students,
        total_guardians,
        new_students_last_30_days: new_students,
        average_guardians_per_student: average,
        birthdays_today: birthdays_on(conn, today)?,
        recent_students: students.recent(RECENT_LIMIT)?,
        recent_guardians: GuardianService::new(conn).recent(RECENT_LIMIT)?,
        status_distribution: stats.status_distribution,
        courses: CourseService::new(conn).statistics(POPULAR_LIMIT)?,
    })
}

/// Active students whose birth month and day match `today`.
fn birthdays_on(conn: &Connection, today: NaiveDate) -> AppResult<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students
         WHERE status = 'active' AND strftime('%m-%d', birth_date) = ?
         ORDER BY name, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([today.format("%m-%d").to_string()], Student::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{NewGuardian, NewStudent, RelationshipType};

    #[test]
    fn summary_counts_recent_activity_and_birthdays() {
        let conn = db::open_in_memory().expect("db");
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("date");
        let students = StudentService::new(&conn);
        let old = students
            .create(NewStudent {
                name: "옛학생".into(),
                enrollment_date: NaiveDate::from_ymd_opt(2023, 1, 1),
                birth_date: NaiveDate::from_ymd_opt(2012, 6, 15),
                ..NewStudent::default()
            })
            .expect("old");
        students
            .create(NewStudent {
                name: "새학생".into(),
                enrollment_date: NaiveDate::from_ymd_opt(2024, 6, 1),
                ..NewStudent::default()
            })
            .expect("new");
        let g = GuardianService::new(&conn)
            .create(NewGuardian::new("엄마", RelationshipType::Mother, "010-1"))
            .expect("guardian");
        students.link_guardian(old.id, g.id).expect("link");

        let s = summary(&conn, today).expect("summary");
        assert_eq!(s.total_students, 2);
        assert_eq!(s.total_guardians, 1);
        assert_eq!(s.new_students_last_30_days, 1);
        assert_eq!(s.average_guardians_per_student, 0.5);
        assert_eq!(s.birthdays_today.len(), 1);
        assert_eq!(s.birthdays_today[0].id, old.id);
        assert_eq!(s.recent_students.len(), 2);
        assert_eq!(s.recent_guardians.len(), 1);
        assert_eq!(s.status_distribution["active"], 2);
    }
}
