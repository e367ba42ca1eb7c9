use chrono::{Local, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::{self, SetClause};
use crate::error::{AppError, AppResult, Context};
use crate::models::course::{COURSE_SELECT, ENROLLMENT_SELECT};
use crate::models::student::STUDENT_COLUMNS;
use crate::models::{
    clean, require_text, Course, CourseDetail, CoursePatch, CourseStatus, Enrollment,
    EnrollmentOverrides, EnrollmentStatus, NewCourse, NewSubject, Student, Subject,
    SubjectPatch,
};
use crate::services::like_pattern;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseFilter {
    pub subject_id: Option<i64>,
    pub status: Option<CourseStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularCourse {
    pub course_id: i64,
    pub course_name: String,
    pub subject_name: String,
    pub active_enrollments: i64,
    pub capacity: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStatistics {
    pub total_courses: i64,
    pub active_courses: i64,
    pub total_subjects: i64,
    pub total_enrollments: i64,
    pub popular_courses: Vec<PopularCourse>,
}

pub struct CourseService<'a> {
    conn: &'a Connection,
}

impl<'a> CourseService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        CourseService { conn }
    }

    // --- subjects ---

    pub fn create_subject(&self, input: NewSubject) -> AppResult<Subject> {
        let name = require_text(&input.name, "subject name")?;
        self.ensure_subject_name_free(&name, None)?;
        let now = db::now();
        self.conn
            .execute(
                "INSERT INTO subjects(name, description, is_active, created_at, updated_at)
                 VALUES(?, ?, 1, ?, ?)",
                (&name, clean(input.description), now, now),
            )
            .during("subject create")?;
        let id = self.conn.last_insert_rowid();
        log::info!("created subject {id} ({name})");
        self.require_subject(id)
    }

    pub fn get_subject(&self, id: i64) -> AppResult<Option<Subject>> {
        let subject = self
            .conn
            .query_row(
                "SELECT id, name, description, is_active, created_at, updated_at
                 FROM subjects WHERE id = ?",
                [id],
                Subject::from_row,
            )
            .optional()?;
        Ok(subject)
    }

    pub fn list_subjects(&self, include_inactive: bool) -> AppResult<Vec<Subject>> {
        let sql = if include_inactive {
            "SELECT id, name, description, is_active, created_at, updated_at
             FROM subjects ORDER BY name"
        } else {
            "SELECT id, name, description, is_active, created_at, updated_at
             FROM subjects WHERE is_active = 1 ORDER BY name"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], Subject::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_subject(&self, id: i64, patch: SubjectPatch) -> AppResult<Subject> {
        let mut set = SetClause::new();
        if let Some(name) = patch.name {
            let name = require_text(&name, "subject name")?;
            self.ensure_subject_name_free(&name, Some(id))?;
            set.set("name", name);
        }
        if patch.description.is_some() {
            set.set("description", clean(patch.description));
        }
        if let Some(active) = patch.is_active {
            set.set("is_active", active);
        }
        if set.is_empty() {
            return self.require_subject(id);
        }
        let n = set
            .execute(self.conn, "subjects", id)
            .during("subject update")?;
        if n == 0 {
            return Err(AppError::not_found(format!("subject {id} not found")));
        }
        log::info!("updated subject {id}");
        self.require_subject(id)
    }

    /// Soft delete via the active flag.
    pub fn delete_subject(&self, id: i64) -> AppResult<Subject> {
        let mut set = SetClause::new();
        set.set("is_active", false);
        let n = set
            .execute(self.conn, "subjects", id)
            .during("subject delete")?;
        if n == 0 {
            return Err(AppError::not_found(format!("subject {id} not found")));
        }
        log::info!("deactivated subject {id}");
        self.require_subject(id)
    }

    // --- courses ---

    pub fn create_course(&self, input: NewCourse) -> AppResult<Course> {
        let name = require_text(&input.name, "course name")?;
        validate_capacity(input.capacity)?;
        validate_dates(input.start_date, input.end_date)?;
        if !db::row_exists(self.conn, "subjects", input.subject_id)? {
            return Err(AppError::not_found(format!(
                "subject {} not found",
                input.subject_id
            )));
        }
        let now = db::now();
        self.conn
            .execute(
                "INSERT INTO courses(
                   subject_id, name, level, capacity, duration_minutes, schedule_info,
                   textbook, curriculum, start_date, end_date, status, created_at, updated_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    input.subject_id,
                    name,
                    clean(input.level),
                    input.capacity,
                    input.duration_minutes,
                    clean(input.schedule_info),
                    clean(input.textbook),
                    clean(input.curriculum),
                    input.start_date,
                    input.end_date,
                    input.status.unwrap_or(CourseStatus::Active),
                    now,
                    now,
                ],
            )
            .during("course create")?;
        let id = self.conn.last_insert_rowid();
        log::info!("created course {id} ({name}, capacity {})", input.capacity);
        self.require_course(id)
    }

    pub fn get_course(&self, id: i64) -> AppResult<Option<Course>> {
        let sql = format!("{COURSE_SELECT} WHERE c.id = ?");
        let course = self
            .conn
            .query_row(&sql, [id], Course::from_row)
            .optional()?;
        Ok(course)
    }

    pub fn list_courses(&self, filter: &CourseFilter) -> AppResult<Vec<Course>> {
        let mut sql = format!("{COURSE_SELECT} WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();
        if let Some(subject_id) = filter.subject_id {
            sql.push_str(" AND c.subject_id = ?");
            binds.push(Value::Integer(subject_id));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND c.status = ?");
            binds.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(search) = clean(filter.search.clone()) {
            sql.push_str(
                " AND (c.name LIKE ? ESCAPE '\\' OR s.name LIKE ? ESCAPE '\\'
                  OR c.level LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(&search);
            for _ in 0..3 {
                binds.push(Value::Text(pattern.clone()));
            }
        }
        sql.push_str(" ORDER BY c.name, c.id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds.iter()), Course::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_course(&self, id: i64, patch: CoursePatch) -> AppResult<Course> {
        let current = self.require_course(id)?;
        let mut set = SetClause::new();
        if let Some(subject_id) = patch.subject_id {
            if !db::row_exists(self.conn, "subjects", subject_id)? {
                return Err(AppError::not_found(format!("subject {subject_id} not found")));
            }
            set.set("subject_id", subject_id);
        }
        if let Some(name) = patch.name {
            set.set("name", require_text(&name, "course name")?);
        }
        if let Some(capacity) = patch.capacity {
            validate_capacity(capacity)?;
            set.set("capacity", capacity);
        }
        if let Some(minutes) = patch.duration_minutes {
            set.set("duration_minutes", minutes);
        }
        let start = patch.start_date.unwrap_or(current.start_date);
        let end = patch.end_date.unwrap_or(current.end_date);
        validate_dates(start, end)?;
        if let Some(d) = patch.start_date {
            set.set("start_date", d);
        }
        if let Some(d) = patch.end_date {
            set.set("end_date", d);
        }
        if let Some(status) = patch.status {
            set.set("status", status);
        }
        let text_fields = [
            ("level", patch.level),
            ("schedule_info", patch.schedule_info),
            ("textbook", patch.textbook),
            ("curriculum", patch.curriculum),
        ];
        for (column, value) in text_fields {
            if value.is_some() {
                set.set(column, clean(value));
            }
        }
        if set.is_empty() {
            return Ok(current);
        }
        set.execute(self.conn, "courses", id)
            .during("course update")?;
        log::info!("updated course {id}");
        self.require_course(id)
    }

    /// Hard delete, refused while the course has active enrollments.
    /// Dropped and completed enrollment rows go with it.
    pub fn delete_course(&self, id: i64) -> AppResult<()> {
        if !db::row_exists(self.conn, "courses", id)? {
            return Err(AppError::not_found(format!("course {id} not found")));
        }
        let active = active_count(self.conn, id)?;
        if active > 0 {
            log::warn!("refused to delete course {id}: {active} active enrollments");
            return Err(AppError::rule(format!(
                "course {id} has {active} active enrollment(s)"
            )));
        }
        let tx = self.conn.unchecked_transaction().during("course delete")?;
        tx.execute("DELETE FROM enrollments WHERE course_id = ?", [id])
            .during("course delete")?;
        tx.execute("DELETE FROM courses WHERE id = ?", [id])
            .during("course delete")?;
        tx.commit().during("course delete")?;
        log::info!("deleted course {id}");
        Ok(())
    }

    // --- enrollments ---

    /// Checks, in order: no active enrollment for the pair, course exists,
    /// course below capacity. All inside one transaction with the insert.
    pub fn enroll(
        &self,
        student_id: i64,
        course_id: i64,
        overrides: EnrollmentOverrides,
    ) -> AppResult<Enrollment> {
        let tx = self.conn.unchecked_transaction().during("enrollment")?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM enrollments
                 WHERE student_id = ? AND course_id = ? AND status = 'active'",
                (student_id, course_id),
                |r| r.get(0),
            )
            .optional()
            .during("enrollment")?;
        if existing.is_some() {
            log::warn!("student {student_id} already enrolled in course {course_id}");
            return Err(AppError::rule(format!(
                "student {student_id} is already enrolled in course {course_id}"
            )));
        }
        let capacity: Option<i64> = tx
            .query_row("SELECT capacity FROM courses WHERE id = ?", [course_id], |r| {
                r.get(0)
            })
            .optional()
            .during("enrollment")?;
        let Some(capacity) = capacity else {
            return Err(AppError::not_found(format!("course {course_id} not found")));
        };
        let active = active_count(&tx, course_id).during("enrollment")?;
        if active >= capacity {
            log::warn!("course {course_id} is full ({active}/{capacity})");
            return Err(AppError::rule(format!(
                "course {course_id} is full ({active}/{capacity})"
            )));
        }
        if !db::row_exists(&tx, "students", student_id)? {
            return Err(AppError::not_found(format!("student {student_id} not found")));
        }

        let today = Local::now().date_naive();
        let now = db::now();
        tx.execute(
            "INSERT INTO enrollments(
               student_id, course_id, enrollment_date, start_date, status, notes,
               created_at, updated_at
             ) VALUES(?, ?, ?, ?, 'active', ?, ?, ?)",
            rusqlite::params![
                student_id,
                course_id,
                overrides.enrollment_date.unwrap_or(today),
                overrides.start_date.unwrap_or(today),
                clean(overrides.notes),
                now,
                now,
            ],
        )
        .during("enrollment")?;
        let id = tx.last_insert_rowid();
        tx.commit().during("enrollment")?;
        log::info!("enrolled student {student_id} in course {course_id} (enrollment {id})");
        self.require_enrollment(id)
    }

    /// Marks the enrollment dropped and stamps today as its end date.
    pub fn unenroll(&self, enrollment_id: i64) -> AppResult<Enrollment> {
        let mut set = SetClause::new();
        set.set("status", EnrollmentStatus::Dropped);
        set.set("end_date", Local::now().date_naive());
        let n = set
            .execute(self.conn, "enrollments", enrollment_id)
            .during("unenroll")?;
        if n == 0 {
            return Err(AppError::not_found(format!(
                "enrollment {enrollment_id} not found"
            )));
        }
        log::info!("dropped enrollment {enrollment_id}");
        self.require_enrollment(enrollment_id)
    }

    pub fn get_enrollment(&self, id: i64) -> AppResult<Option<Enrollment>> {
        let sql = format!("{ENROLLMENT_SELECT} WHERE e.id = ?");
        let e = self
            .conn
            .query_row(&sql, [id], Enrollment::from_row)
            .optional()?;
        Ok(e)
    }

    pub fn enrollments_for_student(
        &self,
        student_id: i64,
        include_inactive: bool,
    ) -> AppResult<Vec<Enrollment>> {
        self.enrollments_where("e.student_id", student_id, include_inactive)
    }

    pub fn enrollments_for_course(
        &self,
        course_id: i64,
        include_inactive: bool,
    ) -> AppResult<Vec<Enrollment>> {
        self.enrollments_where("e.course_id", course_id, include_inactive)
    }

    pub fn active_count(&self, course_id: i64) -> AppResult<i64> {
        active_count(self.conn, course_id)
    }

    pub fn course_detail(&self, course_id: i64) -> AppResult<Option<CourseDetail>> {
        let Some(course) = self.get_course(course_id)? else {
            return Ok(None);
        };
        let enrollments = self.enrollments_for_course(course_id, false)?;
        let student_count = enrollments.len() as i64;
        Ok(Some(CourseDetail {
            available_slots: (course.capacity - student_count).max(0),
            course,
            enrollments,
            student_count,
        }))
    }

    /// Active courses the student is not actively enrolled in.
    pub fn available_courses(&self, student_id: i64) -> AppResult<Vec<Course>> {
        let sql = format!(
            "{COURSE_SELECT}
             WHERE c.status = 'active'
               AND c.id NOT IN (
                 SELECT course_id FROM enrollments WHERE student_id = ? AND status = 'active'
               )
             ORDER BY c.name, c.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([student_id], Course::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Students of any status without an active enrollment in the course.
    pub fn available_students(&self, course_id: i64) -> AppResult<Vec<Student>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students
             WHERE id NOT IN (
               SELECT student_id FROM enrollments WHERE course_id = ? AND status = 'active'
             )
             ORDER BY name, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([course_id], Student::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Ranked by active enrollments, ties by course id. Courses nobody is
    /// actively enrolled in are left out.
    pub fn popular(&self, limit: i64) -> AppResult<Vec<PopularCourse>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, s.name, COUNT(e.id) AS active, c.capacity
             FROM courses c
             JOIN subjects s ON s.id = c.subject_id
             JOIN enrollments e ON e.course_id = c.id AND e.status = 'active'
             GROUP BY c.id
             ORDER BY active DESC, c.id ASC
             LIMIT ?",
        )?;
        let rows = stmt
            .query_map([limit], |r| {
                Ok(PopularCourse {
                    course_id: r.get(0)?,
                    course_name: r.get(1)?,
                    subject_name: r.get(2)?,
                    active_enrollments: r.get(3)?,
                    capacity: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn statistics(&self, top: i64) -> AppResult<CourseStatistics> {
        let count = |sql: &str| -> AppResult<i64> { Ok(self.conn.query_row(sql, [], |r| r.get(0))?) };
        Ok(CourseStatistics {
            total_courses: count("SELECT COUNT(*) FROM courses")?,
            active_courses: count("SELECT COUNT(*) FROM courses WHERE status = 'active'")?,
            total_subjects: count("SELECT COUNT(*) FROM subjects WHERE is_active = 1")?,
            total_enrollments: count("SELECT COUNT(*) FROM enrollments WHERE status = 'active'")?,
            popular_courses: self.popular(top)?,
        })
    }

    fn enrollments_where(
        &self,
        column: &str,
        id: i64,
        include_inactive: bool,
    ) -> AppResult<Vec<Enrollment>> {
        let mut sql = format!("{ENROLLMENT_SELECT} WHERE {column} = ?");
        if !include_inactive {
            sql.push_str(" AND e.status = 'active'");
        }
        sql.push_str(" ORDER BY e.enrollment_date DESC, e.id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([id], Enrollment::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn ensure_subject_name_free(&self, name: &str, except: Option<i64>) -> AppResult<()> {
        let taken: Option<i64> = self
            .conn
            .query_row("SELECT id FROM subjects WHERE name = ?", [name], |r| r.get(0))
            .optional()?;
        match taken {
            Some(other) if Some(other) != except => Err(AppError::rule(format!(
                "subject name already in use: {name}"
            ))),
            _ => Ok(()),
        }
    }

    fn require_subject(&self, id: i64) -> AppResult<Subject> {
        self.get_subject(id)?
            .ok_or_else(|| AppError::not_found(format!("subject {id} not found")))
    }

    fn require_course(&self, id: i64) -> AppResult<Course> {
        self.get_course(id)?
            .ok_or_else(|| AppError::not_found(format!("course {id} not found")))
    }

    fn require_enrollment(&self, id: i64) -> AppResult<Enrollment> {
        self.get_enrollment(id)?
            .ok_or_else(|| AppError::not_found(format!("enrollment {id} not found")))
    }
}

fn active_count(conn: &Connection, course_id: i64) -> AppResult<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM enrollments WHERE course_id = ? AND status = 'active'",
        [course_id],
        |r| r.get(0),
    )?;
    Ok(n)
}

fn validate_capacity(capacity: i64) -> AppResult<()> {
    if capacity < 1 {
        return Err(AppError::validation(format!(
            "capacity must be at least 1, got {capacity}"
        )));
    }
    Ok(())
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::validation(format!(
                "end date {end} is before start date {start}"
            )));
        }
    }
    Ok(())
}
