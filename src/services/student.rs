use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::{self, SetClause};
use crate::error::{AppError, AppResult, Context};
use crate::exchange::{self, ImportSummary, Sheet};
use crate::models::student::STUDENT_COLUMNS;
use crate::models::{
    clean, parse_optional_date, require_text, Gender, Guardian, NewGuardian, NewStudent,
    Student, StudentPatch, StudentStatus,
};
use crate::security;
use crate::services::{guardian, like_pattern, links};

/// Bound on regenerate-and-check attempts for a fresh academy id.
pub const ACADEMY_ID_ATTEMPTS: usize = 32;

pub const IMPORT_COLUMNS: &[&str] = &[
    "이름", "성별", "생년월일", "학교명", "학년", "반", "연락처", "이메일", "우편번호", "주소",
    "상세주소", "상태", "메모",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentFilter {
    pub status: Option<StudentStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub student: Student,
    pub guardians: Vec<Guardian>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatistics {
    pub total_students: i64,
    pub active_students: i64,
    pub inactive_students: i64,
    pub status_distribution: BTreeMap<String, i64>,
    pub gender_distribution: BTreeMap<String, i64>,
    pub grade_distribution: BTreeMap<i64, i64>,
    /// `YYYY-MM` -> students whose enrollment date falls in that month of the current year.
    pub monthly_enrollments: BTreeMap<String, i64>,
}

pub struct StudentService<'a> {
    conn: &'a Connection,
}

impl<'a> StudentService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        StudentService { conn }
    }

    pub fn create(&self, input: NewStudent) -> AppResult<Student> {
        let tx = self.conn.unchecked_transaction().during("student create")?;
        let id = insert_student(&tx, input, today()).during("student create")?;
        tx.commit().during("student create")?;
        self.require(id)
    }

    pub fn get(&self, id: i64) -> AppResult<Option<Student>> {
        fetch(self.conn, id)
    }

    pub fn get_by_academy_id(&self, academy_id: &str) -> AppResult<Option<Student>> {
        let academy_id = academy_id.trim().to_ascii_uppercase();
        if !security::is_academy_id(&academy_id) {
            return Ok(None);
        }
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE academy_id = ?");
        let student = self
            .conn
            .query_row(&sql, [&academy_id], Student::from_row)
            .optional()?;
        Ok(student)
    }

    /// Status filter, case-insensitive partial match over name, academy id,
    /// school and phone, ordered by name.
    pub fn list(&self, filter: &StudentFilter) -> AppResult<Vec<Student>> {
        let mut sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(search) = clean(filter.search.clone()) {
            sql.push_str(
                " AND (name LIKE ? ESCAPE '\\' OR academy_id LIKE ? ESCAPE '\\'
                  OR school_name LIKE ? ESCAPE '\\' OR phone LIKE ? ESCAPE '\\')",
            );
            let pattern = like_pattern(&search);
            for _ in 0..4 {
                binds.push(Value::Text(pattern.clone()));
            }
        }
        sql.push_str(" ORDER BY name, id");
        if let Some(limit) = filter.limit.filter(|n| *n > 0) {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(limit));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds.iter()), Student::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update(&self, id: i64, patch: StudentPatch) -> AppResult<Student> {
        let mut set = SetClause::new();
        if let Some(name) = patch.name {
            set.set("name", require_text(&name, "name")?);
        }
        if let Some(gender) = patch.gender {
            set.set("gender", gender);
        }
        if let Some(d) = patch.birth_date {
            set.set("birth_date", d);
        }
        if let Some(d) = patch.enrollment_date {
            set.set("enrollment_date", d);
        }
        if let Some(status) = patch.status {
            set.set("status", status);
        }
        if let Some(grade) = patch.grade {
            set.set("grade", validate_grade(grade)?);
        }
        let text_fields = [
            ("phone", patch.phone),
            ("email", patch.email),
            ("postal_code", patch.postal_code),
            ("road_address", patch.road_address),
            ("detail_address", patch.detail_address),
            ("extra_address", patch.extra_address),
            ("school_name", patch.school_name),
            ("class_name", patch.class_name),
            ("emergency_contact_name", patch.emergency_contact_name),
            ("emergency_contact_relationship", patch.emergency_contact_relationship),
            ("emergency_contact_phone", patch.emergency_contact_phone),
            ("allergies", patch.allergies),
            ("medications", patch.medications),
            ("special_needs", patch.special_needs),
            ("notes", patch.notes),
        ];
        for (column, value) in text_fields {
            if value.is_some() {
                set.set(column, clean(value));
            }
        }

        if set.is_empty() {
            return self.require(id);
        }
        let tx = self.conn.unchecked_transaction().during("student update")?;
        let n = set.execute(&tx, "students", id).during("student update")?;
        if n == 0 {
            return Err(AppError::not_found(format!("student {id} not found")));
        }
        tx.commit().during("student update")?;
        log::info!("updated student {id}");
        self.require(id)
    }

    /// Soft delete: the row stays, its status becomes inactive.
    pub fn delete(&self, id: i64) -> AppResult<Student> {
        let mut set = SetClause::new();
        set.set("status", StudentStatus::Inactive);
        let n = set
            .execute(self.conn, "students", id)
            .during("student delete")?;
        if n == 0 {
            return Err(AppError::not_found(format!("student {id} not found")));
        }
        log::info!("deactivated student {id}");
        self.require(id)
    }

    pub fn link_guardian(&self, student_id: i64, guardian_id: i64) -> AppResult<bool> {
        links::link(self.conn, student_id, guardian_id).during("guardian link")
    }

    pub fn unlink_guardian(&self, student_id: i64, guardian_id: i64) -> AppResult<bool> {
        links::unlink(self.conn, student_id, guardian_id).during("guardian unlink")
    }

    pub fn guardians(&self, student_id: i64) -> AppResult<Vec<Guardian>> {
        links::guardians_of(self.conn, student_id)
    }

    /// Intake form: one student plus any new guardians, linked, all or nothing.
    pub fn register(
        &self,
        student: NewStudent,
        guardians: Vec<NewGuardian>,
    ) -> AppResult<Registration> {
        let tx = self
            .conn
            .unchecked_transaction()
            .during("student registration")?;
        let student_id = insert_student(&tx, student, today()).during("student registration")?;
        for g in &guardians {
            let guardian_id = guardian::insert_guardian(&tx, g).during("student registration")?;
            links::link(&tx, student_id, guardian_id).during("student registration")?;
        }
        tx.commit().during("student registration")?;
        Ok(Registration {
            student: self.require(student_id)?,
            guardians: links::guardians_of(self.conn, student_id)?,
        })
    }

    pub fn recent(&self, limit: i64) -> AppResult<Vec<Student>> {
        let sql = format!(
            "SELECT {STUDENT_COLUMNS} FROM students ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([limit], Student::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn statistics(&self, today: NaiveDate) -> AppResult<StudentStatistics> {
        let mut stats = StudentStatistics::default();
        for status in StudentStatus::ALL {
            stats.status_distribution.insert(status.as_str().to_string(), 0);
        }
        {
            let mut stmt = self
                .conn
                .prepare("SELECT status, COUNT(*) FROM students GROUP BY status")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, StudentStatus>(0)?, r.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                stats.total_students += count;
                if status == StudentStatus::Active {
                    stats.active_students = count;
                }
                stats
                    .status_distribution
                    .insert(status.as_str().to_string(), count);
            }
        }
        stats.inactive_students = stats.total_students - stats.active_students;

        {
            let mut stmt = self
                .conn
                .prepare("SELECT gender, COUNT(*) FROM students GROUP BY gender")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, Option<Gender>>(0)?, r.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (gender, count) = row?;
                let key = gender.map(|g| g.as_str()).unwrap_or("unknown");
                stats.gender_distribution.insert(key.to_string(), count);
            }
        }

        {
            let mut stmt = self.conn.prepare(
                "SELECT grade, COUNT(*) FROM students WHERE grade IS NOT NULL GROUP BY grade",
            )?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
            for row in rows {
                let (grade, count) = row?;
                stats.grade_distribution.insert(grade, count);
            }
        }

        {
            let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            let mut stmt = self.conn.prepare(
                "SELECT strftime('%Y-%m', enrollment_date) AS month, COUNT(*)
                 FROM students
                 WHERE enrollment_date >= ?
                 GROUP BY month
                 ORDER BY month",
            )?;
            let rows = stmt.query_map([year_start], |r| {
                Ok((r.get::<_, Option<String>>(0)?, r.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (month, count) = row?;
                if let Some(month) = month {
                    stats.monthly_enrollments.insert(month, count);
                }
            }
        }
        Ok(stats)
    }

    /// Copies an image into the upload area under a random name and records it.
    pub fn set_profile_image(&self, id: i64, source: &Path, config: &Config) -> AppResult<Student> {
        if !db::row_exists(self.conn, "students", id)? {
            return Err(AppError::not_found(format!("student {id} not found")));
        }
        if !source.is_file() {
            return Err(AppError::validation(format!(
                "not a file: {}",
                source.to_string_lossy()
            )));
        }
        if let Some(len) = config.check_file_size(source)? {
            return Err(AppError::validation(format!(
                "image is {len} bytes, larger than the {} byte limit",
                config.max_file_size
            )));
        }
        config.ensure_upload_directory()?;
        let original = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let file_name = security::generate_secure_filename(original);
        std::fs::copy(source, config.profiles_dir().join(&file_name))?;

        let mut set = SetClause::new();
        set.set("profile_image_path", format!("profiles/{file_name}"));
        set.execute(self.conn, "students", id)
            .during("profile image update")?;
        log::info!("stored profile image for student {id}");
        self.require(id)
    }

    pub fn import_file(&self, path: &Path, config: &Config) -> AppResult<ImportSummary> {
        let sheet = Sheet::read(path, config)?;
        log::info!(
            "importing {} student rows from {}",
            sheet.len(),
            path.to_string_lossy()
        );
        let mut summary = ImportSummary::default();
        for (line, row) in sheet.rows() {
            let outcome = student_from_row(&row).and_then(|input| self.create(input));
            summary.record(line, outcome);
        }
        log::info!(
            "student import finished: {} ok, {} failed",
            summary.success_count,
            summary.error_count
        );
        Ok(summary)
    }

    /// Writes the filtered students; returns the number of data rows.
    pub fn export_file(&self, path: &Path, filter: &StudentFilter) -> AppResult<usize> {
        let students = self.list(filter)?;
        let mut headers = vec!["학원등록번호"];
        headers.extend_from_slice(IMPORT_COLUMNS);
        headers.extend_from_slice(&["입학일", "등록일"]);
        let rows = students.iter().map(|s| {
            vec![
                s.academy_id.clone(),
                s.name.clone(),
                s.gender.map(|g| g.label().to_string()).unwrap_or_default(),
                s.birth_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                exchange::text(&s.school_name),
                s.grade.map(|g| g.to_string()).unwrap_or_default(),
                exchange::text(&s.class_name),
                exchange::text(&s.phone),
                exchange::text(&s.email),
                exchange::text(&s.postal_code),
                exchange::text(&s.road_address),
                exchange::text(&s.detail_address),
                s.status.label().to_string(),
                exchange::text(&s.notes),
                s.enrollment_date.format("%Y-%m-%d").to_string(),
                s.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        });
        let n = exchange::write_sheet(path, &headers, rows)?;
        log::info!("exported {n} students to {}", path.to_string_lossy());
        Ok(n)
    }

    fn require(&self, id: i64) -> AppResult<Student> {
        fetch(self.conn, id)?.ok_or_else(|| AppError::not_found(format!("student {id} not found")))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn fetch(conn: &Connection, id: i64) -> AppResult<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    let student = conn.query_row(&sql, [id], Student::from_row).optional()?;
    Ok(student)
}

fn validate_grade(grade: i64) -> AppResult<i64> {
    if !(1..=12).contains(&grade) {
        return Err(AppError::validation(format!(
            "grade must be between 1 and 12, got {grade}"
        )));
    }
    Ok(grade)
}

fn unique_academy_id(conn: &Connection, today: NaiveDate) -> AppResult<String> {
    for _ in 0..ACADEMY_ID_ATTEMPTS {
        let candidate = security::generate_academy_id(today);
        if !academy_id_taken(conn, &candidate)? {
            return Ok(candidate);
        }
        log::debug!("academy id {candidate} already taken, retrying");
    }
    Err(AppError::Exhausted(format!(
        "no free academy id after {ACADEMY_ID_ATTEMPTS} attempts"
    )))
}

fn academy_id_taken(conn: &Connection, candidate: &str) -> AppResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students WHERE academy_id = ?",
            [candidate],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn insert_student(conn: &Connection, input: NewStudent, today: NaiveDate) -> AppResult<i64> {
    let name = require_text(&input.name, "name")?;
    let grade = input.grade.map(validate_grade).transpose()?;
    let academy_id = unique_academy_id(conn, today)?;
    let now = db::now();
    conn.execute(
        "INSERT INTO students(
           academy_id, name, gender, birth_date, phone, email,
           postal_code, road_address, detail_address, extra_address,
           school_name, grade, class_name, enrollment_date, status,
           emergency_contact_name, emergency_contact_relationship, emergency_contact_phone,
           allergies, medications, special_needs, notes, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            academy_id,
            name,
            input.gender,
            input.birth_date,
            clean(input.phone),
            clean(input.email),
            clean(input.postal_code),
            clean(input.road_address),
            clean(input.detail_address),
            clean(input.extra_address),
            clean(input.school_name),
            grade,
            clean(input.class_name),
            input.enrollment_date.unwrap_or(today),
            input.status.unwrap_or(StudentStatus::Active),
            clean(input.emergency_contact_name),
            clean(input.emergency_contact_relationship),
            clean(input.emergency_contact_phone),
            clean(input.allergies),
            clean(input.medications),
            clean(input.special_needs),
            clean(input.notes),
            now,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("created student {id} ({academy_id})");
    Ok(id)
}

fn student_from_row(row: &exchange::SheetRow<'_>) -> AppResult<NewStudent> {
    let gender = match row.get("성별") {
        "" => None,
        raw => Some(Gender::parse_required(raw)?),
    };
    let grade = match row.get("학년").trim_end_matches("학년").trim() {
        "" => None,
        raw => Some(
            raw.parse::<i64>()
                .map_err(|_| AppError::validation(format!("invalid grade: {raw}")))?,
        ),
    };
    let status = match row.get("상태") {
        "" => None,
        raw => Some(StudentStatus::parse_required(raw)?),
    };
    Ok(NewStudent {
        name: row.get("이름").to_string(),
        gender,
        birth_date: parse_optional_date(row.get("생년월일"))?,
        school_name: row.opt("학교명"),
        grade,
        class_name: row.opt("반"),
        phone: row.opt("연락처"),
        email: row.opt("이메일"),
        postal_code: row.opt("우편번호"),
        road_address: row.opt("주소"),
        detail_address: row.opt("상세주소"),
        status,
        notes: row.opt("메모"),
        ..NewStudent::default()
    })
}
