use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

labeled_enum! {
    CourseStatus, "course status" {
        Active => ("active", "진행중"),
        Completed => ("completed", "종료"),
        Cancelled => ("cancelled", "취소"),
    }
}

labeled_enum! {
    EnrollmentStatus, "enrollment status" {
        Active => ("active", "수강중"),
        Completed => ("completed", "수료"),
        Dropped => ("dropped", "수강취소"),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subject {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Subject {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Courses are always read joined with their subject name.
pub(crate) const COURSE_SELECT: &str = "SELECT c.id, c.subject_id, s.name AS subject_name,
    c.name, c.level, c.capacity, c.duration_minutes, c.schedule_info, c.textbook,
    c.curriculum, c.start_date, c.end_date, c.status, c.created_at, c.updated_at
  FROM courses c
  JOIN subjects s ON s.id = c.subject_id";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub subject_id: i64,
    pub subject_name: String,
    pub name: String,
    pub level: Option<String>,
    pub capacity: i64,
    pub duration_minutes: Option<i64>,
    pub schedule_info: Option<String>,
    pub textbook: Option<String>,
    pub curriculum: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get("id")?,
            subject_id: row.get("subject_id")?,
            subject_name: row.get("subject_name")?,
            name: row.get("name")?,
            level: row.get("level")?,
            capacity: row.get("capacity")?,
            duration_minutes: row.get("duration_minutes")?,
            schedule_info: row.get("schedule_info")?,
            textbook: row.get("textbook")?,
            curriculum: row.get("curriculum")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub subject_id: i64,
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
    pub capacity: i64,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub schedule_info: Option<String>,
    #[serde(default)]
    pub textbook: Option<String>,
    #[serde(default)]
    pub curriculum: Option<String>,
    #[serde(default, deserialize_with = "super::date_input::option")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "super::date_input::option")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<CourseStatus>,
}

impl NewCourse {
    pub fn new(subject_id: i64, name: impl Into<String>, capacity: i64) -> Self {
        NewCourse {
            subject_id,
            name: name.into(),
            level: None,
            capacity,
            duration_minutes: None,
            schedule_info: None,
            textbook: None,
            curriculum: None,
            start_date: None,
            end_date: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CoursePatch {
    pub subject_id: Option<i64>,
    pub name: Option<String>,
    pub level: Option<String>,
    pub capacity: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub schedule_info: Option<String>,
    pub textbook: Option<String>,
    pub curriculum: Option<String>,
    /// `Some(None)` clears the date.
    #[serde(deserialize_with = "super::date_input::clearable")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "super::date_input::clearable")]
    pub end_date: Option<Option<NaiveDate>>,
    pub status: Option<CourseStatus>,
}

pub(crate) const ENROLLMENT_SELECT: &str = "SELECT e.id, e.student_id, st.name AS student_name,
    st.academy_id, e.course_id, c.name AS course_name, e.enrollment_date, e.start_date,
    e.end_date, e.status, e.notes, e.created_at, e.updated_at
  FROM enrollments e
  JOIN students st ON st.id = e.student_id
  JOIN courses c ON c.id = e.course_id";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub academy_id: String,
    pub course_id: i64,
    pub course_name: String,
    pub enrollment_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: EnrollmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Enrollment {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            student_name: row.get("student_name")?,
            academy_id: row.get("academy_id")?,
            course_id: row.get("course_id")?,
            course_name: row.get("course_name")?,
            enrollment_date: row.get("enrollment_date")?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            status: row.get("status")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Optional caller-supplied values for a new enrollment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrollmentOverrides {
    #[serde(deserialize_with = "super::date_input::option")]
    pub enrollment_date: Option<NaiveDate>,
    #[serde(deserialize_with = "super::date_input::option")]
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    pub course: Course,
    pub enrollments: Vec<Enrollment>,
    pub student_count: i64,
    pub available_slots: i64,
}
