use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

labeled_enum! {
    Gender, "gender" {
        Male => ("male", "남"),
        Female => ("female", "여"),
    }
}

labeled_enum! {
    /// Lifecycle of a student record. `Inactive` doubles as the soft-deleted state.
    StudentStatus, "student status" {
        Active => ("active", "재학"),
        Inactive => ("inactive", "휴학"),
        Graduated => ("graduated", "졸업"),
        Transferred => ("transferred", "전학"),
    }
}

pub(crate) const STUDENT_COLUMNS: &str = "id, academy_id, name, gender, birth_date, phone, email,
    postal_code, road_address, detail_address, extra_address,
    school_name, grade, class_name, enrollment_date, status, profile_image_path,
    emergency_contact_name, emergency_contact_relationship, emergency_contact_phone,
    allergies, medications, special_needs, notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub academy_id: String,
    pub name: String,
    pub gender: Option<Gender>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub postal_code: Option<String>,
    pub road_address: Option<String>,
    pub detail_address: Option<String>,
    pub extra_address: Option<String>,
    pub school_name: Option<String>,
    pub grade: Option<i64>,
    pub class_name: Option<String>,
    pub enrollment_date: NaiveDate,
    pub status: StudentStatus,
    pub profile_image_path: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub special_needs: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: row.get("id")?,
            academy_id: row.get("academy_id")?,
            name: row.get("name")?,
            gender: row.get("gender")?,
            birth_date: row.get("birth_date")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            postal_code: row.get("postal_code")?,
            road_address: row.get("road_address")?,
            detail_address: row.get("detail_address")?,
            extra_address: row.get("extra_address")?,
            school_name: row.get("school_name")?,
            grade: row.get("grade")?,
            class_name: row.get("class_name")?,
            enrollment_date: row.get("enrollment_date")?,
            status: row.get("status")?,
            profile_image_path: row.get("profile_image_path")?,
            emergency_contact_name: row.get("emergency_contact_name")?,
            emergency_contact_relationship: row.get("emergency_contact_relationship")?,
            emergency_contact_phone: row.get("emergency_contact_phone")?,
            allergies: row.get("allergies")?,
            medications: row.get("medications")?,
            special_needs: row.get("special_needs")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Form input for a new student. Only `name` is mandatory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewStudent {
    pub name: String,
    pub gender: Option<Gender>,
    #[serde(deserialize_with = "super::date_input::option")]
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub postal_code: Option<String>,
    pub road_address: Option<String>,
    pub detail_address: Option<String>,
    pub extra_address: Option<String>,
    pub school_name: Option<String>,
    pub grade: Option<i64>,
    pub class_name: Option<String>,
    #[serde(deserialize_with = "super::date_input::option")]
    pub enrollment_date: Option<NaiveDate>,
    pub status: Option<StudentStatus>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub special_needs: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. Absent fields stay as they are; blank text clears a column,
/// and so does `null` or a blank string for the birth date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    #[serde(deserialize_with = "super::date_input::clearable")]
    pub birth_date: Option<Option<NaiveDate>>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub postal_code: Option<String>,
    pub road_address: Option<String>,
    pub detail_address: Option<String>,
    pub extra_address: Option<String>,
    pub school_name: Option<String>,
    pub grade: Option<i64>,
    pub class_name: Option<String>,
    #[serde(deserialize_with = "super::date_input::option")]
    pub enrollment_date: Option<NaiveDate>,
    pub status: Option<StudentStatus>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub special_needs: Option<String>,
    pub notes: Option<String>,
}
