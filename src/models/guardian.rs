use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

labeled_enum! {
    RelationshipType, "relationship" {
        Father => ("father", "아버지"),
        Mother => ("mother", "어머니"),
        Grandparent => ("grandparent", "조부모"),
        Uncle => ("uncle", "삼촌"),
        Aunt => ("aunt", "이모/고모"),
        Guardian => ("guardian", "보호자"),
        Other => ("other", "기타"),
    }
}

impl RelationshipType {
    /// Lenient mapping for spreadsheet cells: anything unrecognized is `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "할아버지" | "할머니" => RelationshipType::Grandparent,
            "이모" | "고모" => RelationshipType::Aunt,
            other => RelationshipType::parse(other).unwrap_or(RelationshipType::Other),
        }
    }
}

pub(crate) const GUARDIAN_COLUMNS: &str = "id, name, relationship_type, phone, email,
    postal_code, road_address, detail_address, extra_address,
    occupation, workplace, work_phone,
    emergency_contact_name, emergency_contact_relationship, emergency_contact_phone,
    is_primary, sms_enabled, email_enabled, kakao_enabled, phone_enabled,
    notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guardian {
    pub id: i64,
    pub name: String,
    pub relationship_type: RelationshipType,
    pub phone: String,
    pub email: Option<String>,
    pub postal_code: Option<String>,
    pub road_address: Option<String>,
    pub detail_address: Option<String>,
    pub extra_address: Option<String>,
    pub occupation: Option<String>,
    pub workplace: Option<String>,
    pub work_phone: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub is_primary: bool,
    pub sms_enabled: bool,
    pub email_enabled: bool,
    pub kakao_enabled: bool,
    pub phone_enabled: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Guardian {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Guardian {
            id: row.get("id")?,
            name: row.get("name")?,
            relationship_type: row.get("relationship_type")?,
            phone: row.get("phone")?,
            email: row.get("email")?,
            postal_code: row.get("postal_code")?,
            road_address: row.get("road_address")?,
            detail_address: row.get("detail_address")?,
            extra_address: row.get("extra_address")?,
            occupation: row.get("occupation")?,
            workplace: row.get("workplace")?,
            work_phone: row.get("work_phone")?,
            emergency_contact_name: row.get("emergency_contact_name")?,
            emergency_contact_relationship: row.get("emergency_contact_relationship")?,
            emergency_contact_phone: row.get("emergency_contact_phone")?,
            is_primary: row.get("is_primary")?,
            sms_enabled: row.get("sms_enabled")?,
            email_enabled: row.get("email_enabled")?,
            kakao_enabled: row.get("kakao_enabled")?,
            phone_enabled: row.get("phone_enabled")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGuardian {
    pub name: String,
    #[serde(default = "default_relationship")]
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub road_address: Option<String>,
    #[serde(default)]
    pub detail_address: Option<String>,
    #[serde(default)]
    pub extra_address: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default)]
    pub work_phone: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_relationship: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "yes")]
    pub sms_enabled: bool,
    #[serde(default = "yes")]
    pub email_enabled: bool,
    #[serde(default)]
    pub kakao_enabled: bool,
    #[serde(default)]
    pub phone_enabled: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_relationship() -> RelationshipType {
    RelationshipType::Other
}

impl NewGuardian {
    pub fn new(name: impl Into<String>, relationship_type: RelationshipType, phone: impl Into<String>) -> Self {
        NewGuardian {
            name: name.into(),
            relationship_type,
            phone: phone.into(),
            email: None,
            postal_code: None,
            road_address: None,
            detail_address: None,
            extra_address: None,
            occupation: None,
            workplace: None,
            work_phone: None,
            emergency_contact_name: None,
            emergency_contact_relationship: None,
            emergency_contact_phone: None,
            is_primary: false,
            sms_enabled: true,
            email_enabled: true,
            kakao_enabled: false,
            phone_enabled: false,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct GuardianPatch {
    pub name: Option<String>,
    pub relationship_type: Option<RelationshipType>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub postal_code: Option<String>,
    pub road_address: Option<String>,
    pub detail_address: Option<String>,
    pub extra_address: Option<String>,
    pub occupation: Option<String>,
    pub workplace: Option<String>,
    pub work_phone: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub is_primary: Option<bool>,
    pub sms_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub kakao_enabled: Option<bool>,
    pub phone_enabled: Option<bool>,
    pub notes: Option<String>,
}
