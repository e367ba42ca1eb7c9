use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{AppError, AppResult};

/// Declares a closed set of values stored as lowercase keys in sqlite,
/// serialized as the same key, and parsed from either the key or the
/// Korean display label used on spreadsheets.
macro_rules! labeled_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => ($key:literal, $label:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        #[allow(dead_code)]
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s) || v.label() == s)
            }

            pub fn parse_required(s: &str) -> $crate::error::AppResult<Self> {
                Self::parse(s).ok_or_else(|| {
                    $crate::error::AppError::Validation(format!("invalid {}: {}", $what, s))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid {}: {}", $what, raw))
                })
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let raw = value.as_str()?;
                Self::parse(raw).ok_or_else(|| {
                    rusqlite::types::FromSqlError::Other(
                        format!("unknown {} in database: {}", $what, raw).into(),
                    )
                })
            }
        }
    };
}

pub mod course;
pub mod guardian;
pub mod student;
pub mod user;

pub use course::{
    Course, CourseDetail, CoursePatch, CourseStatus, Enrollment, EnrollmentOverrides,
    EnrollmentStatus, NewCourse, NewSubject, Subject, SubjectPatch,
};
pub use guardian::{Guardian, GuardianPatch, NewGuardian, RelationshipType};
pub use student::{Gender, NewStudent, Student, StudentPatch, StudentStatus};
pub use user::{NewUser, Role, SessionUser, User, UserPatch};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

/// Accepts the fixed `YYYY-MM-DD` form (and a few separator variants,
/// plus a trailing time part as spreadsheets tend to emit).
pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(AppError::validation(format!(
        "invalid date {s:?}, expected YYYY-MM-DD"
    )))
}

pub fn parse_optional_date(raw: &str) -> AppResult<Option<NaiveDate>> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        parse_date(raw).map(Some)
    }
}

/// Trims and turns blank strings into `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

pub(crate) fn require_text(value: &str, what: &str) -> AppResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(AppError::validation(format!("{what} is required")));
    }
    Ok(t.to_string())
}

/// Serde glue for date fields coming from forms: either a structured date
/// or a string in one of the accepted formats.
pub(crate) mod date_input {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer};

    pub fn option<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => super::parse_optional_date(&s).map_err(serde::de::Error::custom),
        }
    }

    /// For patches of nullable dates: absent is `None` (keep), while `null`
    /// or a blank string is `Some(None)` (clear). Pair with `#[serde(default)]`.
    pub fn clearable<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        option(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_accept_common_spreadsheet_forms() {
        let expected = NaiveDate::from_ymd_opt(2012, 3, 4).expect("date");
        for raw in ["2012-03-04", "2012/03/04", "2012.03.04", "2012-03-04 00:00:00"] {
            assert_eq!(parse_date(raw).expect(raw), expected);
        }
        assert!(parse_date("04-03-2012").is_err());
        assert_eq!(parse_optional_date("  ").expect("blank"), None);
    }

    #[test]
    fn labels_and_keys_both_parse() {
        assert_eq!(Gender::parse("남"), Some(Gender::Male));
        assert_eq!(Gender::parse("female"), Some(Gender::Female));
        assert_eq!(StudentStatus::parse("졸업"), Some(StudentStatus::Graduated));
        assert!(CourseStatus::parse_required("paused").is_err());
    }

    #[test]
    fn clean_drops_blank_strings() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" a ".into())), Some("a".into()));
    }
}
