use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::{self, SetClause};
use crate::error::{AppError, AppResult, Context};
use crate::exchange::{self, ImportSummary, Sheet};
use crate::models::guardian::GUARDIAN_COLUMNS;
use crate::models::{
    clean, require_text, Guardian, GuardianPatch, NewGuardian, RelationshipType, Student,
};
use crate::services::{like_pattern, links};

pub const IMPORT_COLUMNS: &[&str] = &[
    "이름", "관계", "연락처", "이메일", "직업", "직장", "직장전화", "우편번호", "주소", "상세주소",
    "주보호자",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardianFilter {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMember {
    pub id: i64,
    pub name: String,
}

/// Guardians sharing one exact phone string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub phone: String,
    pub count: i64,
    pub guardians: Vec<DuplicateMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub primary_id: i64,
    pub merged_ids: Vec<i64>,
    pub skipped_ids: Vec<i64>,
    pub links_moved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationCounts {
    pub sms: i64,
    pub email: i64,
    pub kakao: i64,
    pub phone: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardianStatistics {
    pub total_guardians: i64,
    pub relationship_distribution: BTreeMap<String, i64>,
    pub communication: CommunicationCounts,
    /// Number of linked students -> number of guardians with that many.
    pub children_distribution: BTreeMap<i64, i64>,
}

pub struct GuardianService<'a> {
    conn: &'a Connection,
}

impl<'a> GuardianService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        GuardianService { conn }
    }

    pub fn create(&self, input: NewGuardian) -> AppResult<Guardian> {
        let id = insert_guardian(self.conn, &input).during("guardian create")?;
        self.require(id)
    }

    pub fn get(&self, id: i64) -> AppResult<Option<Guardian>> {
        fetch(self.conn, id)
    }

    /// Digits of `phone` matched anywhere in the stored number, dashes and
    /// spaces ignored on both sides.
    pub fn get_by_phone(&self, phone: &str) -> AppResult<Vec<Guardian>> {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {GUARDIAN_COLUMNS} FROM guardians
             WHERE REPLACE(REPLACE(phone, '-', ''), ' ', '') LIKE ?
             ORDER BY name, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([format!("%{digits}%")], Guardian::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list(&self, filter: &GuardianFilter) -> AppResult<Vec<Guardian>> {
        let mut sql = format!("SELECT {GUARDIAN_COLUMNS} FROM guardians");
        let mut binds: Vec<Value> = Vec::new();
        if let Some(search) = clean(filter.search.clone()) {
            sql.push_str(
                " WHERE name LIKE ? ESCAPE '\\' OR phone LIKE ? ESCAPE '\\'
                   OR email LIKE ? ESCAPE '\\' OR workplace LIKE ? ESCAPE '\\'",
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
            .query_map(params_from_iter(binds.iter()), Guardian::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update(&self, id: i64, patch: GuardianPatch) -> AppResult<Guardian> {
        let mut set = SetClause::new();
        if let Some(name) = patch.name {
            set.set("name", require_text(&name, "name")?);
        }
        if let Some(phone) = patch.phone {
            set.set("phone", require_text(&phone, "phone")?);
        }
        if let Some(rel) = patch.relationship_type {
            set.set("relationship_type", rel);
        }
        let flags = [
            ("is_primary", patch.is_primary),
            ("sms_enabled", patch.sms_enabled),
            ("email_enabled", patch.email_enabled),
            ("kakao_enabled", patch.kakao_enabled),
            ("phone_enabled", patch.phone_enabled),
        ];
        for (column, flag) in flags {
            if let Some(flag) = flag {
                set.set(column, flag);
            }
        }
        let text_fields = [
            ("email", patch.email),
            ("postal_code", patch.postal_code),
            ("road_address", patch.road_address),
            ("detail_address", patch.detail_address),
            ("extra_address", patch.extra_address),
            ("occupation", patch.occupation),
            ("workplace", patch.workplace),
            ("work_phone", patch.work_phone),
            ("emergency_contact_name", patch.emergency_contact_name),
            ("emergency_contact_relationship", patch.emergency_contact_relationship),
            ("emergency_contact_phone", patch.emergency_contact_phone),
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
        let n = set
            .execute(self.conn, "guardians", id)
            .during("guardian update")?;
        if n == 0 {
            return Err(AppError::not_found(format!("guardian {id} not found")));
        }
        log::info!("updated guardian {id}");
        self.require(id)
    }

    /// Hard delete, refused while any student is still linked.
    pub fn delete(&self, id: i64) -> AppResult<()> {
        if !db::row_exists(self.conn, "guardians", id)? {
            return Err(AppError::not_found(format!("guardian {id} not found")));
        }
        let linked = links::link_count_for_guardian(self.conn, id)?;
        if linked > 0 {
            log::warn!("refused to delete guardian {id}: {linked} linked students");
            return Err(AppError::rule(format!(
                "guardian {id} is linked to {linked} student(s); unlink them first"
            )));
        }
        self.conn
            .execute("DELETE FROM guardians WHERE id = ?", [id])
            .during("guardian delete")?;
        log::info!("deleted guardian {id}");
        Ok(())
    }

    pub fn link_student(&self, guardian_id: i64, student_id: i64) -> AppResult<bool> {
        links::link(self.conn, student_id, guardian_id).during("guardian link")
    }

    pub fn unlink_student(&self, guardian_id: i64, student_id: i64) -> AppResult<bool> {
        links::unlink(self.conn, student_id, guardian_id).during("guardian unlink")
    }

    pub fn students(&self, guardian_id: i64) -> AppResult<Vec<Student>> {
        links::students_of(self.conn, guardian_id)
    }

    pub fn recent(&self, limit: i64) -> AppResult<Vec<Guardian>> {
        let sql = format!(
            "SELECT {GUARDIAN_COLUMNS} FROM guardians ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([limit], Guardian::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_duplicates(&self) -> AppResult<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT phone, COUNT(*) FROM guardians
             WHERE TRIM(phone) <> ''
             GROUP BY phone
             HAVING COUNT(*) > 1
             ORDER BY phone",
        )?;
        let groups = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut members = self
            .conn
            .prepare("SELECT id, name FROM guardians WHERE phone = ? ORDER BY id")?;
        let mut out = Vec::with_capacity(groups.len());
        for (phone, count) in groups {
            let guardians = members
                .query_map([&phone], |r| {
                    Ok(DuplicateMember {
                        id: r.get(0)?,
                        name: r.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            out.push(DuplicateGroup {
                phone,
                count,
                guardians,
            });
        }
        Ok(out)
    }

    /// Moves every student link of the duplicates onto `primary_id`, then
    /// deletes the duplicates. Self references and unknown ids are skipped.
    pub fn merge(&self, primary_id: i64, duplicate_ids: &[i64]) -> AppResult<MergeSummary> {
        if !db::row_exists(self.conn, "guardians", primary_id)? {
            return Err(AppError::not_found(format!(
                "guardian {primary_id} not found"
            )));
        }
        let mut summary = MergeSummary {
            primary_id,
            ..MergeSummary::default()
        };
        let tx = self.conn.unchecked_transaction().during("guardian merge")?;
        for &dup in duplicate_ids {
            if dup == primary_id
                || summary.merged_ids.contains(&dup)
                || !db::row_exists(&tx, "guardians", dup)?
            {
                summary.skipped_ids.push(dup);
                continue;
            }
            let moved = tx
                .execute(
                    "INSERT OR IGNORE INTO student_guardians(student_id, guardian_id, created_at)
                     SELECT student_id, ?, ? FROM student_guardians WHERE guardian_id = ?",
                    (primary_id, db::now(), dup),
                )
                .during("guardian merge")?;
            tx.execute("DELETE FROM student_guardians WHERE guardian_id = ?", [dup])
                .during("guardian merge")?;
            tx.execute("DELETE FROM guardians WHERE id = ?", [dup])
                .during("guardian merge")?;
            summary.links_moved += moved;
            summary.merged_ids.push(dup);
        }
        tx.commit().during("guardian merge")?;
        log::info!(
            "merged guardians {:?} into {primary_id} ({} links moved)",
            summary.merged_ids,
            summary.links_moved
        );
        Ok(summary)
    }

    pub fn statistics(&self) -> AppResult<GuardianStatistics> {
        let mut stats = GuardianStatistics::default();
        for rel in RelationshipType::ALL {
            stats
                .relationship_distribution
                .insert(rel.as_str().to_string(), 0);
        }
        {
            let mut stmt = self.conn.prepare(
                "SELECT relationship_type, COUNT(*) FROM guardians GROUP BY relationship_type",
            )?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, RelationshipType>(0)?, r.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (rel, count) = row?;
                stats.total_guardians += count;
                stats
                    .relationship_distribution
                    .insert(rel.as_str().to_string(), count);
            }
        }

        stats.communication = self.conn.query_row(
            "SELECT COALESCE(SUM(sms_enabled), 0), COALESCE(SUM(email_enabled), 0),
                    COALESCE(SUM(kakao_enabled), 0), COALESCE(SUM(phone_enabled), 0)
             FROM guardians",
            [],
            |r| {
                Ok(CommunicationCounts {
                    sms: r.get(0)?,
                    email: r.get(1)?,
                    kakao: r.get(2)?,
                    phone: r.get(3)?,
                })
            },
        )?;

        {
            let mut stmt = self.conn.prepare(
                "SELECT children, COUNT(*) FROM (
                   SELECT g.id, COUNT(sg.student_id) AS children
                   FROM guardians g
                   LEFT JOIN student_guardians sg ON sg.guardian_id = g.id
                   GROUP BY g.id
                 )
                 GROUP BY children",
            )?;
            let rows =
                stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
            for row in rows {
                let (children, count) = row?;
                stats.children_distribution.insert(children, count);
            }
        }
        Ok(stats)
    }

    pub fn import_file(&self, path: &Path, config: &Config) -> AppResult<ImportSummary> {
        let sheet = Sheet::read(path, config)?;
        log::info!(
            "importing {} guardian rows from {}",
            sheet.len(),
            path.to_string_lossy()
        );
        let mut summary = ImportSummary::default();
        for (line, row) in sheet.rows() {
            let outcome = self.create(guardian_from_row(&row));
            summary.record(line, outcome);
        }
        log::info!(
            "guardian import finished: {} ok, {} failed",
            summary.success_count,
            summary.error_count
        );
        Ok(summary)
    }

    pub fn export_file(&self, path: &Path, filter: &GuardianFilter) -> AppResult<usize> {
        let guardians = self.list(filter)?;
        let mut headers = vec!["ID"];
        headers.extend_from_slice(IMPORT_COLUMNS);
        headers.extend_from_slice(&["SMS수신", "이메일수신", "카카오톡수신", "전화수신", "등록일"]);
        let rows = guardians.iter().map(|g| {
            vec![
                g.id.to_string(),
                g.name.clone(),
                g.relationship_type.label().to_string(),
                g.phone.clone(),
                exchange::text(&g.email),
                exchange::text(&g.occupation),
                exchange::text(&g.workplace),
                exchange::text(&g.work_phone),
                exchange::text(&g.postal_code),
                exchange::text(&g.road_address),
                exchange::text(&g.detail_address),
                exchange::yes_no(g.is_primary),
                exchange::yes_no(g.sms_enabled),
                exchange::yes_no(g.email_enabled),
                exchange::yes_no(g.kakao_enabled),
                exchange::yes_no(g.phone_enabled),
                g.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        });
        let n = exchange::write_sheet(path, &headers, rows)?;
        log::info!("exported {n} guardians to {}", path.to_string_lossy());
        Ok(n)
    }

    fn require(&self, id: i64) -> AppResult<Guardian> {
        fetch(self.conn, id)?
            .ok_or_else(|| AppError::not_found(format!("guardian {id} not found")))
    }
}

fn fetch(conn: &Connection, id: i64) -> AppResult<Option<Guardian>> {
    let sql = format!("SELECT {GUARDIAN_COLUMNS} FROM guardians WHERE id = ?");
    let guardian = conn.query_row(&sql, [id], Guardian::from_row).optional()?;
    Ok(guardian)
}

pub(crate) fn insert_guardian(conn: &Connection, input: &NewGuardian) -> AppResult<i64> {
    let name = require_text(&input.name, "name")?;
    let phone = require_text(&input.phone, "phone")?;
    let now = db::now();
    conn.execute(
        "INSERT INTO guardians(
           name, relationship_type, phone, email,
           postal_code, road_address, detail_address, extra_address,
           occupation, workplace, work_phone,
           emergency_contact_name, emergency_contact_relationship, emergency_contact_phone,
           is_primary, sms_enabled, email_enabled, kakao_enabled, phone_enabled,
           notes, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            name,
            input.relationship_type,
            phone,
            clean(input.email.clone()),
            clean(input.postal_code.clone()),
            clean(input.road_address.clone()),
            clean(input.detail_address.clone()),
            clean(input.extra_address.clone()),
            clean(input.occupation.clone()),
            clean(input.workplace.clone()),
            clean(input.work_phone.clone()),
            clean(input.emergency_contact_name.clone()),
            clean(input.emergency_contact_relationship.clone()),
            clean(input.emergency_contact_phone.clone()),
            input.is_primary,
            input.sms_enabled,
            input.email_enabled,
            input.kakao_enabled,
            input.phone_enabled,
            clean(input.notes.clone()),
            now,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("created guardian {id}");
    Ok(id)
}

fn truthy(cell: &str) -> bool {
    matches!(
        cell.to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1" | "o" | "예"
    )
}

fn guardian_from_row(row: &exchange::SheetRow<'_>) -> NewGuardian {
    NewGuardian {
        email: row.opt("이메일"),
        occupation: row.opt("직업"),
        workplace: row.opt("직장"),
        work_phone: row.opt("직장전화"),
        postal_code: row.opt("우편번호"),
        road_address: row.opt("주소"),
        detail_address: row.opt("상세주소"),
        is_primary: truthy(row.get("주보호자")),
        ..NewGuardian::new(
            row.get("이름"),
            RelationshipType::from_label(row.get("관계")),
            row.get("연락처"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewStudent;
    use crate::services::student::StudentService;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn conn() -> Connection {
        db::open_in_memory().expect("in-memory db")
    }

    fn guardian(svc: &GuardianService<'_>, name: &str, phone: &str) -> Guardian {
        svc.create(NewGuardian::new(name, RelationshipType::Mother, phone))
            .expect("create guardian")
    }

    fn student(conn: &Connection, name: &str) -> i64 {
        StudentService::new(conn)
            .create(NewStudent {
                name: name.to_string(),
                ..NewStudent::default()
            })
            .expect("create student")
            .id
    }

    fn temp_dir(prefix: &str) -> std::path::PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn create_requires_name_and_phone() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let err = svc
            .create(NewGuardian::new("", RelationshipType::Father, "010"))
            .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let err = svc
            .create(NewGuardian::new("아빠", RelationshipType::Father, " "))
            .unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let g = guardian(&svc, "엄마", "010-1234-5678");
        assert!(g.sms_enabled && g.email_enabled);
        assert!(!g.kakao_enabled && !g.phone_enabled);
    }

    #[test]
    fn phone_lookup_ignores_dashes() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let g = guardian(&svc, "엄마", "010-1234-5678");
        guardian(&svc, "다른", "010-9999-0000");
        let hits = svc.get_by_phone("12345678").expect("lookup");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, g.id);
        assert_eq!(svc.get_by_phone("1234-56").expect("lookup").len(), 1);
        assert!(svc.get_by_phone("---").expect("lookup").is_empty());
    }

    #[test]
    fn list_searches_name_phone_email_and_workplace() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        svc.create(NewGuardian {
            workplace: Some("Hanbit Bank".into()),
            ..NewGuardian::new("Lee", RelationshipType::Father, "010-1")
        })
        .expect("lee");
        svc.create(NewGuardian {
            email: Some("park@example.com".into()),
            ..NewGuardian::new("Park", RelationshipType::Mother, "010-2")
        })
        .expect("park");
        let names = |q: &str| {
            svc.list(&GuardianFilter {
                search: Some(q.into()),
                ..GuardianFilter::default()
            })
            .expect("list")
            .into_iter()
            .map(|g| g.name)
            .collect::<Vec<_>>()
        };
        assert_eq!(names("bank"), vec!["Lee"]);
        assert_eq!(names("EXAMPLE"), vec!["Park"]);
        assert_eq!(names("010").len(), 2);
    }

    #[test]
    fn update_and_missing_ids() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let g = guardian(&svc, "엄마", "010-1");
        let updated = svc
            .update(
                g.id,
                GuardianPatch {
                    kakao_enabled: Some(true),
                    workplace: Some("회사".into()),
                    ..GuardianPatch::default()
                },
            )
            .expect("update");
        assert!(updated.kakao_enabled);
        assert_eq!(updated.workplace.as_deref(), Some("회사"));
        assert_eq!(updated.phone, "010-1");

        let err = svc
            .update(999, GuardianPatch {
                notes: Some("x".into()),
                ..GuardianPatch::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert_eq!(svc.delete(999).unwrap_err().code(), "not_found");
        assert!(svc.get(999).expect("get").is_none());
    }

    #[test]
    fn delete_is_blocked_while_linked() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let g = guardian(&svc, "엄마", "010-1");
        let s1 = student(&conn, "하나");
        let s2 = student(&conn, "둘");
        svc.link_student(g.id, s1).expect("link");
        svc.link_student(g.id, s2).expect("link");

        let err = svc.delete(g.id).unwrap_err();
        assert_eq!(err.code(), "rule_violation");
        assert!(err.to_string().contains('2'), "{err}");
        assert!(svc.get(g.id).expect("get").is_some());

        svc.unlink_student(g.id, s1).expect("unlink");
        svc.unlink_student(g.id, s2).expect("unlink");
        svc.delete(g.id).expect("delete");
        assert!(svc.get(g.id).expect("get").is_none());
    }

    #[test]
    fn duplicates_group_by_exact_phone() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let a = guardian(&svc, "김", "010-1111-2222");
        let b = guardian(&svc, "김엄마", "010-1111-2222");
        guardian(&svc, "박", "010-3333-4444");
        guardian(&svc, "이", "01011112222");

        let groups = svc.find_duplicates().expect("duplicates");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 2);
        assert_eq!(
            groups[0].guardians,
            vec![
                DuplicateMember { id: a.id, name: "김".into() },
                DuplicateMember { id: b.id, name: "김엄마".into() },
            ]
        );
    }

    #[test]
    fn merge_moves_links_and_skips_collisions() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let primary = guardian(&svc, "A", "010-1");
        let dup = guardian(&svc, "A'", "010-1");
        let s1 = student(&conn, "s1");
        let s2 = student(&conn, "s2");
        svc.link_student(primary.id, s1).expect("link");
        svc.link_student(dup.id, s1).expect("link");
        svc.link_student(dup.id, s2).expect("link");

        let summary = svc
            .merge(primary.id, &[dup.id, primary.id, 4040])
            .expect("merge");
        assert_eq!(summary.merged_ids, vec![dup.id]);
        assert_eq!(summary.skipped_ids, vec![primary.id, 4040]);
        assert_eq!(summary.links_moved, 1);

        assert!(svc.get(dup.id).expect("get").is_none());
        let linked: Vec<i64> = svc
            .students(primary.id)
            .expect("students")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(linked, vec![s1, s2]);
        let dangling: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM student_guardians WHERE guardian_id = ?",
                [dup.id],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(dangling, 0);

        assert_eq!(svc.merge(777, &[primary.id]).unwrap_err().code(), "not_found");
    }

    #[test]
    fn merging_overlapping_duplicates_links_the_union() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let a = guardian(&svc, "A", "010-2");
        let b = guardian(&svc, "B", "010-2");
        let c = guardian(&svc, "C", "010-2");
        let s1 = student(&conn, "s1");
        let s2 = student(&conn, "s2");
        let s3 = student(&conn, "s3");
        svc.link_student(b.id, s1).expect("link");
        svc.link_student(b.id, s2).expect("link");
        svc.link_student(c.id, s2).expect("link");
        svc.link_student(c.id, s3).expect("link");

        let summary = svc.merge(a.id, &[b.id, c.id]).expect("merge");
        assert_eq!(summary.merged_ids, vec![b.id, c.id]);
        assert!(summary.skipped_ids.is_empty());
        assert_eq!(summary.links_moved, 3);

        let mut linked: Vec<i64> = svc
            .students(a.id)
            .expect("students")
            .iter()
            .map(|s| s.id)
            .collect();
        linked.sort_unstable();
        assert_eq!(linked, vec![s1, s2, s3]);
        assert!(svc.get(b.id).expect("get").is_none());
        assert!(svc.get(c.id).expect("get").is_none());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM student_guardians", [], |r| r.get(0))
            .expect("count");
        assert_eq!(rows, 3);
    }

    #[test]
    fn statistics_cover_relationships_channels_and_children() {
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let mom = guardian(&svc, "엄마", "010-1");
        svc.create(NewGuardian {
            kakao_enabled: true,
            sms_enabled: false,
            ..NewGuardian::new("아빠", RelationshipType::Father, "010-2")
        })
        .expect("dad");
        let s1 = student(&conn, "s1");
        let s2 = student(&conn, "s2");
        svc.link_student(mom.id, s1).expect("link");
        svc.link_student(mom.id, s2).expect("link");

        let stats = svc.statistics().expect("stats");
        assert_eq!(stats.total_guardians, 2);
        assert_eq!(stats.relationship_distribution["mother"], 1);
        assert_eq!(stats.relationship_distribution["uncle"], 0);
        assert_eq!(
            stats.communication,
            CommunicationCounts { sms: 1, email: 2, kakao: 1, phone: 0 }
        );
        assert_eq!(stats.children_distribution.get(&2), Some(&1));
        assert_eq!(stats.children_distribution.get(&0), Some(&1));
    }

    #[test]
    fn import_requires_phone_and_maps_labels() {
        let dir = temp_dir("academyd-guardian-import");
        let path = dir.join("guardians.csv");
        std::fs::write(
            &path,
            "이름,관계,연락처,주보호자\n\
             김엄마,어머니,010-1111-2222,Y\n\
             박할머니,할머니,010-3333-4444,\n\
             번호없음,아버지,,\n\
             최외삼촌,외삼촌,010-5555-6666,N\n",
        )
        .expect("write csv");
        let conn = conn();
        let svc = GuardianService::new(&conn);
        let summary = svc.import_file(&path, &Config::default()).expect("import");
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.error_count, 1);
        assert!(summary.errors[0].starts_with("row 4:"), "{:?}", summary.errors);

        let all = svc.list(&GuardianFilter::default()).expect("list");
        let by_name = |n: &str| all.iter().find(|g| g.name == n).expect(n);
        assert!(by_name("김엄마").is_primary);
        assert_eq!(
            by_name("박할머니").relationship_type,
            RelationshipType::Grandparent
        );
        assert_eq!(by_name("최외삼촌").relationship_type, RelationshipType::Other);
    }

    #[test]
    fn export_writes_header_and_flags() {
        let dir = temp_dir("academyd-guardian-export");
        let path = dir.join("guardians.csv");
        let conn = conn();
        let svc = GuardianService::new(&conn);
        svc.create(NewGuardian {
            is_primary: true,
            ..NewGuardian::new("엄마", RelationshipType::Mother, "010-1")
        })
        .expect("create");
        assert_eq!(
            svc.export_file(&path, &GuardianFilter::default()).expect("export"),
            1
        );
        let text = std::fs::read_to_string(&path).expect("read");
        let mut lines = text.trim_start_matches('\u{feff}').lines();
        let header = lines.next().expect("header");
        assert!(header.starts_with("ID,이름,관계,연락처"));
        assert!(header.ends_with("전화수신,등록일"));
        let row = lines.next().expect("row");
        assert!(row.contains(",엄마,어머니,010-1,"));
        assert!(row.contains(",Y,Y,Y,N,N,"), "{row}");
    }
}
