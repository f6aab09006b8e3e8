use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::db::{CaseRecord, ResultRecord, StatusRecord};
use crate::types::TypeRef;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS case_state (
    id TEXT PRIMARY KEY NOT NULL,
    case_type TEXT NOT NULL,
    confidentiality TEXT NOT NULL,
    lifecycle TEXT NOT NULL,
    end_date TEXT,
    main_case TEXT,
    suspended INTEGER NOT NULL,
    suspension_reason TEXT,
    ever_suspended INTEGER NOT NULL,
    archive_nomination TEXT,
    archive_action_date TEXT,
    properties TEXT NOT NULL,
    decisions TEXT NOT NULL,
    related_end_dates TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_case_state_main ON case_state(main_case);
CREATE TABLE IF NOT EXISTS case_status (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id TEXT NOT NULL,
    status_type TEXT NOT NULL,
    set_at TEXT NOT NULL,
    is_final INTEGER NOT NULL,
    UNIQUE(case_id, set_at)
);
CREATE TABLE IF NOT EXISTS case_result (
    case_id TEXT PRIMARY KEY NOT NULL,
    result_type TEXT NOT NULL
);
"#;

const CASE_FIELDS: &str = "id, case_type, confidentiality, lifecycle, end_date, main_case, \
    suspended, suspension_reason, ever_suspended, archive_nomination, archive_action_date, \
    properties, decisions, related_end_dates";

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

pub fn create_case(tx: &Transaction, case: &CaseRecord) -> Result<()> {
    let sql = format!(
        "INSERT INTO case_state ({CASE_FIELDS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    debug!("Database create_case: {sql}, {case:?}");
    let raw = RawCase::from_record(case)?;
    tx.execute(
        &sql,
        params![
            raw.id,
            raw.case_type,
            raw.confidentiality,
            raw.lifecycle,
            raw.end_date,
            raw.main_case,
            raw.suspended,
            raw.suspension_reason,
            raw.ever_suspended,
            raw.archive_nomination,
            raw.archive_action_date,
            raw.properties,
            raw.decisions,
            raw.related_end_dates,
        ],
    )?;
    Ok(())
}

pub fn update_case(tx: &Transaction, case: &CaseRecord) -> Result<()> {
    let sql = r#"
    UPDATE case_state SET case_type = ?, confidentiality = ?, lifecycle = ?, end_date = ?,
        main_case = ?, suspended = ?, suspension_reason = ?, ever_suspended = ?,
        archive_nomination = ?, archive_action_date = ?, properties = ?, decisions = ?,
        related_end_dates = ?
    WHERE id = ?
    "#;
    debug!("Database update_case: {sql}, {case:?}");
    let raw = RawCase::from_record(case)?;
    tx.execute(
        sql,
        params![
            raw.case_type,
            raw.confidentiality,
            raw.lifecycle,
            raw.end_date,
            raw.main_case,
            raw.suspended,
            raw.suspension_reason,
            raw.ever_suspended,
            raw.archive_nomination,
            raw.archive_action_date,
            raw.properties,
            raw.decisions,
            raw.related_end_dates,
            raw.id,
        ],
    )?;
    Ok(())
}

pub fn get_case(tx: &Transaction, id: &str) -> Result<Option<CaseRecord>> {
    let sql = format!("SELECT {CASE_FIELDS} FROM case_state WHERE id = ?");
    debug!("Database get_case: {sql}, {id}");
    let raw = tx
        .query_row(&sql, params![id], RawCase::from_row)
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(raw.into_record()?)),
        None => Ok(None),
    }
}

pub fn list_sub_cases(tx: &Transaction, main_case: &str) -> Result<Vec<CaseRecord>> {
    let sql = format!("SELECT {CASE_FIELDS} FROM case_state WHERE main_case = ? ORDER BY id");
    debug!("Database list_sub_cases: {sql}, {main_case}");
    let mut stmt = tx.prepare(&sql)?;
    let raws = stmt
        .query_map(params![main_case], RawCase::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawCase::into_record).collect()
}

pub fn create_status(tx: &Transaction, status: &StatusRecord) -> Result<StatusRecord> {
    let sql = r#"
    INSERT INTO case_status (case_id, status_type, set_at, is_final)
    VALUES (?, ?, ?, ?)
    "#;
    debug!("Database create_status: {sql}, {status:?}");
    tx.execute(
        sql,
        params![
            status.case_id,
            status.status_type.key(),
            format_timestamp(&status.set_at),
            status.is_final,
        ],
    )?;

    let mut created = status.clone();
    created.id = tx.last_insert_rowid() as u64;
    Ok(created)
}

pub fn list_statuses(tx: &Transaction, case_id: &str) -> Result<Vec<StatusRecord>> {
    let sql = r#"
    SELECT id, case_id, status_type, set_at, is_final FROM case_status
    WHERE case_id = ?
    ORDER BY set_at, id
    "#;
    debug!("Database list_statuses: {sql}, {case_id}");
    let mut stmt = tx.prepare(sql)?;
    let raws = stmt
        .query_map(params![case_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raws.into_iter()
        .map(|(id, case_id, status_type, set_at, is_final)| {
            Ok(StatusRecord {
                id: id as u64,
                case_id,
                status_type: TypeRef::from_key(&status_type),
                set_at: parse_timestamp(&set_at)?,
                is_final,
            })
        })
        .collect()
}

pub fn save_result(tx: &Transaction, result: &ResultRecord) -> Result<()> {
    let sql = r#"
    INSERT INTO case_result (case_id, result_type) VALUES (?, ?)
    ON CONFLICT(case_id) DO UPDATE SET result_type = excluded.result_type
    "#;
    debug!("Database save_result: {sql}, {result:?}");
    tx.execute(sql, params![result.case_id, result.result_type.key()])?;
    Ok(())
}

pub fn get_result(tx: &Transaction, case_id: &str) -> Result<Option<ResultRecord>> {
    let sql = "SELECT result_type FROM case_result WHERE case_id = ?";
    debug!("Database get_result: {sql}, {case_id}");
    let result_type: Option<String> = tx
        .query_row(sql, params![case_id], |row| row.get(0))
        .optional()?;
    Ok(result_type.map(|r| ResultRecord {
        case_id: case_id.to_string(),
        result_type: TypeRef::from_key(&r),
    }))
}

// Timestamps are stored with fixed precision so equal instants compare equal
// in the UNIQUE(case_id, set_at) constraint.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw).with_context(|| format!("parse timestamp '{raw}'"))?;
    Ok(ts.with_timezone(&Utc))
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    match raw {
        Some(raw) => {
            let date = raw
                .parse::<NaiveDate>()
                .with_context(|| format!("parse date '{raw}'"))?;
            Ok(Some(date))
        }
        None => Ok(None),
    }
}

struct RawCase {
    id: String,
    case_type: String,
    confidentiality: String,
    lifecycle: String,
    end_date: Option<String>,
    main_case: Option<String>,
    suspended: bool,
    suspension_reason: Option<String>,
    ever_suspended: bool,
    archive_nomination: Option<String>,
    archive_action_date: Option<String>,
    properties: String,
    decisions: String,
    related_end_dates: String,
}

impl RawCase {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            case_type: row.get(1)?,
            confidentiality: row.get(2)?,
            lifecycle: row.get(3)?,
            end_date: row.get(4)?,
            main_case: row.get(5)?,
            suspended: row.get(6)?,
            suspension_reason: row.get(7)?,
            ever_suspended: row.get(8)?,
            archive_nomination: row.get(9)?,
            archive_action_date: row.get(10)?,
            properties: row.get(11)?,
            decisions: row.get(12)?,
            related_end_dates: row.get(13)?,
        })
    }

    fn from_record(case: &CaseRecord) -> Result<Self> {
        Ok(Self {
            id: case.id.clone(),
            case_type: case.case_type.key().to_string(),
            confidentiality: case.confidentiality.as_str().to_string(),
            lifecycle: case.lifecycle.as_str().to_string(),
            end_date: case.end_date.map(|d| d.to_string()),
            main_case: case.main_case.clone(),
            suspended: case.suspended,
            suspension_reason: case.suspension_reason.clone(),
            ever_suspended: case.ever_suspended,
            archive_nomination: case.archive_nomination.clone(),
            archive_action_date: case.archive_action_date.map(|d| d.to_string()),
            properties: serde_json::to_string(&case.properties)?,
            decisions: serde_json::to_string(&case.decisions)?,
            related_end_dates: serde_json::to_string(&case.related_end_dates)?,
        })
    }

    fn into_record(self) -> Result<CaseRecord> {
        Ok(CaseRecord {
            case_type: TypeRef::from_key(&self.case_type),
            confidentiality: self.confidentiality.parse()?,
            lifecycle: self.lifecycle.parse()?,
            end_date: parse_date(self.end_date)?,
            main_case: self.main_case,
            suspended: self.suspended,
            suspension_reason: self.suspension_reason,
            ever_suspended: self.ever_suspended,
            archive_nomination: self.archive_nomination,
            archive_action_date: parse_date(self.archive_action_date)?,
            properties: serde_json::from_str(&self.properties).context("decode properties")?,
            decisions: serde_json::from_str(&self.decisions).context("decode decisions")?,
            related_end_dates: serde_json::from_str(&self.related_end_dates)
                .context("decode related end dates")?,
            id: self.id,
        })
    }
}
