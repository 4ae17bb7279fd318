//! Blood request database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_blood_type, Database, DbError, DbResult};
use crate::models::{BloodRequest, BloodType, RequestStatus};

const REQUEST_COLUMNS: &str = "id, hospital_name, requested_blood_type, quantity_ml, status, is_emergency, notes, admin_notes, fulfilled_with, approved_at, approved_by, fulfilled_at, created_at";

fn read_request_row(row: &Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        hospital_name: row.get(1)?,
        requested_blood_type: row.get(2)?,
        quantity_ml: row.get(3)?,
        status: row.get(4)?,
        is_emergency: row.get(5)?,
        notes: row.get(6)?,
        admin_notes: row.get(7)?,
        fulfilled_with: row.get(8)?,
        approved_at: row.get(9)?,
        approved_by: row.get(10)?,
        fulfilled_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn collect_requests(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> DbResult<Vec<BloodRequest>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, read_request_row)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(row?.try_into()?);
    }
    Ok(requests)
}

pub fn get_request(conn: &Connection, id: &str) -> DbResult<Option<BloodRequest>> {
    let sql = format!("SELECT {} FROM blood_requests WHERE id = ?", REQUEST_COLUMNS);
    conn.query_row(&sql, [id], read_request_row)
        .optional()?
        .map(|row| row.try_into())
        .transpose()
}

/// Approve or reject an open request. Returns `false` when the stored status
/// is no longer `from`.
pub fn review_request(
    conn: &Connection,
    id: &str,
    from: RequestStatus,
    to: RequestStatus,
    actor: &str,
    admin_notes: Option<&str>,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE blood_requests SET
            status = ?3,
            approved_at = ?4,
            approved_by = ?5,
            admin_notes = COALESCE(?6, admin_notes)
        WHERE id = ?1 AND status = ?2
        "#,
        params![
            id,
            from.as_str(),
            to.as_str(),
            chrono::Utc::now().to_rfc3339(),
            actor,
            admin_notes,
        ],
    )?;
    Ok(rows_affected > 0)
}

/// Mark a request fulfilled with `used`. Returns `false` when the stored
/// status is no longer `from`.
pub fn fulfill_request(conn: &Connection, id: &str, from: RequestStatus, used: BloodType) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE blood_requests SET
            status = 'fulfilled',
            fulfilled_with = ?3,
            fulfilled_at = ?4
        WHERE id = ?1 AND status = ?2
        "#,
        params![id, from.as_str(), used.label(), chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(rows_affected > 0)
}

impl Database {
    /// Insert a new blood request.
    pub fn insert_request(&self, request: &BloodRequest) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO blood_requests (
                id, hospital_name, requested_blood_type, quantity_ml, status,
                is_emergency, notes, admin_notes, fulfilled_with,
                approved_at, approved_by, fulfilled_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                request.id,
                request.hospital_name,
                request.requested_blood_type.label(),
                request.quantity_ml,
                request.status.as_str(),
                request.is_emergency,
                request.notes,
                request.admin_notes,
                request.fulfilled_with.map(|t| t.label()),
                request.approved_at,
                request.approved_by,
                request.fulfilled_at,
                request.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a request by ID.
    pub fn get_request(&self, id: &str) -> DbResult<Option<BloodRequest>> {
        get_request(&self.conn, id)
    }

    /// All requests, newest first.
    pub fn list_requests(&self) -> DbResult<Vec<BloodRequest>> {
        let sql = format!(
            "SELECT {} FROM blood_requests ORDER BY created_at DESC",
            REQUEST_COLUMNS
        );
        collect_requests(&self.conn, &sql, [])
    }

    /// Open requests for review: emergencies first, then oldest first.
    pub fn list_open_requests(&self) -> DbResult<Vec<BloodRequest>> {
        let sql = format!(
            r#"
            SELECT {} FROM blood_requests
            WHERE status IN ('pending', 'approved')
            ORDER BY is_emergency DESC, created_at ASC
            "#,
            REQUEST_COLUMNS
        );
        collect_requests(&self.conn, &sql, [])
    }

    /// Count of requests in a status.
    pub fn count_requests(&self, status: RequestStatus) -> DbResult<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM blood_requests WHERE status = ?",
                [status.as_str()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Total number of requests.
    pub fn total_requests(&self) -> DbResult<u32> {
        self.conn
            .query_row("SELECT COUNT(*) FROM blood_requests", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Open request count and quantity per requested type, indexed by `BloodType::index`.
    pub fn open_request_totals(&self) -> DbResult<[(u32, i64); 8]> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT requested_blood_type, COUNT(*), SUM(quantity_ml)
            FROM blood_requests
            WHERE status IN ('pending', 'approved')
            GROUP BY requested_blood_type
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut totals = [(0u32, 0i64); 8];
        for row in rows {
            let (label, count, quantity) = row?;
            totals[parse_blood_type(&label)?.index()] = (count, quantity);
        }
        Ok(totals)
    }
}

/// Intermediate row struct for database mapping.
struct RequestRow {
    id: String,
    hospital_name: String,
    requested_blood_type: String,
    quantity_ml: i64,
    status: String,
    is_emergency: bool,
    notes: Option<String>,
    admin_notes: Option<String>,
    fulfilled_with: Option<String>,
    approved_at: Option<String>,
    approved_by: Option<String>,
    fulfilled_at: Option<String>,
    created_at: String,
}

impl TryFrom<RequestRow> for BloodRequest {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = RequestStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown request status: {}", row.status)))?;
        let fulfilled_with = row
            .fulfilled_with
            .as_deref()
            .map(parse_blood_type)
            .transpose()?;

        Ok(BloodRequest {
            id: row.id,
            hospital_name: row.hospital_name,
            requested_blood_type: parse_blood_type(&row.requested_blood_type)?,
            quantity_ml: row.quantity_ml,
            status,
            is_emergency: row.is_emergency,
            notes: row.notes,
            admin_notes: row.admin_notes,
            fulfilled_with,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            fulfilled_at: row.fulfilled_at,
            created_at: row.created_at,
        })
    }
}
