//! Stock ledger database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use super::{parse_blood_type, Database, DbError, DbResult};
use crate::models::{BloodType, LedgerEvent, LedgerEventKind, NewLedgerEvent};

/// Collected and issued totals for one blood type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeTotals {
    pub collected_ml: i64,
    pub issued_ml: i64,
}

impl TypeTotals {
    pub fn available_ml(&self) -> i64 {
        self.collected_ml - self.issued_ml
    }
}

/// Compute SHA-256 over the previous hash and an event payload.
pub fn chain_hash(prev_hash: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Append one event. Must run inside the caller's transaction so the read of
/// the chain head and the insert are atomic.
pub fn insert_ledger_event(conn: &Connection, event: &NewLedgerEvent) -> DbResult<LedgerEvent> {
    if event.quantity_ml <= 0 {
        return Err(DbError::Constraint(format!(
            "Ledger quantity must be positive, got {}",
            event.quantity_ml
        )));
    }

    let head: Option<(i64, String)> = conn
        .query_row(
            "SELECT sequence, hash FROM ledger_events ORDER BY sequence DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let (last_sequence, prev_hash) = head.unwrap_or((0, String::new()));

    let mut appended = LedgerEvent {
        id: uuid::Uuid::new_v4().to_string(),
        sequence: last_sequence + 1,
        blood_type: event.blood_type,
        kind: event.kind,
        quantity_ml: event.quantity_ml,
        donation_id: event.donation_id.clone(),
        request_id: event.request_id.clone(),
        recorded_at: chrono::Utc::now().to_rfc3339(),
        prev_hash,
        hash: String::new(),
    };
    appended.hash = chain_hash(&appended.prev_hash, &appended.to_canonical_json()?);

    conn.execute(
        r#"
        INSERT INTO ledger_events (
            sequence, id, blood_type, kind, quantity_ml,
            donation_id, request_id, recorded_at, prev_hash, hash
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            appended.sequence,
            appended.id,
            appended.blood_type.label(),
            appended.kind.as_str(),
            appended.quantity_ml,
            appended.donation_id,
            appended.request_id,
            appended.recorded_at,
            appended.prev_hash,
            appended.hash,
        ],
    )?;

    Ok(appended)
}

/// Collected and issued totals per type, indexed by [`BloodType::index`].
pub fn ledger_totals(conn: &Connection) -> DbResult<[TypeTotals; 8]> {
    let mut stmt = conn.prepare(
        r#"
        SELECT blood_type,
               COALESCE(SUM(CASE WHEN kind = 'collected' THEN quantity_ml END), 0),
               COALESCE(SUM(CASE WHEN kind = 'issued' THEN quantity_ml END), 0)
        FROM ledger_events
        GROUP BY blood_type
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
    })?;

    let mut totals = [TypeTotals::default(); 8];
    for row in rows {
        let (label, collected_ml, issued_ml) = row?;
        let blood_type = parse_blood_type(&label)?;
        totals[blood_type.index()] = TypeTotals {
            collected_ml,
            issued_ml,
        };
    }
    Ok(totals)
}

/// Collected and issued totals for a single type.
pub fn ledger_totals_for(conn: &Connection, blood_type: BloodType) -> DbResult<TypeTotals> {
    conn.query_row(
        r#"
        SELECT COALESCE(SUM(CASE WHEN kind = 'collected' THEN quantity_ml END), 0),
               COALESCE(SUM(CASE WHEN kind = 'issued' THEN quantity_ml END), 0)
        FROM ledger_events
        WHERE blood_type = ?
        "#,
        [blood_type.label()],
        |row| {
            Ok(TypeTotals {
                collected_ml: row.get(0)?,
                issued_ml: row.get(1)?,
            })
        },
    )
    .map_err(Into::into)
}

const EVENT_COLUMNS: &str = "sequence, id, blood_type, kind, quantity_ml, donation_id, request_id, recorded_at, prev_hash, hash";

fn read_event_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        sequence: row.get(0)?,
        id: row.get(1)?,
        blood_type: row.get(2)?,
        kind: row.get(3)?,
        quantity_ml: row.get(4)?,
        donation_id: row.get(5)?,
        request_id: row.get(6)?,
        recorded_at: row.get(7)?,
        prev_hash: row.get(8)?,
        hash: row.get(9)?,
    })
}

/// All events in append order, optionally restricted to one type.
pub fn list_ledger_events(conn: &Connection, blood_type: Option<BloodType>) -> DbResult<Vec<LedgerEvent>> {
    let sql = format!(
        "SELECT {} FROM ledger_events WHERE (?1 IS NULL OR blood_type = ?1) ORDER BY sequence",
        EVENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([blood_type.map(|t| t.label())], read_event_row)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?.try_into()?);
    }
    Ok(events)
}

/// The event that issued stock for a request, if any.
pub fn find_issue_for_request(conn: &Connection, request_id: &str) -> DbResult<Option<LedgerEvent>> {
    let sql = format!("SELECT {} FROM ledger_events WHERE request_id = ?", EVENT_COLUMNS);
    conn.query_row(&sql, [request_id], read_event_row)
        .optional()?
        .map(|row| row.try_into())
        .transpose()
}

impl Database {
    /// Append one event in its own transaction.
    pub fn append_ledger_event(&mut self, event: &NewLedgerEvent) -> DbResult<LedgerEvent> {
        let tx = self.transaction()?;
        let appended = insert_ledger_event(&tx, event)?;
        tx.commit()?;
        Ok(appended)
    }

    /// Collected and issued totals per type.
    pub fn ledger_totals(&self) -> DbResult<[TypeTotals; 8]> {
        ledger_totals(&self.conn)
    }

    /// Collected and issued totals for one type.
    pub fn ledger_totals_for(&self, blood_type: BloodType) -> DbResult<TypeTotals> {
        ledger_totals_for(&self.conn, blood_type)
    }

    /// Events in append order.
    pub fn list_ledger_events(&self, blood_type: Option<BloodType>) -> DbResult<Vec<LedgerEvent>> {
        list_ledger_events(&self.conn, blood_type)
    }

    /// Number of appended events.
    pub fn ledger_len(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_events", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Intermediate row struct for database mapping.
struct EventRow {
    sequence: i64,
    id: String,
    blood_type: String,
    kind: String,
    quantity_ml: i64,
    donation_id: Option<String>,
    request_id: Option<String>,
    recorded_at: String,
    prev_hash: String,
    hash: String,
}

impl TryFrom<EventRow> for LedgerEvent {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind = LedgerEventKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown ledger event kind: {}", row.kind)))?;

        Ok(LedgerEvent {
            id: row.id,
            sequence: row.sequence,
            blood_type: parse_blood_type(&row.blood_type)?,
            kind,
            quantity_ml: row.quantity_ml,
            donation_id: row.donation_id,
            request_id: row.request_id,
            recorded_at: row.recorded_at,
            prev_hash: row.prev_hash,
            hash: row.hash,
        })
    }
}
