//! SQLite schema definition.

/// Connection pragmas applied on every open.
pub const PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA synchronous = FULL;
"#;

/// Complete database schema for the blood bank.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Blood Types (Reference Data - seeded once)
-- ============================================================================

CREATE TABLE IF NOT EXISTS blood_types (
    label TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    position INTEGER NOT NULL UNIQUE
);

INSERT OR IGNORE INTO blood_types (label, description, position) VALUES
    ('A+', 'A positive', 0),
    ('A-', 'A negative', 1),
    ('B+', 'B positive', 2),
    ('B-', 'B negative', 3),
    ('AB+', 'AB positive (universal recipient)', 4),
    ('AB-', 'AB negative', 5),
    ('O+', 'O positive', 6),
    ('O-', 'O negative (universal donor)', 7);

CREATE TRIGGER IF NOT EXISTS blood_types_no_delete BEFORE DELETE ON blood_types
BEGIN
    SELECT RAISE(ABORT, 'Blood types are reference data');
END;

-- ============================================================================
-- Donors
-- ============================================================================

CREATE TABLE IF NOT EXISTS donors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    blood_type TEXT NOT NULL REFERENCES blood_types(label),
    last_donation_date TEXT,                     -- YYYY-MM-DD
    is_available INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_donors_blood_type ON donors(blood_type);

-- ============================================================================
-- Donations (Mutable status - only completion touches the ledger)
-- ============================================================================

CREATE TABLE IF NOT EXISTS donations (
    id TEXT PRIMARY KEY,
    donor_id TEXT NOT NULL REFERENCES donors(id),
    quantity_ml INTEGER NOT NULL CHECK (quantity_ml > 0),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected', 'completed')),
    donation_date TEXT NOT NULL,                 -- YYYY-MM-DD
    notes TEXT,
    approved_at TEXT,
    approved_by TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_donations_donor ON donations(donor_id);
CREATE INDEX IF NOT EXISTS idx_donations_status ON donations(status);

-- ============================================================================
-- Blood Requests (Mutable status - only fulfillment touches the ledger)
-- ============================================================================

CREATE TABLE IF NOT EXISTS blood_requests (
    id TEXT PRIMARY KEY,
    hospital_name TEXT NOT NULL,
    requested_blood_type TEXT NOT NULL REFERENCES blood_types(label),
    quantity_ml INTEGER NOT NULL CHECK (quantity_ml > 0),
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected', 'fulfilled')),
    is_emergency INTEGER NOT NULL DEFAULT 0,
    notes TEXT,
    admin_notes TEXT,
    fulfilled_with TEXT REFERENCES blood_types(label),
    approved_at TEXT,
    approved_by TEXT,
    fulfilled_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK ((status = 'fulfilled') = (fulfilled_with IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_requests_status ON blood_requests(status);
CREATE INDEX IF NOT EXISTS idx_requests_blood_type ON blood_requests(requested_blood_type);

-- ============================================================================
-- Stock Ledger (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS ledger_events (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    blood_type TEXT NOT NULL REFERENCES blood_types(label),
    kind TEXT NOT NULL CHECK (kind IN ('collected', 'issued')),
    quantity_ml INTEGER NOT NULL CHECK (quantity_ml > 0),
    donation_id TEXT REFERENCES donations(id),
    request_id TEXT REFERENCES blood_requests(id),
    recorded_at TEXT NOT NULL,
    prev_hash TEXT NOT NULL,
    hash TEXT NOT NULL UNIQUE
);

-- A donation is collected at most once, a request issued at most once
CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_donation
    ON ledger_events(donation_id) WHERE donation_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_request
    ON ledger_events(request_id) WHERE request_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_ledger_type_kind ON ledger_events(blood_type, kind);

CREATE TRIGGER IF NOT EXISTS ledger_events_no_update BEFORE UPDATE ON ledger_events
BEGIN
    SELECT RAISE(ABORT, 'Ledger events are immutable');
END;

CREATE TRIGGER IF NOT EXISTS ledger_events_no_delete BEFORE DELETE ON ledger_events
BEGIN
    SELECT RAISE(ABORT, 'Ledger events are immutable');
END;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(PRAGMAS).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    fn insert_event(conn: &Connection, id: &str, kind: &str, qty: i64) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO ledger_events (id, blood_type, kind, quantity_ml, recorded_at, prev_hash, hash)
             VALUES (?1, 'O-', ?2, ?3, '2024-01-01T00:00:00Z', '', ?1)",
            rusqlite::params![id, kind, qty],
        )
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = setup();
        conn.execute_batch(SCHEMA).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blood_types", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 8);
    }

    #[test]
    fn test_blood_types_cannot_be_deleted() {
        let conn = setup();
        assert!(conn.execute("DELETE FROM blood_types WHERE label = 'O-'", []).is_err());
    }

    #[test]
    fn test_ledger_rejects_non_positive_quantity() {
        let conn = setup();
        assert!(insert_event(&conn, "e0", "collected", 0).is_err());
        assert!(insert_event(&conn, "e1", "collected", -10).is_err());
        assert!(insert_event(&conn, "e2", "collected", 10).is_ok());
    }

    #[test]
    fn test_ledger_is_append_only() {
        let conn = setup();
        insert_event(&conn, "e1", "collected", 500).unwrap();

        let update = conn.execute("UPDATE ledger_events SET quantity_ml = 1", []);
        assert!(update.is_err());

        let delete = conn.execute("DELETE FROM ledger_events", []);
        assert!(delete.is_err());
    }

    #[test]
    fn test_unknown_blood_type_rejected() {
        let conn = setup();
        let result = conn.execute(
            "INSERT INTO ledger_events (id, blood_type, kind, quantity_ml, recorded_at, prev_hash, hash)
             VALUES ('x', 'C+', 'collected', 5, 'now', '', 'x')",
            [],
        );
        assert!(result.is_err());
    }
}
