//! Donor database operations.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_blood_type, Database, DbError, DbResult};
use crate::models::Donor;

pub fn get_donor(conn: &Connection, id: &str) -> DbResult<Option<Donor>> {
    conn.query_row(
        r#"
        SELECT id, name, blood_type, last_donation_date, is_available, created_at
        FROM donors
        WHERE id = ?
        "#,
        [id],
        |row| {
            Ok(DonorRow {
                id: row.get(0)?,
                name: row.get(1)?,
                blood_type: row.get(2)?,
                last_donation_date: row.get(3)?,
                is_available: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Record a completed donation against the donor.
pub fn mark_donor_donated(conn: &Connection, id: &str, donation_date: NaiveDate) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE donors SET last_donation_date = ?2, is_available = 0 WHERE id = ?1",
        params![id, donation_date.to_string()],
    )?;
    Ok(rows_affected > 0)
}

pub fn set_donor_availability(conn: &Connection, id: &str, available: bool) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE donors SET is_available = ?2 WHERE id = ?1",
        params![id, available],
    )?;
    Ok(rows_affected > 0)
}

impl Database {
    /// Insert a new donor.
    pub fn insert_donor(&self, donor: &Donor) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO donors (id, name, blood_type, last_donation_date, is_available, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                donor.id,
                donor.name,
                donor.blood_type.label(),
                donor.last_donation_date.map(|d| d.to_string()),
                donor.is_available,
                donor.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a donor by ID.
    pub fn get_donor(&self, id: &str) -> DbResult<Option<Donor>> {
        get_donor(&self.conn, id)
    }

    /// Number of donors per blood type, indexed by `BloodType::index`.
    pub fn donor_counts(&self) -> DbResult<[u32; 8]> {
        let mut stmt = self
            .conn
            .prepare("SELECT blood_type, COUNT(*) FROM donors GROUP BY blood_type")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?;

        let mut counts = [0u32; 8];
        for row in rows {
            let (label, count) = row?;
            counts[parse_blood_type(&label)?.index()] = count;
        }
        Ok(counts)
    }

    /// Number of donors currently flagged available.
    pub fn available_donor_count(&self) -> DbResult<u32> {
        self.conn
            .query_row("SELECT COUNT(*) FROM donors WHERE is_available = 1", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

/// Intermediate row struct for database mapping.
struct DonorRow {
    id: String,
    name: String,
    blood_type: String,
    last_donation_date: Option<String>,
    is_available: bool,
    created_at: String,
}

impl TryFrom<DonorRow> for Donor {
    type Error = DbError;

    fn try_from(row: DonorRow) -> Result<Self, Self::Error> {
        let last_donation_date = row
            .last_donation_date
            .map(|s| parse_date(&s))
            .transpose()?;

        Ok(Donor {
            id: row.id,
            name: row.name,
            blood_type: parse_blood_type(&row.blood_type)?,
            last_donation_date,
            is_available: row.is_available,
            created_at: row.created_at,
        })
    }
}

pub(crate) fn parse_date(s: &str) -> DbResult<NaiveDate> {
    s.parse()
        .map_err(|_| DbError::Constraint(format!("Invalid date in database: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BloodType;

    #[test]
    fn test_insert_and_get_donor() {
        let db = Database::open_in_memory().unwrap();
        let mut donor = Donor::new("Ada".into(), BloodType::AbNeg);
        donor.last_donation_date = NaiveDate::from_ymd_opt(2024, 1, 15);
        db.insert_donor(&donor).unwrap();

        let retrieved = db.get_donor(&donor.id).unwrap().unwrap();
        assert_eq!(retrieved, donor);
    }
}
