//! Donation database operations.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_blood_type, parse_date, Database, DbError, DbResult};
use crate::models::{Donation, DonationStatus, MonthlyDonationStat};

const DONATION_COLUMNS: &str = "id, donor_id, quantity_ml, status, donation_date, notes, approved_at, approved_by, completed_at, created_at";

fn read_donation_row(row: &Row<'_>) -> rusqlite::Result<DonationRow> {
    Ok(DonationRow {
        id: row.get(0)?,
        donor_id: row.get(1)?,
        quantity_ml: row.get(2)?,
        status: row.get(3)?,
        donation_date: row.get(4)?,
        notes: row.get(5)?,
        approved_at: row.get(6)?,
        approved_by: row.get(7)?,
        completed_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn get_donation(conn: &Connection, id: &str) -> DbResult<Option<Donation>> {
    let sql = format!("SELECT {} FROM donations WHERE id = ?", DONATION_COLUMNS);
    conn.query_row(&sql, [id], read_donation_row)
        .optional()?
        .map(|row| row.try_into())
        .transpose()
}

/// Move a donation from `from` to `to`. Returns `false` when the stored
/// status is no longer `from`, so concurrent transitions cannot both win.
pub fn transition_donation(
    conn: &Connection,
    id: &str,
    from: DonationStatus,
    to: DonationStatus,
    actor: Option<&str>,
    notes: Option<&str>,
) -> DbResult<bool> {
    let now = chrono::Utc::now().to_rfc3339();
    let rows_affected = conn.execute(
        r#"
        UPDATE donations SET
            status = ?3,
            approved_at = CASE WHEN ?3 IN ('approved', 'rejected') THEN ?6 ELSE approved_at END,
            approved_by = COALESCE(?4, approved_by),
            notes = COALESCE(?5, notes),
            completed_at = CASE WHEN ?3 = 'completed' THEN ?6 ELSE completed_at END
        WHERE id = ?1 AND status = ?2
        "#,
        params![id, from.as_str(), to.as_str(), actor, notes, now],
    )?;
    Ok(rows_affected > 0)
}

impl Database {
    /// Insert a new donation.
    pub fn insert_donation(&self, donation: &Donation) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO donations (
                id, donor_id, quantity_ml, status, donation_date,
                notes, approved_at, approved_by, completed_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                donation.id,
                donation.donor_id,
                donation.quantity_ml,
                donation.status.as_str(),
                donation.donation_date.to_string(),
                donation.notes,
                donation.approved_at,
                donation.approved_by,
                donation.completed_at,
                donation.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a donation by ID.
    pub fn get_donation(&self, id: &str) -> DbResult<Option<Donation>> {
        get_donation(&self.conn, id)
    }

    /// Donations by status, newest first.
    pub fn list_donations_by_status(&self, status: DonationStatus) -> DbResult<Vec<Donation>> {
        let sql = format!(
            "SELECT {} FROM donations WHERE status = ? ORDER BY created_at DESC",
            DONATION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([status.as_str()], read_donation_row)?;

        let mut donations = Vec::new();
        for row in rows {
            donations.push(row?.try_into()?);
        }
        Ok(donations)
    }

    /// Count of donations in a status.
    pub fn count_donations(&self, status: DonationStatus) -> DbResult<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM donations WHERE status = ?",
                [status.as_str()],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Completed donations per donor blood type, indexed by `BloodType::index`.
    pub fn completed_donation_counts(&self) -> DbResult<[u32; 8]> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.blood_type, COUNT(*)
            FROM donations n JOIN donors d ON d.id = n.donor_id
            WHERE n.status = 'completed'
            GROUP BY d.blood_type
            "#,
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?;

        let mut counts = [0u32; 8];
        for row in rows {
            let (label, count) = row?;
            counts[parse_blood_type(&label)?.index()] = count;
        }
        Ok(counts)
    }

    /// Completed donations grouped by month of `donation_date`, newest first.
    pub fn monthly_completed_donations(&self, limit: usize) -> DbResult<Vec<MonthlyDonationStat>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT substr(donation_date, 1, 7) AS month, COUNT(*), SUM(quantity_ml)
            FROM donations
            WHERE status = 'completed'
            GROUP BY month
            ORDER BY month DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(MonthlyDonationStat {
                month: row.get(0)?,
                count: row.get(1)?,
                total_ml: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Intermediate row struct for database mapping.
struct DonationRow {
    id: String,
    donor_id: String,
    quantity_ml: i64,
    status: String,
    donation_date: String,
    notes: Option<String>,
    approved_at: Option<String>,
    approved_by: Option<String>,
    completed_at: Option<String>,
    created_at: String,
}

impl TryFrom<DonationRow> for Donation {
    type Error = DbError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        let status = DonationStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown donation status: {}", row.status)))?;
        let donation_date: NaiveDate = parse_date(&row.donation_date)?;

        Ok(Donation {
            id: row.id,
            donor_id: row.donor_id,
            quantity_ml: row.quantity_ml,
            status,
            donation_date,
            notes: row.notes,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}
