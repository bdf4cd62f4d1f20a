use chrono::Datelike;
use rusqlite::{
    params, Connection, OptionalExtension, Result as SqlResult, Row, TransactionBehavior,
};
use std::path::PathBuf;
use tracing::debug;

use crate::models::{
    Apartment, Booking, BookingCalculationSnapshot, NewBooking, TaxSettingsRecord,
    DEFAULT_BUNDFRADRAG_PLATFORM, DEFAULT_BUNDFRADRAG_PRIVATE, DEFAULT_TAX_RATE,
};
use crate::utils::now_rfc3339;

const DEFAULT_APARTMENTS: [&str; 2] = ["Vesterbro", "Århusgade"];
const LEGACY_APARTMENTS: [&str; 2] = ["Apartment 1", "Apartment 2"];

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: PathBuf) -> SqlResult<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> SqlResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = vec![
            (
                "001_create_apartments_and_bookings.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/001_create_apartments_and_bookings.sql"
                )),
            ),
            (
                "002_create_tax_settings.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/002_create_tax_settings.sql"
                )),
            ),
            (
                "003_create_booking_calculations.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/003_create_booking_calculations.sql"
                )),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                debug!(migration = name, "Applying migration");
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }

    /// Seeds the two default apartments, or renames the legacy placeholders.
    pub fn ensure_apartments(&self) -> SqlResult<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM apartments ORDER BY created_at, rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<SqlResult<Vec<_>>>()?;

        if !rows.is_empty() {
            let only_legacy = rows.len() == LEGACY_APARTMENTS.len()
                && rows
                    .iter()
                    .all(|(_, name)| LEGACY_APARTMENTS.contains(&name.as_str()));
            if only_legacy {
                for ((id, _), name) in rows.iter().zip(DEFAULT_APARTMENTS) {
                    self.conn.execute(
                        "UPDATE apartments SET name = ?1, ownership_share = 1 WHERE id = ?2",
                        params![name, id],
                    )?;
                }
            }
            return Ok(());
        }

        for name in DEFAULT_APARTMENTS {
            self.insert_apartment(name)?;
        }
        Ok(())
    }

    pub fn list_apartments(&self) -> SqlResult<Vec<Apartment>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, ownership_share FROM apartments ORDER BY name")?;
        let rows = stmt.query_map([], map_apartment)?;
        rows.collect()
    }

    pub fn get_apartment(&self, id: &str) -> SqlResult<Option<Apartment>> {
        self.conn
            .query_row(
                "SELECT id, name, ownership_share FROM apartments WHERE id = ?1",
                params![id],
                map_apartment,
            )
            .optional()
    }

    pub fn insert_apartment(&self, name: &str) -> SqlResult<Apartment> {
        let apartment = Apartment {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            ownership_share: 1.0,
        };
        self.conn.execute(
            "INSERT INTO apartments (id, name, ownership_share, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![apartment.id, apartment.name, apartment.ownership_share, now_rfc3339()],
        )?;
        Ok(apartment)
    }

    pub fn update_apartment(&self, id: &str, name: &str) -> SqlResult<bool> {
        let changed = self.conn.execute(
            "UPDATE apartments SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        Ok(changed > 0)
    }

    /// Returns the year's settings, inserting the defaults on first access.
    pub fn get_or_create_tax_settings(&self, year: i32) -> SqlResult<TaxSettingsRecord> {
        let existing = self
            .conn
            .query_row(
                "SELECT id, year, bundfradrag_platform_dkk, bundfradrag_private_dkk,
                        uses_platform, tax_rate
                 FROM tax_settings WHERE year = ?1",
                params![year],
                map_tax_settings,
            )
            .optional()?;
        if let Some(record) = existing {
            return Ok(record);
        }

        let record = TaxSettingsRecord {
            id: uuid::Uuid::new_v4().to_string(),
            year,
            bundfradrag_platform_dkk: DEFAULT_BUNDFRADRAG_PLATFORM,
            bundfradrag_private_dkk: DEFAULT_BUNDFRADRAG_PRIVATE,
            uses_platform: true,
            tax_rate: DEFAULT_TAX_RATE,
        };
        self.conn.execute(
            "INSERT INTO tax_settings (
                id, year, bundfradrag_platform_dkk, bundfradrag_private_dkk,
                uses_platform, tax_rate, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.year,
                record.bundfradrag_platform_dkk,
                record.bundfradrag_private_dkk,
                record.uses_platform,
                record.tax_rate,
                now_rfc3339()
            ],
        )?;
        debug!(year, "Created default tax settings");
        Ok(record)
    }

    pub fn get_tax_settings_by_id(&self, id: &str) -> SqlResult<Option<TaxSettingsRecord>> {
        self.conn
            .query_row(
                "SELECT id, year, bundfradrag_platform_dkk, bundfradrag_private_dkk,
                        uses_platform, tax_rate
                 FROM tax_settings WHERE id = ?1",
                params![id],
                map_tax_settings,
            )
            .optional()
    }

    pub fn update_tax_settings(&self, record: &TaxSettingsRecord) -> SqlResult<bool> {
        let changed = self.conn.execute(
            "UPDATE tax_settings
             SET bundfradrag_platform_dkk = ?1, bundfradrag_private_dkk = ?2, uses_platform = ?3,
                 tax_rate = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                record.bundfradrag_platform_dkk,
                record.bundfradrag_private_dkk,
                record.uses_platform,
                record.tax_rate,
                now_rfc3339(),
                record.id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Bookings with their apartment name and snapshot, newest start first.
    /// With a year, only bookings starting inside that year are returned.
    pub fn list_bookings(&self, year: Option<i32>) -> SqlResult<Vec<Booking>> {
        let (start, end) = match year {
            Some(year) => {
                let (start, end) = year_bounds(year);
                (Some(start), Some(end))
            }
            None => (None, None),
        };

        let mut stmt = self.conn.prepare(
            "SELECT b.id, b.apartment_id, a.name, b.start_date, b.end_date, b.net_revenue_dkk,
                    c.year, c.booking_revenue_dkk,
                    c.total_revenue_before_dkk, c.total_revenue_after_dkk,
                    c.bundfradrag_dkk, c.taxable_base_booking_dkk, c.tax_on_booking_dkk,
                    c.cut_after_tax_each_dkk, c.tax_rate
             FROM bookings b
             LEFT JOIN apartments a ON a.id = b.apartment_id
             LEFT JOIN booking_calculations c ON c.booking_id = b.id
             WHERE ?1 IS NULL OR (b.start_date >= ?1 AND b.start_date <= ?2)
             ORDER BY b.start_date DESC, b.end_date DESC",
        )?;

        let rows = stmt.query_map(params![start, end], map_booking)?;
        let bookings: Vec<Booking> = rows.collect::<SqlResult<_>>()?;
        debug!(?year, count = bookings.len(), "Loaded bookings");
        Ok(bookings)
    }

    pub fn total_revenue_for_year(&self, year: i32) -> SqlResult<f64> {
        total_revenue_for_year(&self.conn, year)
    }

    /// Reads the year's revenue so far, lets `calculate` turn it into a
    /// snapshot, then stores the booking and its snapshot. All three steps
    /// run in one write transaction so two bookings in the same year never
    /// see the same revenue-before.
    pub fn create_booking_with<F>(
        &mut self,
        booking: &NewBooking,
        year: i32,
        calculate: F,
    ) -> SqlResult<(String, BookingCalculationSnapshot)>
    where
        F: FnOnce(f64) -> BookingCalculationSnapshot,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let revenue_before = total_revenue_for_year(&tx, year)?;
        let snapshot = calculate(revenue_before);
        let booking_id = insert_booking(&tx, booking)?;
        upsert_booking_calculation(&tx, &booking_id, &snapshot)?;
        tx.commit()?;
        Ok((booking_id, snapshot))
    }

    pub fn delete_booking(&self, id: &str) -> SqlResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

fn year_bounds(year: i32) -> (String, String) {
    (format!("{:04}-01-01", year), format!("{:04}-12-31", year))
}

fn total_revenue_for_year(conn: &Connection, year: i32) -> SqlResult<f64> {
    let (start, end) = year_bounds(year);
    let total: Option<f64> = conn.query_row(
        "SELECT SUM(net_revenue_dkk) FROM bookings WHERE start_date >= ?1 AND start_date <= ?2",
        params![start, end],
        |row| row.get(0),
    )?;
    Ok(total.unwrap_or(0.0))
}

fn insert_booking(conn: &Connection, booking: &NewBooking) -> SqlResult<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO bookings (id, apartment_id, start_date, end_date, net_revenue_dkk, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            booking.apartment_id,
            booking.start_date,
            booking.end_date,
            booking.net_revenue_dkk,
            now_rfc3339()
        ],
    )?;
    Ok(id)
}

fn upsert_booking_calculation(
    conn: &Connection,
    booking_id: &str,
    snapshot: &BookingCalculationSnapshot,
) -> SqlResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO booking_calculations (
            booking_id, year, booking_revenue_dkk,
            total_revenue_before_dkk, total_revenue_after_dkk,
            bundfradrag_dkk, taxable_base_booking_dkk, tax_on_booking_dkk, cut_after_tax_each_dkk,
            tax_rate, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking_id,
            snapshot.year,
            snapshot.booking_revenue_dkk,
            snapshot.total_revenue_before_dkk,
            snapshot.total_revenue_after_dkk,
            snapshot.bundfradrag_dkk,
            snapshot.taxable_base_booking_dkk,
            snapshot.tax_on_booking_dkk,
            snapshot.cut_after_tax_each_dkk,
            snapshot.tax_rate,
            now_rfc3339()
        ],
    )?;
    Ok(())
}

fn map_apartment(row: &Row<'_>) -> SqlResult<Apartment> {
    Ok(Apartment {
        id: row.get(0)?,
        name: row.get(1)?,
        ownership_share: row.get(2)?,
    })
}

fn map_tax_settings(row: &Row<'_>) -> SqlResult<TaxSettingsRecord> {
    Ok(TaxSettingsRecord {
        id: row.get(0)?,
        year: row.get(1)?,
        bundfradrag_platform_dkk: row.get(2)?,
        bundfradrag_private_dkk: row.get(3)?,
        uses_platform: row.get(4)?,
        tax_rate: row.get(5)?,
    })
}

fn map_booking(row: &Row<'_>) -> SqlResult<Booking> {
    let start_date: chrono::NaiveDate = row.get(3)?;
    let calculation = match row.get::<_, Option<i32>>(6)? {
        Some(year) => Some(BookingCalculationSnapshot {
            year: if year == 0 { start_date.year() } else { year },
            booking_revenue_dkk: row.get(7)?,
            total_revenue_before_dkk: row.get(8)?,
            total_revenue_after_dkk: row.get(9)?,
            bundfradrag_dkk: row.get(10)?,
            taxable_base_booking_dkk: row.get(11)?,
            tax_on_booking_dkk: row.get(12)?,
            cut_after_tax_each_dkk: row.get(13)?,
            tax_rate: row.get(14)?,
        }),
        None => None,
    };

    Ok(Booking {
        id: row.get(0)?,
        apartment_id: row.get(1)?,
        apartment_name: row.get(2)?,
        start_date,
        end_date: row.get(4)?,
        net_revenue_dkk: row.get(5)?,
        calculation,
    })
}
