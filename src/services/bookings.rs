use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::models::{CreatedBooking, NewBooking};
use crate::services::tax::compute_booking_tax;
use crate::utils::booking_year;

impl NewBooking {
    /// Rejects bookings the tax engine must never be asked to clamp away.
    pub fn validate(&self) -> AppResult<()> {
        if self.apartment_id.trim().is_empty() {
            return Err(AppError::InvalidBooking("apartment is required".to_string()));
        }
        if self.start_date > self.end_date {
            return Err(AppError::InvalidBooking(
                "start date must not be after end date".to_string(),
            ));
        }
        if !self.net_revenue_dkk.is_finite() || self.net_revenue_dkk <= 0.0 {
            return Err(AppError::InvalidBooking(
                "net revenue must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validates and stores a booking together with its tax snapshot.
///
/// The snapshot is computed against the revenue already booked in the
/// booking's tax year, using that year's settings as they are right now.
pub fn create_booking(
    db: &Arc<Mutex<Database>>,
    booking: NewBooking,
) -> AppResult<CreatedBooking> {
    booking.validate()?;
    let year = booking_year(booking.start_date);

    let mut db = db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    if db.get_apartment(&booking.apartment_id)?.is_none() {
        return Err(AppError::InvalidBooking(format!(
            "unknown apartment {}",
            booking.apartment_id
        )));
    }

    let settings = db.get_or_create_tax_settings(year)?.effective();
    let (booking_id, summary) = db.create_booking_with(&booking, year, |revenue_before| {
        compute_booking_tax(
            revenue_before,
            booking.net_revenue_dkk,
            settings.tax_rate,
            settings.bundfradrag,
        )
        .into_snapshot(year)
    })?;

    info!(
        booking_id = %booking_id,
        year,
        revenue_before = summary.total_revenue_before_dkk,
        tax_on_booking = summary.tax_on_booking_dkk,
        "Booking created"
    );
    Ok(CreatedBooking {
        booking_id,
        summary,
    })
}

/// Deletes a booking. Snapshots of later bookings keep the revenue-before
/// they were computed with.
pub fn remove_booking(db: &Arc<Mutex<Database>>, booking_id: &str) -> AppResult<()> {
    let db = db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    if !db.delete_booking(booking_id)? {
        return Err(AppError::NotFound(format!("booking {}", booking_id)));
    }
    info!(booking_id, "Booking deleted");
    Ok(())
}
