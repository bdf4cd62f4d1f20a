use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;

use super::auth::Session;
use super::dashboard::{filter_bookings, select_apartment, sort_bookings, Period, DashboardQuery};
use super::AmountInput;
use crate::error::AppResult;
use crate::models::{Booking, CreatedBooking, NewBooking};
use crate::services::bookings;
use crate::services::state::AppState;

#[derive(Deserialize)]
pub struct CreateBookingPayload {
    pub apartment_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub net_revenue_dkk: AmountInput,
}

pub async fn get_bookings(
    _session: Session,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let current_year = Local::now().year();
    let period = Period::parse(query.year.as_deref(), current_year);

    let db = state.db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    let apartments = db.list_apartments()?;
    let selected = select_apartment(query.apartment.as_deref(), &apartments);
    let bookings = db.list_bookings(period.year())?;
    Ok(Json(filter_bookings(sort_bookings(bookings), &selected)))
}

pub async fn create_booking(
    _session: Session,
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingPayload>,
) -> AppResult<(StatusCode, Json<CreatedBooking>)> {
    let booking = NewBooking {
        apartment_id: payload.apartment_id.trim().to_string(),
        start_date: payload.start_date,
        end_date: payload.end_date,
        // unreadable amounts become zero and are rejected by validation
        net_revenue_dkk: payload.net_revenue_dkk.value().unwrap_or(0.0),
    };
    let created = bookings::create_booking(&state.db, booking)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_booking(
    _session: Session,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    bookings::remove_booking(&state.db, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
