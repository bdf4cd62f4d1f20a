use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Local};
use serde::Deserialize;
use tracing::info;

use super::auth::Session;
use super::AmountInput;
use crate::error::{AppError, AppResult};
use crate::models::{Apartment, SettingsView, TaxSettingsRecord};
use crate::services::state::AppState;

#[derive(Deserialize)]
pub struct SettingsQuery {
    pub year: Option<i32>,
}

#[derive(Deserialize)]
pub struct TaxSettingsPayload {
    pub bundfradrag_dkk: AmountInput,
    /// Entered as a percentage, e.g. `35`.
    pub tax_rate_percent: AmountInput,
}

#[derive(Deserialize)]
pub struct ApartmentPayload {
    pub name: String,
}

pub async fn get_settings(
    _session: Session,
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> AppResult<Json<SettingsView>> {
    let year = query.year.unwrap_or_else(|| Local::now().year());
    let db = state.db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    db.ensure_apartments()?;
    let tax_settings = db.get_or_create_tax_settings(year)?;
    let apartments = db.list_apartments()?;
    Ok(Json(SettingsView {
        tax_settings,
        apartments,
    }))
}

pub async fn save_tax_settings(
    _session: Session,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TaxSettingsPayload>,
) -> AppResult<Json<TaxSettingsRecord>> {
    let bundfradrag = payload
        .bundfradrag_dkk
        .value()
        .ok_or_else(|| AppError::Validation("bundfradrag is not a number".to_string()))?;
    let tax_rate = payload
        .tax_rate_percent
        .value()
        .ok_or_else(|| AppError::Validation("tax rate is not a number".to_string()))?
        / 100.0;

    let db = state.db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    let current = db
        .get_tax_settings_by_id(&id)?
        .ok_or_else(|| AppError::NotFound(format!("tax settings {}", id)))?;
    let updated = TaxSettingsRecord {
        bundfradrag_platform_dkk: bundfradrag,
        bundfradrag_private_dkk: bundfradrag,
        uses_platform: true,
        tax_rate,
        ..current
    };
    db.update_tax_settings(&updated)?;

    info!(
        year = updated.year,
        bundfradrag,
        tax_rate,
        "Tax settings updated"
    );
    Ok(Json(updated))
}

pub async fn add_apartment(
    _session: Session,
    State(state): State<AppState>,
    Json(payload): Json<ApartmentPayload>,
) -> AppResult<(StatusCode, Json<Apartment>)> {
    let name = required_name(&payload.name)?;
    let db = state.db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    let apartment = db.insert_apartment(name)?;
    info!(apartment_id = %apartment.id, name, "Apartment added");
    Ok((StatusCode::CREATED, Json(apartment)))
}

pub async fn rename_apartment(
    _session: Session,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ApartmentPayload>,
) -> AppResult<StatusCode> {
    let name = required_name(&payload.name)?;
    let db = state.db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    if !db.update_apartment(&id, name)? {
        return Err(AppError::NotFound(format!("apartment {}", id)));
    }
    info!(apartment_id = %id, name, "Apartment renamed");
    Ok(StatusCode::NO_CONTENT)
}

fn required_name(raw: &str) -> AppResult<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    Ok(name)
}
