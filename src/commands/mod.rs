pub mod auth;
pub mod bookings;
pub mod dashboard;
pub mod settings;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::services::state::AppState;
use crate::utils::parse_amount;

/// An amount sent either as a JSON number or as text typed by a person.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    pub fn value(&self) -> Option<f64> {
        match self {
            AmountInput::Number(value) if value.is_finite() => Some(*value),
            AmountInput::Number(_) => None,
            AmountInput::Text(text) => parse_amount(text),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route(
            "/api/bookings",
            get(bookings::get_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:id", axum::routing::delete(bookings::delete_booking))
        .route("/api/settings", get(settings::get_settings))
        .route("/api/settings/tax/:id", put(settings::save_tax_settings))
        .route("/api/apartments", post(settings::add_apartment))
        .route("/api/apartments/:id", put(settings::rename_apartment))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
