use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, Local, NaiveDate};
use rusqlite::Result as SqlResult;
use serde::Deserialize;
use std::cmp::Ordering;

use super::auth::Session;
use crate::db::Database;
use crate::error::AppResult;
use crate::models::{
    Apartment, ApartmentSummary, Booking, BookingCalculationSnapshot, DashboardStats, PeriodDisplay,
    TaxSettings,
};
use crate::services::state::AppState;
use crate::services::tax::{aggregate_period_tax, PeriodMode, PeriodTaxInput};
use crate::utils::{danish_cmp, format_dkk, format_percent};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const YEAR_OPTIONS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Year(i32),
    AllTime,
}

impl Period {
    /// `"all"` selects all time; a positive year selects that year; anything
    /// else falls back to the current year.
    pub fn parse(value: Option<&str>, current_year: i32) -> Self {
        match value.map(str::trim) {
            Some("all") => Period::AllTime,
            Some(raw) => match raw.parse::<i32>() {
                Ok(year) if year > 0 => Period::Year(year),
                _ => Period::Year(current_year),
            },
            None => Period::Year(current_year),
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            Period::Year(year) => Some(*year),
            Period::AllTime => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Period::Year(year) => year.to_string(),
            Period::AllTime => "all".to_string(),
        }
    }

    fn title(&self) -> String {
        match self {
            Period::Year(year) => format!("{} summary", year),
            Period::AllTime => "All time summary".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub year: Option<String>,
    pub apartment: Option<String>,
}

pub async fn get_dashboard(
    _session: Session,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<DashboardStats>> {
    let today = Local::now().date_naive();
    let period = Period::parse(query.year.as_deref(), today.year());

    let db = state.db.lock().map_err(|_| anyhow!("DB lock poisoned"))?;
    db.ensure_apartments()?;
    let stats = build_dashboard(&db, period, query.apartment.as_deref(), today.year())?;
    Ok(Json(stats))
}

pub fn build_dashboard(
    db: &Database,
    period: Period,
    apartment: Option<&str>,
    current_year: i32,
) -> SqlResult<DashboardStats> {
    let settings_year = period.year().unwrap_or(current_year);
    let apartments = db.list_apartments()?;
    let settings = db.get_or_create_tax_settings(settings_year)?.effective();
    let bookings = db.list_bookings(period.year())?;

    let selected_apartment = select_apartment(apartment, &apartments);
    let summaries: Vec<ApartmentSummary> = apartments
        .iter()
        .map(|apartment| summarize_apartment(apartment, &bookings, period, &settings))
        .collect();

    let overall_revenue: f64 = summaries.iter().map(|s| s.revenue_total).sum();
    let overall_tax_due: f64 = summaries.iter().map(|s| s.tax.tax_due).sum();
    let overall_net_after_tax: f64 = summaries.iter().map(|s| s.tax.net_after_tax).sum();

    Ok(DashboardStats {
        period: period.label(),
        title: period.title(),
        settings,
        selected_apartment: selected_apartment.clone(),
        overall_revenue,
        overall_tax_due,
        overall_net_after_tax,
        display: PeriodDisplay {
            revenue: format_dkk(overall_revenue),
            tax_due: format_dkk(overall_tax_due),
            net_after_tax: format_dkk(overall_net_after_tax),
            tax_rate: format_percent(settings.tax_rate),
        },
        apartments: summaries,
        chart_months: MONTHS.iter().map(|m| m.to_string()).collect(),
        bookings: filter_bookings(sort_bookings(bookings), &selected_apartment),
        year_options: (0..YEAR_OPTIONS).map(|offset| current_year - offset).collect(),
    })
}

/// `"all"` unless the requested id names a known apartment.
pub fn select_apartment(requested: Option<&str>, apartments: &[Apartment]) -> String {
    match requested {
        Some(id) if apartments.iter().any(|apt| apt.id == id) => id.to_string(),
        _ => "all".to_string(),
    }
}

fn summarize_apartment(
    apartment: &Apartment,
    bookings: &[Booking],
    period: Period,
    settings: &TaxSettings,
) -> ApartmentSummary {
    let own: Vec<&Booking> = bookings
        .iter()
        .filter(|booking| booking.apartment_id == apartment.id)
        .collect();
    let revenue_total: f64 = own.iter().map(|booking| booking.net_revenue_dkk).sum();
    let snapshots: Vec<BookingCalculationSnapshot> =
        own.iter().filter_map(|booking| booking.calculation).collect();
    let snapshots_complete = !own.is_empty() && snapshots.len() == own.len();

    let mode = match period {
        Period::AllTime if snapshots_complete => PeriodMode::SnapshotSum,
        _ => PeriodMode::Lump,
    };
    let input = PeriodTaxInput {
        total_revenue: revenue_total,
        ownership_share: apartment.ownership_share,
        snapshots: &snapshots,
        snapshots_complete,
    };
    let tax = aggregate_period_tax(mode, &input, settings);

    let mut monthly_revenue = vec![0.0; 12];
    let mut monthly_nights = vec![0u32; 12];
    for booking in &own {
        monthly_revenue[booking.start_date.month0() as usize] += booking.net_revenue_dkk;
        count_nights(&mut monthly_nights, booking, period);
    }

    ApartmentSummary {
        apartment: apartment.clone(),
        revenue_total,
        booking_count: own.len(),
        used_snapshots: mode == PeriodMode::SnapshotSum,
        tax,
        monthly_revenue,
        monthly_nights,
    }
}

/// Adds one night per day in `[start, end)` to its month, clipped to the
/// selected year.
pub fn count_nights(nights: &mut [u32], booking: &Booking, period: Period) {
    let (start, end) = match period {
        Period::AllTime => (booking.start_date, booking.end_date),
        Period::Year(year) => {
            let (Some(year_start), Some(next_year_start)) = (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year + 1, 1, 1),
            ) else {
                return;
            };
            (
                booking.start_date.max(year_start),
                booking.end_date.min(next_year_start),
            )
        }
    };

    for day in start.iter_days().take_while(|day| *day < end) {
        if let Some(slot) = nights.get_mut(day.month0() as usize) {
            *slot += 1;
        }
    }
}

/// Apartment name, then newest start, then newest end.
pub fn sort_bookings(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| {
        let by_apartment = danish_cmp(
            a.apartment_name.as_deref().unwrap_or(""),
            b.apartment_name.as_deref().unwrap_or(""),
        );
        if by_apartment != Ordering::Equal {
            return by_apartment;
        }
        b.start_date
            .cmp(&a.start_date)
            .then_with(|| b.end_date.cmp(&a.end_date))
    });
    bookings
}

pub fn filter_bookings(bookings: Vec<Booking>, selected_apartment: &str) -> Vec<Booking> {
    if selected_apartment == "all" {
        return bookings;
    }
    bookings
        .into_iter()
        .filter(|booking| booking.apartment_id == selected_apartment)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(apartment: &str, name: &str, start: NaiveDate, end: NaiveDate) -> Booking {
        Booking {
            id: format!("{}-{}", apartment, start),
            apartment_id: apartment.to_string(),
            apartment_name: Some(name.to_string()),
            start_date: start,
            end_date: end,
            net_revenue_dkk: 1_000.0,
            calculation: None,
        }
    }

    #[test]
    fn parses_period() {
        assert_eq!(Period::parse(Some("all"), 2025), Period::AllTime);
        assert_eq!(Period::parse(Some("2023"), 2025), Period::Year(2023));
        assert_eq!(Period::parse(Some("-4"), 2025), Period::Year(2025));
        assert_eq!(Period::parse(Some("soon"), 2025), Period::Year(2025));
        assert_eq!(Period::parse(None, 2025), Period::Year(2025));
    }

    #[test]
    fn end_date_is_exclusive() {
        let mut nights = vec![0; 12];
        let stay = booking("a", "A", date(2024, 3, 10), date(2024, 3, 13));
        count_nights(&mut nights, &stay, Period::Year(2024));
        assert_eq!(nights[2], 3);
        assert_eq!(nights.iter().sum::<u32>(), 3);
    }

    #[test]
    fn nights_split_across_months() {
        let mut nights = vec![0; 12];
        let stay = booking("a", "A", date(2024, 1, 30), date(2024, 2, 2));
        count_nights(&mut nights, &stay, Period::Year(2024));
        assert_eq!(nights[0], 2);
        assert_eq!(nights[1], 1);
    }

    #[test]
    fn nights_clipped_to_selected_year() {
        let stay = booking("a", "A", date(2024, 12, 30), date(2025, 1, 3));

        let mut year = vec![0; 12];
        count_nights(&mut year, &stay, Period::Year(2024));
        assert_eq!(year[11], 2);
        assert_eq!(year[0], 0);

        let mut all = vec![0; 12];
        count_nights(&mut all, &stay, Period::AllTime);
        assert_eq!(all[11], 2);
        assert_eq!(all[0], 2);
    }

    #[test]
    fn same_day_booking_has_no_nights() {
        let mut nights = vec![0; 12];
        let stay = booking("a", "A", date(2024, 6, 1), date(2024, 6, 1));
        count_nights(&mut nights, &stay, Period::Year(2024));
        assert_eq!(nights.iter().sum::<u32>(), 0);
    }

    #[test]
    fn sorts_by_apartment_then_newest() {
        let sorted = sort_bookings(vec![
            booking("b", "Århusgade", date(2024, 1, 1), date(2024, 1, 3)),
            booking("a", "Vesterbro", date(2024, 1, 1), date(2024, 1, 2)),
            booking("a", "Vesterbro", date(2024, 5, 1), date(2024, 5, 2)),
            booking("a", "Vesterbro", date(2024, 1, 1), date(2024, 1, 5)),
        ]);
        let order: Vec<_> = sorted
            .iter()
            .map(|b| (b.apartment_id.as_str(), b.start_date, b.end_date))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", date(2024, 5, 1), date(2024, 5, 2)),
                ("a", date(2024, 1, 1), date(2024, 1, 5)),
                ("a", date(2024, 1, 1), date(2024, 1, 2)),
                ("b", date(2024, 1, 1), date(2024, 1, 3)),
            ]
        );
    }

    #[test]
    fn lump_applies_the_apartment_share() {
        let settings = TaxSettings {
            year: 2024,
            bundfradrag: 33_500.0,
            tax_rate: 0.35,
        };
        let mut stay = booking("a", "Vesterbro", date(2024, 3, 1), date(2024, 3, 4));
        stay.net_revenue_dkk = 100_000.0;
        let mut apartment = Apartment {
            id: "a".to_string(),
            name: "Vesterbro".to_string(),
            ownership_share: 1.0,
        };

        let full = summarize_apartment(&apartment, &[stay.clone()], Period::Year(2024), &settings);
        assert_eq!(full.tax.owner_revenue, 100_000.0);
        assert_eq!(full.tax.owner_bundfradrag, 33_500.0);

        apartment.ownership_share = 0.5;
        let half = summarize_apartment(&apartment, &[stay], Period::Year(2024), &settings);
        assert_eq!(half.revenue_total, 100_000.0);
        assert_eq!(half.tax.owner_revenue, 50_000.0);
        assert_eq!(half.tax.owner_bundfradrag, 16_750.0);
        assert!(!half.used_snapshots);
    }

    #[test]
    fn unknown_apartment_selects_all() {
        let apartments = vec![Apartment {
            id: "a".to_string(),
            name: "Vesterbro".to_string(),
            ownership_share: 1.0,
        }];
        assert_eq!(select_apartment(Some("a"), &apartments), "a");
        assert_eq!(select_apartment(Some("zzz"), &apartments), "all");
        assert_eq!(select_apartment(None, &apartments), "all");
    }
}
