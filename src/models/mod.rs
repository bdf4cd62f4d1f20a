use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BUNDFRADRAG_PLATFORM: f64 = 33_500.0;
pub const DEFAULT_BUNDFRADRAG_PRIVATE: f64 = 13_100.0;
pub const DEFAULT_TAX_RATE: f64 = 0.35;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Apartment {
    pub id: String,
    pub name: String,
    pub ownership_share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub apartment_id: String,
    pub apartment_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub net_revenue_dkk: f64,
    pub calculation: Option<BookingCalculationSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub apartment_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub net_revenue_dkk: f64,
}

/// Tax attributable to exactly one booking, frozen at insertion time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingCalculationSnapshot {
    pub year: i32,
    pub booking_revenue_dkk: f64,
    pub total_revenue_before_dkk: f64,
    pub total_revenue_after_dkk: f64,
    pub bundfradrag_dkk: f64,
    pub taxable_base_booking_dkk: f64,
    pub tax_on_booking_dkk: f64,
    pub cut_after_tax_each_dkk: f64,
    pub tax_rate: f64,
}

/// The values the tax engine reads for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxSettings {
    pub year: i32,
    pub bundfradrag: f64,
    pub tax_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSettingsRecord {
    pub id: String,
    pub year: i32,
    pub bundfradrag_platform_dkk: f64,
    pub bundfradrag_private_dkk: f64,
    pub uses_platform: bool,
    pub tax_rate: f64,
}

impl TaxSettingsRecord {
    pub fn effective(&self) -> TaxSettings {
        let bundfradrag = if self.uses_platform {
            self.bundfradrag_platform_dkk
        } else {
            self.bundfradrag_private_dkk
        };
        TaxSettings {
            year: self.year,
            bundfradrag,
            tax_rate: self.tax_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingTaxResult {
    pub booking_revenue: f64,
    pub total_revenue_before: f64,
    pub total_revenue_after: f64,
    pub bundfradrag: f64,
    pub taxable_base_booking: f64,
    pub tax_on_booking: f64,
    pub cut_after_tax_each: f64,
    pub tax_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTaxResult {
    pub owner_revenue: f64,
    pub owner_bundfradrag: f64,
    pub taxable_base: f64,
    pub tax_due: f64,
    pub net_after_tax: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedBooking {
    pub booking_id: String,
    pub summary: BookingCalculationSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApartmentSummary {
    pub apartment: Apartment,
    pub revenue_total: f64,
    pub booking_count: usize,
    pub used_snapshots: bool,
    pub tax: PeriodTaxResult,
    pub monthly_revenue: Vec<f64>,
    pub monthly_nights: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodDisplay {
    pub revenue: String,
    pub tax_due: String,
    pub net_after_tax: String,
    pub tax_rate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub period: String,
    pub title: String,
    pub settings: TaxSettings,
    pub selected_apartment: String,
    pub overall_revenue: f64,
    pub overall_tax_due: f64,
    pub overall_net_after_tax: f64,
    pub display: PeriodDisplay,
    pub apartments: Vec<ApartmentSummary>,
    pub chart_months: Vec<String>,
    pub bookings: Vec<Booking>,
    pub year_options: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsView {
    pub tax_settings: TaxSettingsRecord,
    pub apartments: Vec<Apartment>,
}
