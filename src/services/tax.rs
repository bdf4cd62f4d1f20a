//! Danish short-term-rental tax estimate ("bundfradrag" method).
//!
//! 60% of gross revenue above the yearly allowance is taxable. Two entry
//! points share that rule: [`compute_booking_tax`] attributes tax to a single
//! booking given the revenue already booked that year, and
//! [`aggregate_period_tax`] produces the figures shown for a whole period.

use tracing::warn;

use crate::models::{
    BookingCalculationSnapshot, BookingTaxResult, PeriodTaxResult, TaxSettings,
};
use crate::utils::{clamp_ratio, non_negative, round_money};

/// Share of revenue above the allowance that counts as taxable income.
pub const TAXABLE_SHARE: f64 = 0.6;

/// Net proceeds are split evenly between this many owners.
pub const DEFAULT_STAKEHOLDERS: u32 = 2;

fn taxable_income(revenue: f64, bundfradrag: f64) -> f64 {
    non_negative(revenue - bundfradrag) * TAXABLE_SHARE
}

/// Tax attributable to one booking, given the same-year revenue booked before it.
///
/// Out-of-range inputs are clamped, never rejected: negative amounts become
/// zero and the rate is forced into `[0, 1]`. Values are returned at full
/// precision; round with [`BookingTaxResult::rounded`] before storing.
pub fn compute_booking_tax(
    existing_revenue: f64,
    net_revenue: f64,
    tax_rate: f64,
    bundfradrag: f64,
) -> BookingTaxResult {
    compute_booking_tax_split(
        existing_revenue,
        net_revenue,
        tax_rate,
        bundfradrag,
        DEFAULT_STAKEHOLDERS,
    )
}

pub fn compute_booking_tax_split(
    existing_revenue: f64,
    net_revenue: f64,
    tax_rate: f64,
    bundfradrag: f64,
    stakeholders: u32,
) -> BookingTaxResult {
    let tax_rate = clamp_ratio(tax_rate);
    let existing_revenue = non_negative(existing_revenue);
    let booking_revenue = non_negative(net_revenue);
    let bundfradrag = non_negative(bundfradrag);
    let stakeholders = stakeholders.max(1);

    let total_revenue_after = existing_revenue + booking_revenue;
    let taxable_before = taxable_income(existing_revenue, bundfradrag);
    let taxable_after = taxable_income(total_revenue_after, bundfradrag);
    let taxable_base_booking = non_negative(taxable_after - taxable_before);
    let tax_on_booking = taxable_base_booking * tax_rate;
    let cut_after_tax_each =
        non_negative(booking_revenue - tax_on_booking) / f64::from(stakeholders);

    BookingTaxResult {
        booking_revenue,
        total_revenue_before: existing_revenue,
        total_revenue_after,
        bundfradrag,
        taxable_base_booking,
        tax_on_booking,
        cut_after_tax_each,
        tax_rate,
    }
}

impl BookingTaxResult {
    pub fn rounded(&self) -> Self {
        BookingTaxResult {
            booking_revenue: round_money(self.booking_revenue),
            total_revenue_before: round_money(self.total_revenue_before),
            total_revenue_after: round_money(self.total_revenue_after),
            bundfradrag: round_money(self.bundfradrag),
            taxable_base_booking: round_money(self.taxable_base_booking),
            tax_on_booking: round_money(self.tax_on_booking),
            cut_after_tax_each: round_money(self.cut_after_tax_each),
            tax_rate: round_money(self.tax_rate),
        }
    }

    pub fn into_snapshot(self, year: i32) -> BookingCalculationSnapshot {
        let rounded = self.rounded();
        BookingCalculationSnapshot {
            year,
            booking_revenue_dkk: rounded.booking_revenue,
            total_revenue_before_dkk: rounded.total_revenue_before,
            total_revenue_after_dkk: rounded.total_revenue_after,
            bundfradrag_dkk: rounded.bundfradrag,
            taxable_base_booking_dkk: rounded.taxable_base_booking,
            tax_on_booking_dkk: rounded.tax_on_booking,
            cut_after_tax_each_dkk: rounded.cut_after_tax_each,
            tax_rate: rounded.tax_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodMode {
    /// Recompute from the period's total revenue and the given settings.
    Lump,
    /// Sum the frozen per-booking snapshots.
    SnapshotSum,
}

#[derive(Debug, Clone, Copy)]
pub struct PeriodTaxInput<'a> {
    pub total_revenue: f64,
    pub ownership_share: f64,
    pub snapshots: &'a [BookingCalculationSnapshot],
    /// Set by the caller only when every contributing booking has a snapshot.
    pub snapshots_complete: bool,
}

impl<'a> PeriodTaxInput<'a> {
    pub fn lump(total_revenue: f64) -> Self {
        PeriodTaxInput {
            total_revenue,
            ownership_share: 1.0,
            snapshots: &[],
            snapshots_complete: false,
        }
    }

    pub fn snapshots(
        total_revenue: f64,
        snapshots: &'a [BookingCalculationSnapshot],
        snapshots_complete: bool,
    ) -> Self {
        PeriodTaxInput {
            total_revenue,
            ownership_share: 1.0,
            snapshots,
            snapshots_complete,
        }
    }
}

/// Period-level tax figures for the dashboard.
///
/// Lump mode treats the period's revenue as one block, so its taxable base
/// matches the sum of snapshots only when bookings were inserted in
/// cumulative-revenue order. Snapshot-sum mode requires
/// `snapshots_complete`; without it the lump computation is used instead.
pub fn aggregate_period_tax(
    mode: PeriodMode,
    input: &PeriodTaxInput<'_>,
    settings: &TaxSettings,
) -> PeriodTaxResult {
    let total_revenue = non_negative(input.total_revenue);
    if total_revenue == 0.0 && input.snapshots.is_empty() {
        return PeriodTaxResult::default();
    }

    match mode {
        PeriodMode::SnapshotSum if input.snapshots_complete => {
            sum_snapshots(total_revenue, input.snapshots)
        }
        PeriodMode::SnapshotSum => {
            warn!(
                year = settings.year,
                snapshots = input.snapshots.len(),
                "Snapshot sum requested without complete snapshots, using lump computation"
            );
            lump(total_revenue, input.ownership_share, settings)
        }
        PeriodMode::Lump => lump(total_revenue, input.ownership_share, settings),
    }
}

fn lump(total_revenue: f64, ownership_share: f64, settings: &TaxSettings) -> PeriodTaxResult {
    let share = clamp_ratio(ownership_share);
    let tax_rate = clamp_ratio(settings.tax_rate);
    let owner_revenue = total_revenue * share;
    let owner_bundfradrag = non_negative(settings.bundfradrag) * share;
    let taxable_base = taxable_income(owner_revenue, owner_bundfradrag);
    let tax_due = taxable_base * tax_rate;

    PeriodTaxResult {
        owner_revenue,
        owner_bundfradrag,
        taxable_base,
        tax_due,
        net_after_tax: owner_revenue - tax_due,
    }
}

fn sum_snapshots(total_revenue: f64, snapshots: &[BookingCalculationSnapshot]) -> PeriodTaxResult {
    let (taxable_base, tax_due) = snapshots.iter().fold((0.0, 0.0), |(base, tax), snapshot| {
        (
            base + non_negative(snapshot.taxable_base_booking_dkk),
            tax + non_negative(snapshot.tax_on_booking_dkk),
        )
    });

    PeriodTaxResult {
        owner_revenue: total_revenue,
        owner_bundfradrag: 0.0,
        taxable_base,
        tax_due,
        net_after_tax: total_revenue - tax_due,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDFRADRAG: f64 = 33_500.0;
    const RATE: f64 = 0.35;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn settings() -> TaxSettings {
        TaxSettings {
            year: 2024,
            bundfradrag: BUNDFRADRAG,
            tax_rate: RATE,
        }
    }

    /// Runs bookings in insertion order, feeding the running total back in.
    fn run_year(revenues: &[f64]) -> Vec<BookingTaxResult> {
        let mut running = 0.0;
        revenues
            .iter()
            .map(|revenue| {
                let result = compute_booking_tax(running, *revenue, RATE, BUNDFRADRAG);
                running = result.total_revenue_after;
                result
            })
            .collect()
    }

    #[test]
    fn first_booking_above_allowance() {
        let result = compute_booking_tax(0.0, 40_000.0, RATE, BUNDFRADRAG);
        assert_close(result.taxable_base_booking, 3_900.0);
        assert_close(result.tax_on_booking, 1_365.0);
        assert_close(result.cut_after_tax_each, 19_317.5);
        assert_close(result.total_revenue_after, 40_000.0);
    }

    #[test]
    fn booking_after_allowance_is_used_up() {
        let result = compute_booking_tax(33_500.0, 10_000.0, RATE, BUNDFRADRAG);
        assert_close(result.total_revenue_after, 43_500.0);
        assert_close(result.taxable_base_booking, 6_000.0);
        assert_close(result.tax_on_booking, 2_100.0);
    }

    #[test]
    fn booking_below_allowance_is_untaxed() {
        let result = compute_booking_tax(0.0, 20_000.0, RATE, BUNDFRADRAG);
        assert_eq!(result.taxable_base_booking, 0.0);
        assert_eq!(result.tax_on_booking, 0.0);
        assert_eq!(result.cut_after_tax_each, 10_000.0);
    }

    #[test]
    fn booking_straddling_allowance_is_taxed_on_excess_only() {
        let result = compute_booking_tax(30_000.0, 10_000.0, RATE, BUNDFRADRAG);
        assert_close(result.taxable_base_booking, 6_500.0 * 0.6);
        assert_close(result.tax_on_booking, 6_500.0 * 0.6 * RATE);
    }

    #[test]
    fn clamps_out_of_range_inputs() {
        assert_eq!(
            compute_booking_tax(-5.0, -1.0, 2.0, -100.0),
            compute_booking_tax(0.0, 0.0, 1.0, 0.0)
        );
        let result = compute_booking_tax(0.0, 10_000.0, 7.0, 0.0);
        assert_eq!(result.tax_rate, 1.0);
        assert_close(result.tax_on_booking, 6_000.0);
    }

    #[test]
    fn nan_inputs_are_treated_as_zero() {
        let result = compute_booking_tax(f64::NAN, 10_000.0, f64::NAN, BUNDFRADRAG);
        assert_eq!(result.total_revenue_before, 0.0);
        assert_eq!(result.tax_rate, 0.0);
        assert_eq!(result.tax_on_booking, 0.0);
    }

    #[test]
    fn results_are_never_negative() {
        for existing in [0.0, 10_000.0, 33_500.0, 90_000.0] {
            for net in [0.0, 1.0, 5_000.0, 120_000.0] {
                for rate in [0.0, 0.35, 1.0] {
                    for bundfradrag in [0.0, 33_500.0, 200_000.0] {
                        let result = compute_booking_tax(existing, net, rate, bundfradrag);
                        assert!(result.taxable_base_booking >= 0.0);
                        assert!(result.tax_on_booking >= 0.0);
                        assert!(result.cut_after_tax_each >= 0.0);
                        assert_eq!(result.total_revenue_after, existing + net);
                    }
                }
            }
        }
    }

    #[test]
    fn tax_grows_with_booking_revenue() {
        let mut previous = 0.0;
        for step in 0..=100 {
            let net = f64::from(step) * 1_000.0;
            let tax = compute_booking_tax(25_000.0, net, RATE, BUNDFRADRAG).tax_on_booking;
            assert!(tax >= previous, "tax dropped at net revenue {net}");
            previous = tax;
        }
    }

    #[test]
    fn year_total_is_independent_of_booking_order() {
        let revenues = [12_000.0, 8_500.0, 30_000.0, 4_200.0, 17_750.0];
        let year_total: f64 = revenues.iter().sum();
        let expected = (year_total - BUNDFRADRAG).max(0.0) * 0.6;

        let forward: f64 = run_year(&revenues).iter().map(|r| r.taxable_base_booking).sum();
        let mut reversed = revenues;
        reversed.reverse();
        let backward: f64 = run_year(&reversed).iter().map(|r| r.taxable_base_booking).sum();

        assert_close(forward, expected);
        assert_close(backward, expected);
    }

    #[test]
    fn snapshot_sum_matches_lump_for_year_total() {
        let results = run_year(&[20_000.0, 30_000.0]);
        assert_eq!(results[0].taxable_base_booking, 0.0);
        assert_close(results[1].taxable_base_booking, 9_900.0);

        let snapshots: Vec<_> = results.iter().map(|r| r.into_snapshot(2024)).collect();
        let summed = aggregate_period_tax(
            PeriodMode::SnapshotSum,
            &PeriodTaxInput::snapshots(50_000.0, &snapshots, true),
            &settings(),
        );
        let lumped = aggregate_period_tax(
            PeriodMode::Lump,
            &PeriodTaxInput::lump(50_000.0),
            &settings(),
        );

        assert_close(summed.taxable_base, 9_900.0);
        assert_close(lumped.taxable_base, 9_900.0);
        assert_close(summed.tax_due, lumped.tax_due);
        assert_eq!(summed.owner_bundfradrag, 0.0);
        assert_eq!(lumped.owner_bundfradrag, BUNDFRADRAG);
    }

    #[test]
    fn split_is_a_parameter() {
        let result = compute_booking_tax_split(0.0, 20_000.0, RATE, BUNDFRADRAG, 4);
        assert_eq!(result.cut_after_tax_each, 5_000.0);
        let solo = compute_booking_tax_split(0.0, 20_000.0, RATE, BUNDFRADRAG, 0);
        assert_eq!(solo.cut_after_tax_each, 20_000.0);
    }

    #[test]
    fn snapshot_is_rounded_to_two_decimals() {
        let snapshot =
            compute_booking_tax(33_500.0, 1_234.567, 0.333, BUNDFRADRAG).into_snapshot(2023);
        assert_eq!(snapshot.year, 2023);
        assert_eq!(snapshot.booking_revenue_dkk, 1_234.57);
        assert_eq!(snapshot.taxable_base_booking_dkk, 740.74);
        assert_eq!(snapshot.tax_rate, 0.33);
    }

    #[test]
    fn lump_mode_uses_current_settings() {
        let result = aggregate_period_tax(
            PeriodMode::Lump,
            &PeriodTaxInput::lump(60_000.0),
            &settings(),
        );
        assert_close(result.owner_revenue, 60_000.0);
        assert_close(result.taxable_base, 26_500.0 * 0.6);
        assert_close(result.tax_due, 26_500.0 * 0.6 * RATE);
        assert_close(result.net_after_tax, 60_000.0 - 26_500.0 * 0.6 * RATE);
    }

    #[test]
    fn lump_mode_scales_by_ownership_share() {
        let input = PeriodTaxInput {
            ownership_share: 0.5,
            ..PeriodTaxInput::lump(100_000.0)
        };
        let result = aggregate_period_tax(PeriodMode::Lump, &input, &settings());
        assert_close(result.owner_revenue, 50_000.0);
        assert_close(result.owner_bundfradrag, 16_750.0);
        assert_close(result.taxable_base, 33_250.0 * 0.6);
    }

    #[test]
    fn incomplete_snapshots_fall_back_to_lump() {
        let snapshots = [compute_booking_tax(0.0, 50_000.0, 0.1, 0.0).into_snapshot(2020)];
        let result = aggregate_period_tax(
            PeriodMode::SnapshotSum,
            &PeriodTaxInput::snapshots(50_000.0, &snapshots, false),
            &settings(),
        );
        assert_close(result.taxable_base, 9_900.0);
        assert_eq!(result.owner_bundfradrag, BUNDFRADRAG);
    }

    #[test]
    fn snapshots_keep_their_frozen_rates() {
        let old = compute_booking_tax(0.0, 50_000.0, 0.5, 30_000.0).into_snapshot(2022);
        let new = compute_booking_tax(0.0, 50_000.0, 0.2, 40_000.0).into_snapshot(2023);
        let result = aggregate_period_tax(
            PeriodMode::SnapshotSum,
            &PeriodTaxInput::snapshots(100_000.0, &[old, new], true),
            &settings(),
        );
        assert_close(result.taxable_base, 12_000.0 + 6_000.0);
        assert_close(result.tax_due, 6_000.0 + 1_200.0);
        assert_close(result.net_after_tax, 100_000.0 - 7_200.0);
    }

    #[test]
    fn empty_period_is_all_zero() {
        let lumped =
            aggregate_period_tax(PeriodMode::Lump, &PeriodTaxInput::lump(0.0), &settings());
        let summed = aggregate_period_tax(
            PeriodMode::SnapshotSum,
            &PeriodTaxInput::snapshots(0.0, &[], true),
            &settings(),
        );
        assert_eq!(lumped, PeriodTaxResult::default());
        assert_eq!(summed, PeriodTaxResult::default());
    }

    #[test]
    fn lump_mode_clamps_settings() {
        let broken = TaxSettings {
            year: 2024,
            bundfradrag: -10_000.0,
            tax_rate: 1.5,
        };
        let result =
            aggregate_period_tax(PeriodMode::Lump, &PeriodTaxInput::lump(10_000.0), &broken);
        assert_eq!(result.owner_bundfradrag, 0.0);
        assert_close(result.taxable_base, 6_000.0);
        assert_close(result.tax_due, 6_000.0);
    }
}
