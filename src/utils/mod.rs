use chrono::{Datelike, NaiveDate, Utc};
use std::cmp::Ordering;

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Tax year of a booking: the calendar year of its start date.
pub fn booking_year(start_date: NaiveDate) -> i32 {
    start_date.year()
}

/// Two decimals, half away from zero.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn non_negative(value: f64) -> f64 {
    // f64::max drops NaN in favour of the other operand
    value.max(0.0)
}

pub fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Parses an amount typed the Danish or the English way.
///
/// `1.234,50`, `1,234`, `1.234`, `12,5` and `12.5` are all accepted. A lone
/// separator is read as a thousands separator only when every group after
/// it has exactly three digits.
pub fn parse_amount(value: &str) -> Option<f64> {
    let raw: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if raw.is_empty() {
        return None;
    }

    let has_dot = raw.contains('.');
    let has_comma = raw.contains(',');
    let normalized = match (has_dot, has_comma) {
        (true, true) => raw.replace('.', "").replace(',', "."),
        (true, false) if is_grouped(&raw, '.') => raw.replace('.', ""),
        (false, true) if is_grouped(&raw, ',') => raw.replace(',', ""),
        (false, true) => raw.replacen(',', ".", 1),
        _ => raw,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

fn is_grouped(raw: &str, separator: char) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let mut groups = digits.split(separator);
    let head = match groups.next() {
        Some(head) => head,
        None => return false,
    };
    if head.is_empty() || head.len() > 3 || !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let mut tail_count = 0;
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        tail_count += 1;
    }
    tail_count > 0
}

/// Whole kroner with `.` as thousands separator, e.g. `1.234 kr.`.
pub fn format_dkk(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());
    format!("{}{} kr.", sign, group_thousands(&digits))
}

pub fn format_percent(ratio: f64) -> String {
    let percent = (ratio * 1000.0).round() / 10.0;
    let text = if percent.fract() == 0.0 {
        format!("{:.0}", percent)
    } else {
        format!("{:.1}", percent).replace('.', ",")
    };
    format!("{} %", text)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Case-insensitive comparison with Æ, Ø and Å after Z, as in Danish.
pub fn danish_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(danish_rank)
        .cmp(b.chars().map(danish_rank))
}

fn danish_rank(ch: char) -> (u32, u32) {
    let lower = ch.to_lowercase().next().unwrap_or(ch);
    let primary = match lower {
        'æ' | 'ä' => u32::from('z') + 1,
        'ø' | 'ö' => u32::from('z') + 2,
        'å' => u32::from('z') + 3,
        other => u32::from(other),
    };
    (primary, u32::from(ch))
}
