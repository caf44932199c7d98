//! Expiry assessment for transducers.
//!
//! [`calculate`] is a pure function of a record and the calendar day it is
//! evaluated on. Callers decide what "today" is; the binary uses the local
//! calendar day.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::Transducer;

/// Days at or below which a record is classed as danger.
pub const DANGER_DAYS: i64 = 10;

/// Days at or below which a record is classed as warning.
pub const WARNING_DAYS: i64 = 30;

/// Days remaining until expiry, or why there is no count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaysRemaining {
    /// Whole days from today to expiry; negative once expired.
    Days(i64),
    /// The record is in calibration, so expiry does not apply.
    NotApplicable,
    /// The expiry date is missing or unparseable.
    DateError,
}

impl DaysRemaining {
    /// The day count, if there is one.
    #[must_use]
    pub fn days(&self) -> Option<i64> {
        match self {
            Self::Days(n) => Some(*n),
            Self::NotApplicable | Self::DateError => None,
        }
    }
}

impl std::fmt::Display for DaysRemaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{n}"),
            Self::NotApplicable => f.write_str("N/A"),
            Self::DateError => f.write_str("Date Error"),
        }
    }
}

/// Severity bucket for display and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    /// More than a month left.
    Ok,
    /// Needs attention soon, or in calibration.
    Warning,
    /// Expired, nearly expired, or unusable date.
    Danger,
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// Result of assessing a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    /// Days until expiry or the reason there is no count.
    pub days_remaining: DaysRemaining,
    /// Severity bucket.
    pub status_class: StatusClass,
    /// Human-readable label.
    pub status_text: String,
    /// Resolved expiry date, when the stored text could be parsed.
    pub expiry: Option<NaiveDate>,
}

impl Validity {
    fn new(
        days_remaining: DaysRemaining,
        status_class: StatusClass,
        status_text: impl Into<String>,
        expiry: Option<NaiveDate>,
    ) -> Self {
        Self {
            days_remaining,
            status_class,
            status_text: status_text.into(),
            expiry,
        }
    }
}

/// Assess a record against `today`.
#[must_use]
pub fn calculate(record: &Transducer, today: NaiveDate) -> Validity {
    if record.is_calibrating() {
        return Validity::new(
            DaysRemaining::NotApplicable,
            StatusClass::Warning,
            "IN CALIBRATION",
            None,
        );
    }

    if record.expiry_date.trim().is_empty() {
        return Validity::new(
            DaysRemaining::DateError,
            StatusClass::Danger,
            "Missing Date",
            None,
        );
    }

    let Some(expiry) = parse_expiry(&record.expiry_date) else {
        return Validity::new(
            DaysRemaining::DateError,
            StatusClass::Danger,
            "Invalid Date",
            None,
        );
    };

    let days = (expiry - today).num_days();
    let (class, text) = if days < 0 {
        (StatusClass::Danger, "EXPIRED".to_string())
    } else if days <= DANGER_DAYS {
        (StatusClass::Danger, format!("Expires in {days} days"))
    } else if days <= WARNING_DAYS {
        (StatusClass::Warning, format!("Attention! {days} days"))
    } else {
        (StatusClass::Ok, "OK".to_string())
    };

    Validity::new(DaysRemaining::Days(days), class, text, Some(expiry))
}

/// Parse stored expiry text.
///
/// Accepts `YYYY-MM-DD`, or `YYYY-MM` resolved to the last day of that month.
#[must_use]
pub fn parse_expiry(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_year_month(s))
}

/// Parse `YYYY-MM` into the last day of that month.
#[must_use]
pub fn parse_year_month(s: &str) -> Option<NaiveDate> {
    let (year, month) = s.trim().split_once('-')?;
    let year: i32 = year.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    last_day_of_month(year, month)
}

/// The last calendar day of `month` in `year`.
#[must_use]
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    first_of_next.pred_opt()
}

/// A record paired with its assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessed {
    /// The stored record.
    #[serde(flatten)]
    pub record: Transducer,
    /// Its computed validity.
    #[serde(flatten)]
    pub validity: Validity,
}

impl Assessed {
    /// Assess `record` against `today`.
    #[must_use]
    pub fn new(record: Transducer, today: NaiveDate) -> Self {
        let validity = calculate(&record, today);
        Self { record, validity }
    }

    /// Expiry for display: `DD/MM/YYYY` when resolved, otherwise the raw text
    /// or `N/A` when blank.
    #[must_use]
    pub fn formatted_expiry(&self) -> String {
        match self.validity.expiry {
            Some(date) => date.format("%d/%m/%Y").to_string(),
            None if self.record.expiry_date.trim().is_empty() => "N/A".to_string(),
            None => self.record.expiry_date.clone(),
        }
    }
}

/// Assess every record, keeping input order.
#[must_use]
pub fn assess_all(records: Vec<Transducer>, today: NaiveDate) -> Vec<Assessed> {
    records
        .into_iter()
        .map(|record| Assessed::new(record, today))
        .collect()
}

/// Order for listing: soonest expiry first, records without a count last.
///
/// The sort is stable, so ties keep file order.
pub fn sort_for_display(assessed: &mut [Assessed]) {
    assessed.sort_by(|a, b| {
        match (
            a.validity.days_remaining.days(),
            b.validity.days_remaining.days(),
        ) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}
