//! Compatibility with older data files.
//!
//! Older files used Portuguese column names and, before day precision was
//! introduced, a month-precision `YYYY-MM` expiry column. Both are read
//! transparently; the next full rewrite saves the file in the current layout.

use tracing::debug;

use crate::validity::parse_year_month;

use super::schema;

/// Header names accepted for the month-precision expiry column.
pub const LEGACY_EXPIRY_ALIASES: &[&str] = &["expiry_month", "validade_mes_ano"];

/// Header names accepted for a current column, the current name first.
#[must_use]
pub fn column_aliases(column: &str) -> &'static [&'static str] {
    match column {
        schema::ID => &["id"],
        schema::DESCRIPTION => &["description", "descricao"],
        schema::EXPIRY_DATE => &["expiry_date", "validade_data_completa"],
        schema::SERIAL_NUMBER => &["serial_number", "numero_serie"],
        schema::LOCATION => &["location", "localizacao"],
        schema::CALIBRATION_STATUS => &["calibration_status", "status_calibracao"],
        schema::PSI => &["psi"],
        _ => &[],
    }
}

/// Convert a month-precision expiry into a full date on the last day of
/// that month.
///
/// Values that don't parse are returned unchanged so the record still loads
/// and shows up as an invalid date.
#[must_use]
pub fn upgrade_legacy_expiry(value: &str) -> String {
    match parse_year_month(value) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => {
            debug!("Keeping unparseable legacy expiry {:?} verbatim", value);
            value.to_string()
        }
    }
}
