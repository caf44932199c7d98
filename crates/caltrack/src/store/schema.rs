//! Data file layout.
//!
//! The current header is fixed; [`Layout`] maps whatever header a file
//! actually has onto the columns the store understands.

use csv::StringRecord;

use super::migrations::{column_aliases, LEGACY_EXPIRY_ALIASES};

/// Column holding the record id.
pub const ID: &str = "id";
/// Column holding the description.
pub const DESCRIPTION: &str = "description";
/// Column holding the expiry date.
pub const EXPIRY_DATE: &str = "expiry_date";
/// Column holding the serial number.
pub const SERIAL_NUMBER: &str = "serial_number";
/// Column holding the location.
pub const LOCATION: &str = "location";
/// Column holding the calibration status.
pub const CALIBRATION_STATUS: &str = "calibration_status";
/// Column holding the pressure rating.
pub const PSI: &str = "psi";

/// Header written to every new or rewritten data file, in order.
pub const HEADER: [&str; 7] = [
    ID,
    DESCRIPTION,
    EXPIRY_DATE,
    SERIAL_NUMBER,
    LOCATION,
    CALIBRATION_STATUS,
    PSI,
];

/// Column positions resolved from a file's header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Position of the id column.
    pub id: Option<usize>,
    /// Position of the description column.
    pub description: Option<usize>,
    /// Position of the expiry date column.
    pub expiry_date: Option<usize>,
    /// Position of the serial number column.
    pub serial_number: Option<usize>,
    /// Position of the location column.
    pub location: Option<usize>,
    /// Position of the calibration status column.
    pub calibration_status: Option<usize>,
    /// Position of the pressure rating column.
    pub psi: Option<usize>,
    /// Month-precision expiry column from older files.
    pub legacy_expiry: Option<usize>,
    /// Whether the header is exactly [`HEADER`].
    pub current: bool,
}

impl Layout {
    /// Resolve column positions from a header row.
    #[must_use]
    pub fn from_headers(headers: &StringRecord) -> Self {
        let find = |column: &str| -> Option<usize> {
            let names = column_aliases(column);
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim() == *n))
        };
        let legacy_expiry = headers
            .iter()
            .position(|h| LEGACY_EXPIRY_ALIASES.contains(&h.trim()));

        Self {
            id: find(ID),
            description: find(DESCRIPTION),
            expiry_date: find(EXPIRY_DATE),
            serial_number: find(SERIAL_NUMBER),
            location: find(LOCATION),
            calibration_status: find(CALIBRATION_STATUS),
            psi: find(PSI),
            legacy_expiry,
            current: headers.iter().eq(HEADER.iter().copied()),
        }
    }

    /// Value of the column at `index` in `row`, or empty when absent.
    #[must_use]
    pub fn field<'a>(row: &'a StringRecord, index: Option<usize>) -> &'a str {
        index.and_then(|i| row.get(i)).unwrap_or("")
    }
}
