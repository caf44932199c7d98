//! Expiry notifications.
//!
//! This module picks the transducers that need an alert and hands them to a
//! [`Notifier`]:
//!
//! - **Selection**: [`select_due`] keeps records with a known, non-negative
//!   day count of at most ten days. Records in calibration never qualify.
//!
//! - **Delivery**: any [`Notifier`] implementation. The check itself does not
//!   care whether the message is logged or mailed.
//!
//! - **Outcome**: [`check_for_notifications`] never fails because of the
//!   notifier. Delivery errors are folded into
//!   [`NotificationOutcome::Failed`] so the caller can show them.
//!
//! # Example
//!
//! ```no_run
//! use caltrack::notify::{check_for_notifications, LogNotifier};
//! use caltrack::RecordStore;
//!
//! let store = RecordStore::open("transducers.csv")?;
//! let today = chrono::Local::now().date_naive();
//! let outcome = check_for_notifications(&store, &LogNotifier, &[], today)?;
//! println!("{outcome}");
//! # Ok::<(), caltrack::Error>(())
//! ```

pub mod message;
mod transport;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::RecordStore;
use crate::validity::{assess_all, Assessed, DANGER_DAYS};

pub use transport::{
    notifier_from_config, LogNotifier, OutboxNotifier, SendmailNotifier, SmtpNotifier,
};

/// The view of a due record handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueNotice {
    /// Record id.
    pub id: u64,
    /// Description.
    pub description: String,
    /// Serial number.
    pub serial_number: String,
    /// Location.
    pub location: String,
    /// Expiry as `DD/MM/YYYY`.
    pub formatted_expiry: String,
    /// Days until expiry; never negative.
    pub days_remaining: i64,
}

impl DueNotice {
    /// Build a notice from an assessed record.
    ///
    /// Returns `None` when the record has no day count.
    #[must_use]
    pub fn from_assessed(assessed: &Assessed) -> Option<Self> {
        let days_remaining = assessed.validity.days_remaining.days()?;
        Some(Self {
            id: assessed.record.id,
            description: assessed.record.description.clone(),
            serial_number: assessed.record.serial_number.clone(),
            location: assessed.record.location.clone(),
            formatted_expiry: assessed.formatted_expiry(),
            days_remaining,
        })
    }
}

/// Delivers the list of due records to recipients.
///
/// Implementors provide the transport. They report success as a
/// human-readable status line; the caller only logs and displays it.
pub trait Notifier: std::fmt::Debug {
    /// The name of this transport (for logging).
    fn name(&self) -> &'static str;

    /// Deliver an alert covering `due` to `recipients`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be handed off.
    fn notify(&self, recipients: &[String], due: &[DueNotice]) -> Result<String>;
}

/// Whether an assessed record should trigger an alert.
#[must_use]
pub fn is_due(assessed: &Assessed) -> bool {
    if assessed.record.is_calibrating() {
        return false;
    }
    match assessed.validity.days_remaining.days() {
        // The `== 5` arm is subsumed by the threshold but kept as written.
        Some(days) if days >= 0 => days <= DANGER_DAYS || days == 5,
        _ => false,
    }
}

/// Keep the records that need an alert, in input order.
#[must_use]
pub fn select_due(assessed: &[Assessed]) -> Vec<&Assessed> {
    assessed.iter().filter(|a| is_due(a)).collect()
}

/// What a notification check ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// No record needed an alert; the notifier was not called.
    NothingDue,
    /// The notifier accepted the alert.
    Delivered {
        /// Number of records in the alert.
        count: usize,
        /// Status line reported by the notifier.
        status: String,
    },
    /// The notifier failed.
    Failed {
        /// Number of records in the alert.
        count: usize,
        /// Description of the failure.
        message: String,
    },
}

impl NotificationOutcome {
    /// Whether the notifier reported a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for NotificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingDue => write!(f, "No expiry notifications needed today."),
            Self::Delivered { status, .. } => write!(f, "{status}"),
            Self::Failed { message, .. } => {
                write!(f, "Failed to send expiry notification: {message}")
            }
        }
    }
}

/// Read the store, select due records and notify about them.
///
/// The store is only read, so a failing notifier leaves it untouched.
///
/// # Errors
///
/// Returns an error only if the store cannot be read.
pub fn check_for_notifications(
    store: &RecordStore,
    notifier: &dyn Notifier,
    recipients: &[String],
    today: NaiveDate,
) -> Result<NotificationOutcome> {
    let assessed = assess_all(store.list()?, today);
    let due: Vec<DueNotice> = select_due(&assessed)
        .into_iter()
        .filter_map(DueNotice::from_assessed)
        .collect();

    if due.is_empty() {
        info!("No transducers due for notification");
        return Ok(NotificationOutcome::NothingDue);
    }

    let count = due.len();
    info!(
        "{} transducers due; notifying via {}",
        count,
        notifier.name()
    );

    let outcome = match notifier.notify(recipients, &due) {
        Ok(status) => {
            info!("{}", status);
            NotificationOutcome::Delivered { count, status }
        }
        Err(e) => {
            warn!("Notification via {} failed: {}", notifier.name(), e);
            NotificationOutcome::Failed {
                count,
                message: e.to_string(),
            }
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;
    use crate::record::{CalibrationStatus, Transducer, TransducerFields};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn expiry_in(days: i64) -> String {
        (today() + Duration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }

    fn assessed_in(id: u64, days: i64) -> Assessed {
        let record = Transducer::new(id, TransducerFields::new("Gauge", expiry_in(days)));
        Assessed::new(record, today())
    }

    fn days_of(selected: &[&Assessed]) -> Vec<i64> {
        selected
            .iter()
            .filter_map(|a| a.validity.days_remaining.days())
            .collect()
    }

    /// Records every call and answers with a fixed result.
    #[derive(Debug, Default)]
    struct RecordingNotifier {
        fail: bool,
        calls: RefCell<Vec<(Vec<String>, Vec<DueNotice>)>>,
    }

    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn notify(&self, recipients: &[String], due: &[DueNotice]) -> Result<String> {
            self.calls
                .borrow_mut()
                .push((recipients.to_vec(), due.to_vec()));
            if self.fail {
                Err(Error::notify("recording", "relay refused"))
            } else {
                Ok(format!("sent {}", due.len()))
            }
        }
    }

    #[test]
    fn test_threshold_inclusion() {
        assert!(is_due(&assessed_in(1, 5)));
        assert!(is_due(&assessed_in(1, 10)));
        assert!(is_due(&assessed_in(1, 0)));
        assert!(!is_due(&assessed_in(1, 11)));
        assert!(!is_due(&assessed_in(1, 15)));
        assert!(!is_due(&assessed_in(1, -3)));
    }

    #[test]
    fn test_calibrating_never_due() {
        let mut record = Transducer::new(1, TransducerFields::new("Gauge", expiry_in(2)));
        record.calibration_status = CalibrationStatus::InCalibration;
        assert!(!is_due(&Assessed::new(record, today())));
    }

    #[test]
    fn test_date_errors_never_due() {
        let record = Transducer::new(1, TransducerFields::new("Gauge", "not a date"));
        assert!(!is_due(&Assessed::new(record, today())));
    }

    #[test]
    fn test_select_preserves_order() {
        let assessed: Vec<Assessed> = [-5, 3, 10, 20, 5]
            .iter()
            .enumerate()
            .map(|(i, d)| assessed_in(i as u64 + 1, *d))
            .collect();

        let selected = select_due(&assessed);
        assert_eq!(days_of(&selected), vec![3, 10, 5]);
        let ids: Vec<u64> = selected.iter().map(|a| a.record.id).collect();
        assert_eq!(ids, vec![2, 3, 5]);
    }

    #[test]
    fn test_select_empty() {
        assert!(select_due(&[]).is_empty());
    }

    #[test]
    fn test_due_notice_fields() {
        let mut fields = TransducerFields::new("Line gauge", "2025-03-15");
        fields.serial_number = "SN-77".to_string();
        fields.location = "Deck".to_string();
        let assessed = Assessed::new(Transducer::new(9, fields), today());

        let notice = DueNotice::from_assessed(&assessed).unwrap();
        assert_eq!(notice.id, 9);
        assert_eq!(notice.serial_number, "SN-77");
        assert_eq!(notice.location, "Deck");
        assert_eq!(notice.formatted_expiry, "15/03/2025");
        assert_eq!(notice.days_remaining, 5);
    }

    fn store_with(days: &[i64]) -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path().join("t.csv")).unwrap();
        for d in days {
            store
                .create(TransducerFields::new(format!("Gauge {d}"), expiry_in(*d)))
                .unwrap();
        }
        (dir, store)
    }

    #[test]
    fn test_check_nothing_due_skips_notifier() {
        let (_dir, store) = store_with(&[40, 15, -1]);
        let notifier = RecordingNotifier::default();

        let outcome = check_for_notifications(&store, &notifier, &[], today()).unwrap();
        assert_eq!(outcome, NotificationOutcome::NothingDue);
        assert!(notifier.calls.borrow().is_empty());
        assert_eq!(
            outcome.to_string(),
            "No expiry notifications needed today."
        );
    }

    #[test]
    fn test_check_delivers_due_records() {
        let (_dir, store) = store_with(&[-5, 3, 10, 20, 5]);
        let notifier = RecordingNotifier::default();
        let recipients = vec!["ops@example.com".to_string()];

        let outcome = check_for_notifications(&store, &notifier, &recipients, today()).unwrap();
        assert_eq!(
            outcome,
            NotificationOutcome::Delivered {
                count: 3,
                status: "sent 3".to_string()
            }
        );

        let calls = notifier.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, recipients);
        let days: Vec<i64> = calls[0].1.iter().map(|n| n.days_remaining).collect();
        assert_eq!(days, vec![3, 10, 5]);
    }

    #[test]
    fn test_check_skips_calibrating() {
        let (_dir, store) = store_with(&[2, 4]);
        store.set_calibrating(1).unwrap();
        let notifier = RecordingNotifier::default();

        check_for_notifications(&store, &notifier, &[], today()).unwrap();
        let calls = notifier.calls.borrow();
        let ids: Vec<u64> = calls[0].1.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_check_failure_is_reported_not_raised() {
        let (_dir, store) = store_with(&[1]);
        let before = std::fs::read_to_string(store.path()).unwrap();
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };

        let outcome = check_for_notifications(&store, &notifier, &[], today()).unwrap();
        assert!(outcome.is_failure());
        assert!(outcome.to_string().contains("relay refused"));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }
}
