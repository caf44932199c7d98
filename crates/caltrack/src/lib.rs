//! `caltrack` - Calibration expiry tracking for measurement transducers
//!
//! This library provides the record store, the expiry assessment and the
//! notification selection behind the `caltrack` binary.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod record;
pub mod store;
pub mod validity;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use notify::{check_for_notifications, select_due, DueNotice, NotificationOutcome, Notifier};
pub use record::{CalibrationStatus, Transducer, TransducerFields};
pub use store::RecordStore;
pub use validity::{calculate, Assessed, DaysRemaining, StatusClass, Validity};
