//! Storage layer for caltrack.
//!
//! This module provides CSV-backed persistent storage for transducer records.
//!
//! Every mutation except [`RecordStore::create`] rewrites the whole file.
//! There is no locking and no atomic replace: two processes mutating the
//! same file can lose each other's changes, and a failure mid-rewrite can
//! leave the file truncated.

pub mod migrations;
pub mod schema;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use csv::{ByteRecord, StringRecord};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{CalibrationStatus, Transducer, TransducerFields};

use schema::Layout;

/// Flat-file store of transducer records.
///
/// Provides:
/// - Tolerant loading (non-integer ids skipped, undecodable text replaced,
///   legacy layouts upgraded)
/// - Id assignment
/// - Full-file rewrite on update, delete and calibration
#[derive(Debug, Clone)]
pub struct RecordStore {
    /// Path to the data file.
    path: PathBuf,
}

/// Records read from disk together with what the header looked like.
struct Loaded {
    records: Vec<Transducer>,
    current_layout: bool,
}

impl RecordStore {
    /// Open or create a data file at the given path.
    ///
    /// Creates the parent directories if needed, and writes the header row
    /// when the file is missing or empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let store = Self { path };
        store.ensure_initialized()?;
        debug!("Record store opened at {}", store.path.display());
        Ok(store)
    }

    /// Get the path to the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn list(&self) -> Result<Vec<Transducer>> {
        Ok(self.load()?.records)
    }

    /// Look up a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn get(&self, id: u64) -> Result<Option<Transducer>> {
        Ok(self.list()?.into_iter().find(|t| t.id == id))
    }

    /// Register a new transducer.
    ///
    /// The new id is one more than the highest id on file, or 1 for an empty
    /// file. The record starts out [`CalibrationStatus::Ok`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank description or expiry date,
    /// [`Error::IdExhausted`] when the highest id on file is `u64::MAX`, or an
    /// I/O error if the file cannot be written.
    pub fn create(&self, fields: TransducerFields) -> Result<Transducer> {
        fields.validate()?;

        let Loaded {
            mut records,
            current_layout,
        } = self.load()?;
        let id = match records.iter().map(|t| t.id).max() {
            None => 1,
            Some(max) => max.checked_add(1).ok_or(Error::IdExhausted)?,
        };
        let record = Transducer::new(id, fields);

        if current_layout {
            self.append(&record)?;
        } else {
            info!(
                "Rewriting {} in the current layout",
                self.path.display()
            );
            records.push(record.clone());
            self.rewrite(&records)?;
        }

        info!("Registered transducer #{} ({})", id, record.description);
        Ok(record)
    }

    /// Replace the editable fields of a record.
    ///
    /// A changed expiry date puts the record back in service; otherwise its
    /// calibration status is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and [`Error::Validation`]
    /// for blank required fields. The file is untouched in both cases.
    pub fn update(&self, id: u64, fields: TransducerFields) -> Result<Transducer> {
        fields.validate()?;

        let mut records = self.list()?;
        let record = records
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(Error::NotFound { id })?;

        let was_calibrating = record.is_calibrating();
        record.apply(fields);
        if was_calibrating && !record.is_calibrating() {
            info!("Transducer #{} back in service with new expiry", id);
        }
        let updated = record.clone();

        self.rewrite(&records)?;
        info!("Updated transducer #{}", id);
        Ok(updated)
    }

    /// Remove a record.
    ///
    /// Returns `true` if a record was removed, `false` if the id was unknown
    /// (in which case the file is not rewritten).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written.
    pub fn delete(&self, id: u64) -> Result<bool> {
        let mut records = self.list()?;
        let before = records.len();
        records.retain(|t| t.id != id);

        if records.len() == before {
            debug!("Delete of unknown transducer #{}", id);
            return Ok(false);
        }

        self.rewrite(&records)?;
        info!("Deleted transducer #{}", id);
        Ok(true)
    }

    /// Mark a record as withdrawn for calibration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, or an I/O error if the
    /// file cannot be written.
    pub fn set_calibrating(&self, id: u64) -> Result<Transducer> {
        let mut records = self.list()?;
        let record = records
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(Error::NotFound { id })?;

        record.calibration_status = CalibrationStatus::InCalibration;
        let updated = record.clone();

        self.rewrite(&records)?;
        info!("Transducer #{} marked as in calibration", id);
        Ok(updated)
    }

    /// Write the header row if the file is missing or empty.
    fn ensure_initialized(&self) -> Result<()> {
        let empty = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };
        if empty {
            info!("Initializing data file at {}", self.path.display());
            self.rewrite(&[])?;
        }
        Ok(())
    }

    fn load(&self) -> Result<Loaded> {
        self.ensure_initialized()?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let layout = Layout::from_headers(&decode_lossy(reader.byte_headers()?));
        if layout.id.is_none() {
            warn!("{} has no id column; no records can be read", self.path.display());
        }

        let mut records = Vec::new();
        for row in reader.byte_records() {
            let row = row?;
            let row = match StringRecord::from_byte_record(row) {
                Ok(row) => row,
                Err(e) => {
                    let raw = e.into_byte_record();
                    warn!(
                        "Row at line {} is not valid UTF-8; replacing undecodable bytes",
                        raw.position().map_or(0, csv::Position::line)
                    );
                    decode_lossy(&raw)
                }
            };
            match Self::row_to_record(&row, &layout) {
                Some(record) => records.push(record),
                None => debug!("Skipping row with non-integer id: {:?}", row),
            }
        }

        Ok(Loaded {
            records,
            current_layout: layout.current,
        })
    }

    /// Convert a data row to a record, or `None` when the id is not an
    /// integer.
    fn row_to_record(row: &StringRecord, layout: &Layout) -> Option<Transducer> {
        let id: u64 = Layout::field(row, layout.id).trim().parse().ok()?;
        let text = |index: Option<usize>| Layout::field(row, index).to_string();

        let expiry_date = match (layout.expiry_date, layout.legacy_expiry) {
            (None, Some(legacy)) => {
                migrations::upgrade_legacy_expiry(Layout::field(row, Some(legacy)))
            }
            (index, _) => text(index),
        };

        let status_str = Layout::field(row, layout.calibration_status);
        let calibration_status = CalibrationStatus::parse(status_str).unwrap_or_else(|| {
            warn!(
                "Unknown calibration status {:?} on transducer #{}, defaulting to OK",
                status_str, id
            );
            CalibrationStatus::Ok
        });

        Some(Transducer {
            id,
            description: text(layout.description),
            expiry_date,
            serial_number: text(layout.serial_number),
            location: text(layout.location),
            calibration_status,
            psi: text(layout.psi),
        })
    }

    fn record_to_row(record: &Transducer) -> [String; 7] {
        [
            record.id.to_string(),
            record.description.clone(),
            record.expiry_date.clone(),
            record.serial_number.clone(),
            record.location.clone(),
            record.calibration_status.as_str().to_string(),
            record.psi.clone(),
        ]
    }

    /// Truncate the file and write the header plus every record.
    fn rewrite(&self, records: &[Transducer]) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(schema::HEADER)?;
        for record in records {
            writer.write_record(Self::record_to_row(record))?;
        }
        writer.flush()?;
        debug!(
            "Rewrote {} with {} records",
            self.path.display(),
            records.len()
        );
        Ok(())
    }

    /// Append a single record row.
    ///
    /// A hand-edited file may lack a final newline; one is added first so
    /// the new row does not run into the last one.
    fn append(&self, record: &Transducer) -> Result<()> {
        let mut file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        if !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(Self::record_to_row(record))?;
        writer.flush()?;
        Ok(())
    }
}

fn decode_lossy(raw: &ByteRecord) -> StringRecord {
    raw.iter().map(String::from_utf8_lossy).collect()
}

/// Whether the file is empty or its last byte is a newline.
fn ends_with_newline(file: &mut File) -> Result<bool> {
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
