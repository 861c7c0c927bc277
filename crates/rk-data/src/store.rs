//! Append-only output store for derived records.
//!
//! Writers append new dated records and never mutate prior snapshots;
//! historical rows are retained for backtesting. Per-entity as-of dates must
//! be strictly increasing, which keeps the history replayable in order.
//!
//! Persistence is one JSONL file per record type; an existing store is
//! reloaded on open so successive cycles share one history.

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use rk_types::{DataError, RiskMeasurement, RiskScoreRecord, RkResult};

const SCORES_FILE: &str = "risk_scores.jsonl";
const MEASUREMENTS_FILE: &str = "risk_measurements.jsonl";

/// Append-only store for [`RiskScoreRecord`]s and [`RiskMeasurement`]s.
pub struct OutputStore {
    scores: RwLock<Vec<RiskScoreRecord>>,
    measurements: RwLock<Vec<RiskMeasurement>>,
    score_high_water: DashMap<Uuid, NaiveDate>,
    measurement_high_water: DashMap<Uuid, NaiveDate>,
    score_writer: Option<Mutex<BufWriter<File>>>,
    measurement_writer: Option<Mutex<BufWriter<File>>>,
}

impl OutputStore {
    /// Volatile store with no file backing. Used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            scores: RwLock::new(Vec::new()),
            measurements: RwLock::new(Vec::new()),
            score_high_water: DashMap::new(),
            measurement_high_water: DashMap::new(),
            score_writer: None,
            measurement_writer: None,
        }
    }

    /// Open (or create) a file-backed store under `dir`, reloading any
    /// existing history.
    pub fn open<P: AsRef<Path>>(dir: P) -> RkResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let scores: Vec<RiskScoreRecord> = read_jsonl(&dir.join(SCORES_FILE))?;
        let measurements: Vec<RiskMeasurement> = read_jsonl(&dir.join(MEASUREMENTS_FILE))?;

        let score_high_water = DashMap::new();
        for record in &scores {
            update_high_water(&score_high_water, record.customer_id, record.as_of);
        }
        let measurement_high_water = DashMap::new();
        for record in &measurements {
            update_high_water(&measurement_high_water, record.portfolio_id, record.as_of);
        }

        info!(
            scores = scores.len(),
            measurements = measurements.len(),
            dir = %dir.display(),
            "output store opened"
        );

        Ok(Self {
            scores: RwLock::new(scores),
            measurements: RwLock::new(measurements),
            score_high_water,
            measurement_high_water,
            score_writer: Some(Mutex::new(append_writer(&dir.join(SCORES_FILE))?)),
            measurement_writer: Some(Mutex::new(append_writer(&dir.join(MEASUREMENTS_FILE))?)),
        })
    }

    /// Append a score record. Rejects appends whose as-of date is not
    /// strictly after the entity's last stored record.
    pub fn append_score(&self, record: RiskScoreRecord) -> RkResult<()> {
        check_monotonic(&self.score_high_water, record.customer_id, record.as_of)?;
        if let Some(writer) = &self.score_writer {
            write_jsonl_line(&mut writer.lock(), &record)?;
        }
        self.score_high_water.insert(record.customer_id, record.as_of);
        self.scores.write().push(record);
        Ok(())
    }

    /// Append a measurement record, with the same ordering guarantee per
    /// portfolio.
    pub fn append_measurement(&self, record: RiskMeasurement) -> RkResult<()> {
        check_monotonic(&self.measurement_high_water, record.portfolio_id, record.as_of)?;
        if let Some(writer) = &self.measurement_writer {
            write_jsonl_line(&mut writer.lock(), &record)?;
        }
        self.measurement_high_water
            .insert(record.portfolio_id, record.as_of);
        self.measurements.write().push(record);
        Ok(())
    }

    pub fn scores(&self) -> Vec<RiskScoreRecord> {
        self.scores.read().clone()
    }

    pub fn measurements(&self) -> Vec<RiskMeasurement> {
        self.measurements.read().clone()
    }

    /// Score history for one customer, oldest first.
    pub fn scores_for(&self, customer_id: Uuid) -> Vec<RiskScoreRecord> {
        self.scores
            .read()
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect()
    }

    /// Measurement history for one portfolio, oldest first.
    pub fn measurements_for(&self, portfolio_id: Uuid) -> Vec<RiskMeasurement> {
        self.measurements
            .read()
            .iter()
            .filter(|r| r.portfolio_id == portfolio_id)
            .cloned()
            .collect()
    }

    /// The latest score per customer for a given as-of date.
    pub fn scores_at(&self, as_of: NaiveDate) -> Vec<RiskScoreRecord> {
        self.scores
            .read()
            .iter()
            .filter(|r| r.as_of == as_of)
            .cloned()
            .collect()
    }

    pub fn measurements_at(&self, as_of: NaiveDate) -> Vec<RiskMeasurement> {
        self.measurements
            .read()
            .iter()
            .filter(|r| r.as_of == as_of)
            .cloned()
            .collect()
    }
}

fn update_high_water(map: &DashMap<Uuid, NaiveDate>, entity_id: Uuid, as_of: NaiveDate) {
    map.entry(entity_id)
        .and_modify(|d| {
            if as_of > *d {
                *d = as_of;
            }
        })
        .or_insert(as_of);
}

fn check_monotonic(
    map: &DashMap<Uuid, NaiveDate>,
    entity_id: Uuid,
    as_of: NaiveDate,
) -> RkResult<()> {
    if let Some(high_water) = map.get(&entity_id) {
        if as_of <= *high_water {
            return Err(DataError::NonMonotonicAppend {
                entity_id: entity_id.to_string(),
                as_of: as_of.to_string(),
                high_water: high_water.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

fn append_writer(path: &Path) -> RkResult<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn write_jsonl_line<T: Serialize>(writer: &mut BufWriter<File>, record: &T) -> RkResult<()> {
    let line = serde_json::to_string(record)?;
    writeln!(writer, "{line}")?;
    writer.flush()?;
    Ok(())
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> RkResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
