//! Incremental parquet stores, one per record kind.
//!
//! Layout: `{data_dir}/{store}/{year}.parquet` plus `{data_dir}/{store}/meta.json`.
//!
//! Features:
//! - Append-only ingestion deduplicated by primary key (stored rows win)
//! - Staged writes: every touched partition goes to `.tmp` first and is only
//!   renamed into place once all of them were written
//! - Quarantine for corrupt partitions on load (`{year}.parquet.quarantined`)
//! - Metadata sidecar (date range, row count, content hash)

use super::provider::DataError;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A record kind that can live in a [`ParquetStore`].
pub trait StoreRecord: Clone + Serialize {
    type Key: Ord + Clone;

    /// Directory name of the store under the data directory.
    const STORE_NAME: &'static str;

    /// Columns every partition must carry.
    const COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;

    fn date(&self) -> NaiveDate;

    fn to_frame(records: &[&Self]) -> Result<DataFrame, DataError>;

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, DataError>;
}

/// Metadata sidecar for a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub store: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
    pub updated_at: chrono::NaiveDateTime,
}

/// Outcome of one append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendSummary {
    /// Records handed to `append`.
    pub received: usize,
    /// New rows written.
    pub inserted: usize,
    /// Rows dropped because their key was already stored or repeated in the batch.
    pub duplicates: usize,
    /// Partitions rewritten.
    pub partitions_written: usize,
}

/// Size and coverage of a store, for `store status`.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub store: String,
    pub meta: Option<StoreMeta>,
    pub partitions: Vec<i32>,
    pub quarantined: usize,
    pub bytes: u64,
}

/// Parquet store for one record kind.
pub struct ParquetStore<R: StoreRecord> {
    root: PathBuf,
    _record: PhantomData<R>,
}

impl<R: StoreRecord> ParquetStore<R> {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join(R::STORE_NAME),
            _record: PhantomData,
        }
    }

    /// Directory holding this store's partitions.
    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// Path to the partition for a year: `{root}/{year}.parquet`
    fn year_path(&self, year: i32) -> PathBuf {
        self.root.join(format!("{year}.parquet"))
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    /// Years with a partition file on disk, ascending.
    fn partition_years(&self) -> Result<Vec<i32>, DataError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root)
            .map_err(|e| DataError::StoreError(format!("read dir: {e}")))?;

        let mut years = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::StoreError(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            if let Some(year) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i32>().ok())
            {
                years.push(year);
            }
        }
        years.sort_unstable();
        Ok(years)
    }

    /// Load every stored record, sorted by primary key.
    ///
    /// A missing store is empty, not an error. Corrupt partitions are
    /// quarantined and skipped, and the sidecar is rebuilt from what remains.
    pub fn load(&self) -> Result<Vec<R>, DataError> {
        let mut all = Vec::new();
        let mut quarantined = false;

        for year in self.partition_years()? {
            let path = self.year_path(year);
            match read_partition::<R>(&path) {
                Ok(records) => all.extend(records),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "quarantining corrupt store partition"
                    );
                    let _ = fs::rename(&path, &quarantine);
                    quarantined = true;
                }
            }
        }

        all.sort_by_key(|r| r.key());
        if quarantined {
            if let Err(e) = self.write_meta(&all) {
                tracing::warn!(store = R::STORE_NAME, error = %e, "failed to rebuild store meta");
            }
        }
        Ok(all)
    }

    /// Append records, ignoring any whose key is already stored.
    ///
    /// Nothing is renamed into place unless every touched partition was read
    /// and staged successfully. A failed rename during the commit can leave
    /// earlier partitions swapped in; the sidecar is rebuilt to match them.
    pub fn append(&self, records: Vec<R>) -> Result<AppendSummary, DataError> {
        let mut summary = AppendSummary {
            received: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            return Ok(summary);
        }

        // Dedupe the batch itself, first occurrence wins
        let mut by_year: BTreeMap<i32, BTreeMap<R::Key, R>> = BTreeMap::new();
        for record in records {
            by_year
                .entry(record.date().year())
                .or_default()
                .entry(record.key())
                .or_insert(record);
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

        // Stage every touched partition
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        for (year, incoming) in by_year {
            let path = self.year_path(year);
            let mut merged: BTreeMap<R::Key, R> = BTreeMap::new();
            if path.exists() {
                match read_partition::<R>(&path) {
                    Ok(existing) => {
                        for r in existing {
                            merged.insert(r.key(), r);
                        }
                    }
                    Err(e) => {
                        discard_staged(&staged);
                        return Err(DataError::StoreError(format!(
                            "refusing to rewrite unreadable partition {}: {e}",
                            path.display()
                        )));
                    }
                }
            }

            let mut inserted = 0;
            for (key, record) in incoming {
                if let std::collections::btree_map::Entry::Vacant(slot) = merged.entry(key) {
                    slot.insert(record);
                    inserted += 1;
                }
            }
            summary.inserted += inserted;
            if inserted == 0 {
                continue;
            }

            let rows: Vec<&R> = merged.values().collect();
            let tmp_path = path.with_extension("parquet.tmp");
            let written = R::to_frame(&rows).and_then(|df| write_parquet(&df, &tmp_path));
            if let Err(e) = written {
                let _ = fs::remove_file(&tmp_path);
                discard_staged(&staged);
                return Err(e);
            }
            staged.push((tmp_path, path));
        }
        summary.duplicates = summary.received - summary.inserted;

        self.commit(&staged)?;
        summary.partitions_written = staged.len();

        if summary.inserted > 0 {
            self.refresh_meta()?;
        }

        tracing::debug!(
            store = R::STORE_NAME,
            received = summary.received,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "append complete"
        );
        Ok(summary)
    }

    /// Rename staged partitions into place, in order.
    fn commit(&self, staged: &[(PathBuf, PathBuf)]) -> Result<(), DataError> {
        for (i, (tmp_path, path)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(tmp_path, path) {
                discard_staged(&staged[i..]);
                if i > 0 {
                    if let Err(meta_err) = self.refresh_meta() {
                        tracing::warn!(
                            store = R::STORE_NAME,
                            error = %meta_err,
                            "failed to rebuild store meta"
                        );
                    }
                }
                return Err(DataError::StoreError(format!(
                    "atomic rename of {} failed: {e}",
                    tmp_path.display()
                )));
            }
        }
        Ok(())
    }

    /// Rebuild the metadata sidecar from the stored partitions.
    pub fn refresh_meta(&self) -> Result<Option<StoreMeta>, DataError> {
        let records = self.load()?;
        self.write_meta(&records)
    }

    /// Write the sidecar for `records`; an empty store has none.
    fn write_meta(&self, records: &[R]) -> Result<Option<StoreMeta>, DataError> {
        let meta_path = self.meta_path();
        let (Some(start_date), Some(end_date)) = (
            records.iter().map(|r| r.date()).min(),
            records.iter().map(|r| r.date()).max(),
        ) else {
            if meta_path.exists() {
                fs::remove_file(&meta_path)
                    .map_err(|e| DataError::StoreError(format!("meta remove: {e}")))?;
            }
            return Ok(None);
        };

        let meta = StoreMeta {
            store: R::STORE_NAME.to_string(),
            start_date,
            end_date,
            row_count: records.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(records)
                    .map_err(|e| DataError::StoreError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            updated_at: chrono::Local::now().naive_local(),
        };

        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
        let tmp_path = meta_path.with_extension("json.tmp");
        fs::write(&tmp_path, meta_json)
            .map_err(|e| DataError::StoreError(format!("meta write: {e}")))?;
        fs::rename(&tmp_path, &meta_path)
            .map_err(|e| DataError::StoreError(format!("meta rename: {e}")))?;

        Ok(Some(meta))
    }

    /// Read the metadata sidecar, if present and parseable.
    pub fn meta(&self) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Latest stored date, read from the partitions themselves.
    pub fn last_date(&self) -> Result<Option<NaiveDate>, DataError> {
        Ok(self.load()?.iter().map(|r| r.date()).max())
    }

    pub fn status(&self) -> Result<StoreStatus, DataError> {
        let mut bytes = 0u64;
        let mut quarantined = 0usize;
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                if let Ok(meta) = entry.metadata() {
                    bytes += meta.len();
                }
                if entry.path().extension().and_then(|e| e.to_str()) == Some("quarantined") {
                    quarantined += 1;
                }
            }
        }

        Ok(StoreStatus {
            store: R::STORE_NAME.to_string(),
            meta: self.meta(),
            partitions: self.partition_years()?,
            quarantined,
            bytes,
        })
    }
}

fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
    for (tmp_path, _) in staged {
        let _ = fs::remove_file(tmp_path);
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

/// Write a DataFrame to a Parquet file.
fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load a partition and validate its shape before decoding it.
fn read_partition<R: StoreRecord>(path: &Path) -> Result<Vec<R>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for col_name in R::COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    R::from_frame(&df)
}
