use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::bundle::{DatasetDoc, DatasetSummary, LatestPointer, ReleaseEntry};
use crate::error::{PublishError, Result};

const DATASET_DOC: &str = "dataset.json";
const LATEST_DOC: &str = "latest.json";
const RELEASES_DOC: &str = "releases.json";

/// Read-modify-write access to the small per-dataset JSON documents.
///
/// All writes go through write-temp-then-atomic-replace; reads used by the
/// listing are defensive and degrade to defaults instead of failing.
#[derive(Clone, Debug)]
pub struct DatasetStore {
    data_root: PathBuf,
}

impl DatasetStore {
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            data_root: depot_fs::normalize_path(data_root.as_ref()),
        }
    }

    pub fn bundles_root(&self) -> PathBuf {
        self.data_root.join("bundles")
    }

    pub fn datasets_root(&self) -> PathBuf {
        self.data_root.join("datasets")
    }

    pub fn dataset_dir(&self, dataset_id: &str) -> PathBuf {
        self.datasets_root().join(dataset_id)
    }

    /// Create or update `dataset.json`.
    ///
    /// `createdAt` is written once and preserved on every later publish. A
    /// supplied title wins; otherwise the existing title is kept, falling
    /// back to the dataset id if none was ever recorded.
    pub fn upsert_dataset(
        &self,
        dataset_id: &str,
        title: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DatasetDoc> {
        let path = self.dataset_dir(dataset_id).join(DATASET_DOC);
        let previous = read_value_if_present(&path);

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .or_else(|| {
                previous
                    .as_ref()
                    .and_then(|v| v.get("title"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| dataset_id.to_owned());

        let created_at = previous
            .as_ref()
            .and_then(|v| v.get("createdAt"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .unwrap_or(now);

        let doc = DatasetDoc {
            dataset_id: dataset_id.to_owned(),
            title,
            created_at,
            updated_at: now,
        };
        depot_fs::atomic_write_json(&path, &doc)?;
        Ok(doc)
    }

    /// Append one entry to `releases.json`, preserving whatever is already
    /// recorded there (unreadable history starts over rather than failing).
    pub fn append_release(
        &self,
        dataset_id: &str,
        bundle_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let path = self.dataset_dir(dataset_id).join(RELEASES_DOC);

        let mut entries: Vec<Value> = read_value_if_present(&path)
            .and_then(|v| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default();

        let entry = ReleaseEntry {
            bundle_id: bundle_id.to_owned(),
            published_at: now,
        };
        entries.push(
            serde_json::to_value(&entry)
                .map_err(|e| PublishError::internal("failed to encode release entry", e))?,
        );

        depot_fs::atomic_write_json(&path, &entries)?;
        Ok(())
    }

    pub fn write_latest(&self, pointer: &LatestPointer) -> Result<()> {
        let path = self.dataset_dir(&pointer.dataset_id).join(LATEST_DOC);
        depot_fs::atomic_write_json(&path, pointer)?;
        Ok(())
    }

    pub fn read_dataset(&self, dataset_id: &str) -> Result<Option<DatasetDoc>> {
        read_doc(&self.dataset_dir(dataset_id).join(DATASET_DOC))
    }

    pub fn read_latest(&self, dataset_id: &str) -> Result<Option<LatestPointer>> {
        read_doc(&self.dataset_dir(dataset_id).join(LATEST_DOC))
    }

    pub fn read_releases(&self, dataset_id: &str) -> Result<Vec<ReleaseEntry>> {
        let path = self.dataset_dir(dataset_id).join(RELEASES_DOC);
        let entries = read_value_if_present(&path)
            .and_then(|v| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default();

        Ok(entries
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    /// Enumerate dataset directories, most recently updated first.
    ///
    /// Missing or corrupt documents degrade to defaults; when no recorded
    /// timestamp exists the directory's mtime stands in for `updatedAt`.
    pub fn list(&self) -> Result<Vec<DatasetSummary>> {
        let root = self.datasets_root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        let entries = fs::read_dir(&root)
            .map_err(|e| PublishError::internal("failed to list datasets", e))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| PublishError::internal("failed to list datasets", e))?;
            let path = entry.path();
            if path.is_dir() {
                summaries.push(read_summary(&path));
            }
        }

        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.dataset_id.cmp(&b.dataset_id))
        });
        Ok(summaries)
    }
}

fn read_doc<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = depot_fs::read_to_vec(path)?;
    let doc = serde_json::from_slice(&bytes).map_err(|e| {
        PublishError::internal(format!("corrupt store document '{}'", path.display()), e)
    })?;
    Ok(Some(doc))
}

fn read_value_if_present(path: &Path) -> Option<Value> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn read_summary(dataset_dir: &Path) -> DatasetSummary {
    let mut dataset_id = dataset_dir
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let mut title = None;
    let mut updated_at = None;
    let mut latest_bundle_id = None;

    if let Some(doc) = read_value_if_present(&dataset_dir.join(DATASET_DOC)) {
        if let Some(id) = doc.get("datasetId").and_then(Value::as_str) {
            dataset_id = id.to_owned();
        }
        title = doc.get("title").and_then(Value::as_str).map(str::to_owned);
        updated_at = doc
            .get("updatedAt")
            .and_then(Value::as_str)
            .map(str::to_owned);
    }

    if let Some(latest) = read_value_if_present(&dataset_dir.join(LATEST_DOC)) {
        latest_bundle_id = latest
            .get("bundleId")
            .and_then(Value::as_str)
            .map(str::to_owned);
        if updated_at.is_none() {
            updated_at = latest
                .get("publishedAt")
                .and_then(Value::as_str)
                .map(str::to_owned);
        }
    }

    if updated_at.is_none() {
        updated_at = fs::metadata(dataset_dir)
            .and_then(|m| m.modified())
            .ok()
            .map(|mtime| {
                DateTime::<Utc>::from(mtime).to_rfc3339_opts(SecondsFormat::Secs, true)
            });
    }

    DatasetSummary {
        title: title.unwrap_or_else(|| dataset_id.clone()),
        dataset_id,
        latest_bundle_id,
        updated_at,
    }
}
