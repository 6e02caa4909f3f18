use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use url::Url;

use crate::bundle::{LatestPointer, PublishReceipt, ValidatedBundle};
use crate::config::PublishConfig;
use crate::error::{PublishError, Result};
use crate::policy;
use crate::stage;
use crate::store::DatasetStore;

/// Writes a dataset's latest pointer.
///
/// Injected into [`Publisher`] so tests can substitute a failing writer and
/// exercise the rollback path; production uses [`FsLatestWriter`].
pub trait LatestWriter: Send + Sync {
    fn write_latest(&self, store: &DatasetStore, pointer: &LatestPointer) -> Result<()>;
}

struct FsLatestWriter;

impl LatestWriter for FsLatestWriter {
    fn write_latest(&self, store: &DatasetStore, pointer: &LatestPointer) -> Result<()> {
        store.write_latest(pointer)
    }
}

/// The two-phase publishing pipeline.
///
/// Concurrency: publishes are serialized per dataset id through an
/// in-process lock table, and the bundle rename re-checks its destination
/// under the conflict rules. A publisher in *another process* can still race
/// the rename; plain `rename` semantics apply then, which on most Unix
/// filesystems means the second rename fails rather than replaces.
pub struct Publisher {
    config: PublishConfig,
    store: DatasetStore,
    latest_writer: Box<dyn LatestWriter>,
    dataset_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Publisher {
    pub fn new(config: PublishConfig) -> Self {
        Self::with_latest_writer(config, Box::new(FsLatestWriter))
    }

    pub fn with_latest_writer(config: PublishConfig, latest_writer: Box<dyn LatestWriter>) -> Self {
        let store = DatasetStore::new(&config.data_root);
        Self {
            config,
            store,
            latest_writer,
            dataset_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Phase one: stage and validate an uploaded archive.
    ///
    /// Spools the upload under the configured byte cap, extracts it with
    /// traversal protection, and validates the bundle structure. Any failure
    /// removes the staging directory before the error surfaces.
    pub fn stage(&self, dataset_id: &str, upload: impl std::io::Read) -> Result<ValidatedBundle> {
        stage::stage_upload(&self.config, dataset_id, upload)
    }

    /// Phase two: commit a validated bundle into the durable store.
    ///
    /// Step order is the correctness invariant: the bundle directory becomes
    /// visible (by rename) strictly before the latest pointer is written. If
    /// the metadata upsert or the pointer write fails after the rename, the
    /// just-created bundle directory is removed again, so the pointer never
    /// references a partially published bundle. The consumed staging
    /// directory is removed on every exit path.
    pub fn publish(
        &self,
        dataset_id: &str,
        bundle: ValidatedBundle,
        title: Option<&str>,
    ) -> Result<PublishReceipt> {
        policy::require_valid_dataset_id(dataset_id)?;

        let lock = self.dataset_lock(dataset_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let bundle_id = bundle.bundle_id().to_owned();
        let final_dir = self.store.bundles_root().join(&bundle_id);
        let temp_dir = self
            .store
            .bundles_root()
            .join(format!(".tmp.{}.{}", bundle_id, now.timestamp_millis()));

        let mut bundle_visible = false;
        let outcome = self.commit(
            dataset_id,
            &bundle,
            title,
            now,
            &temp_dir,
            &final_dir,
            &mut bundle_visible,
        );

        if outcome.is_err() {
            if bundle_visible {
                depot_fs::remove_dir_all_quietly(&final_dir);
            }
            depot_fs::remove_dir_all_quietly(&temp_dir);
        }

        tracing::debug!(
            dataset = %dataset_id,
            bundle = %bundle_id,
            staging = %bundle.staging_path().display(),
            ok = outcome.is_ok(),
            "publish finished; removing staging directory"
        );
        drop(bundle);

        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn commit(
        &self,
        dataset_id: &str,
        bundle: &ValidatedBundle,
        title: Option<&str>,
        now: DateTime<Utc>,
        temp_dir: &Path,
        final_dir: &Path,
        bundle_visible: &mut bool,
    ) -> Result<PublishReceipt> {
        let bundle_id = bundle.bundle_id();

        depot_fs::ensure_dir(self.store.bundles_root())?;
        depot_fs::ensure_dir(self.store.datasets_root())?;
        depot_fs::ensure_dir(self.store.dataset_dir(dataset_id))?;

        if final_dir.exists() {
            return Err(PublishError::conflict(format!(
                "bundle already exists: {bundle_id}"
            )));
        }

        // Temp dir is a sibling of the final location, so the move below is
        // a same-filesystem rename, atomic on POSIX.
        depot_fs::ensure_dir(temp_dir)?;
        copy_document(bundle.manifest_path(), &temp_dir.join("manifest.json"))?;
        copy_document(bundle.model_path(), &temp_dir.join("model.json"))?;
        copy_document(bundle.indexes_path(), &temp_dir.join("indexes.json"))?;

        if final_dir.exists() {
            return Err(PublishError::conflict(format!(
                "bundle already exists: {bundle_id}"
            )));
        }
        fs::rename(temp_dir, final_dir).map_err(|e| {
            PublishError::internal(format!("failed to move bundle {bundle_id} into place"), e)
        })?;
        *bundle_visible = true;

        self.store.upsert_dataset(dataset_id, title, now)?;

        // History, not correctness: log and continue.
        if let Err(err) = self.store.append_release(dataset_id, bundle_id, now) {
            tracing::warn!(
                dataset = %dataset_id,
                bundle = %bundle_id,
                error = %err,
                "failed to append release history entry"
            );
        }

        let pointer = LatestPointer {
            dataset_id: dataset_id.to_owned(),
            bundle_id: bundle_id.to_owned(),
            manifest_url: self.manifest_url_string(bundle_id),
            published_at: now,
        };
        self.latest_writer.write_latest(&self.store, &pointer)?;

        self.archive_upload(dataset_id, bundle_id, bundle.archive_path());

        Ok(PublishReceipt {
            dataset_id: dataset_id.to_owned(),
            bundle_id: bundle_id.to_owned(),
            published_at: now,
            latest_url: self.absolute_url(&format!("datasets/{dataset_id}/latest.json")),
            manifest_url: self.absolute_url(&format!("bundles/{bundle_id}/manifest.json")),
        })
    }

    /// Best-effort cold storage of the original upload.
    fn archive_upload(&self, dataset_id: &str, bundle_id: &str, upload: &Path) {
        let Some(archive_root) = &self.config.archive_root else {
            return;
        };
        if !upload.is_file() {
            return;
        }

        let dest_dir = archive_root.join(dataset_id);
        let dest = dest_dir.join(format!("{bundle_id}.zip"));
        let outcome = depot_fs::ensure_dir(&dest_dir)
            .map_err(PublishError::from)
            .and_then(|()| {
                fs::copy(upload, &dest)
                    .map(|_| ())
                    .map_err(|e| PublishError::internal("failed to copy upload archive", e))
            });
        if let Err(err) = outcome {
            tracing::warn!(
                dataset = %dataset_id,
                bundle = %bundle_id,
                error = %err,
                "failed to archive upload to cold storage"
            );
        }
    }

    /// The manifest URL persisted in `latest.json`: absolute when a base URL
    /// is configured, otherwise relative from the dataset directory.
    fn manifest_url_string(&self, bundle_id: &str) -> String {
        self.absolute_url(&format!("bundles/{bundle_id}/manifest.json"))
            .map(String::from)
            .unwrap_or_else(|| format!("../../bundles/{bundle_id}/manifest.json"))
    }

    fn absolute_url(&self, relative: &str) -> Option<Url> {
        let base = self.config.base_url.as_ref()?;
        let mut base_str = base.as_str().to_owned();
        if !base_str.ends_with('/') {
            base_str.push('/');
        }
        Url::parse(&base_str).ok()?.join(relative).ok()
    }

    fn dataset_lock(&self, dataset_id: &str) -> Arc<Mutex<()>> {
        let mut table = self
            .dataset_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        table.entry(dataset_id.to_owned()).or_default().clone()
    }
}

fn copy_document(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map(|_| ()).map_err(|e| {
        PublishError::internal(
            format!("failed to copy staged document '{}'", from.display()),
            e,
        )
    })
}
