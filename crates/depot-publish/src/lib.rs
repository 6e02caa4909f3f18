//! Two-phase bundle publishing for the depot store.
//!
//! Phase one ([`Publisher::stage`]) spools an uploaded zip into an isolated
//! staging directory, extracts it with traversal protection, and validates
//! that it contains exactly one bundle (a `manifest.json` with `model.json`
//! and `indexes.json` beside it). Phase two ([`Publisher::publish`]) commits
//! the validated bundle into the durable store: documents are copied into a
//! temp directory beside the bundle root, made visible with a single rename,
//! and only then is the dataset's latest pointer rewritten. A failure between
//! those two points rolls the new bundle back, so the latest pointer never
//! references a partially present bundle.
//!
//! # Layout of the durable store
//!
//! ```text
//! <data_root>/bundles/<bundleId>/{manifest,model,indexes}.json
//! <data_root>/datasets/<datasetId>/{dataset.json,latest.json,releases.json}
//! ```

mod bundle;
mod config;
mod error;
mod publish;
mod stage;
mod store;

pub mod policy;

pub use bundle::{
    DatasetDoc, DatasetSummary, LatestPointer, PublishReceipt, ReleaseEntry, ValidatedBundle,
};
pub use config::{DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_MAX_DOCUMENT_BYTES, PublishConfig};
pub use error::{PublishError, Result};
pub use publish::{LatestWriter, Publisher};
pub use store::DatasetStore;
