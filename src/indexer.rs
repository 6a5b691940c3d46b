//! Incremental indexing state.
//!
//! Tracks a content hash per document source so repeated ingest passes only
//! touch new or changed documents. The state is a flat JSON snapshot,
//! rewritten after every pass (including no-op passes) via tmp-file rename.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::corpus::content_hash;
use crate::error::Result;
use crate::models::Document;

/// `{source → content_hash}` map persisted between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexState(pub BTreeMap<String, String>);

impl IndexState {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read index state {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Atomic write via temp file + rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Outcome of an ingest pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    /// Documents that were (re)chunked and upserted.
    pub indexed: usize,
    /// Documents skipped because their hash matched the stored one.
    pub unchanged: usize,
    /// Chunks written across all indexed documents.
    pub chunks: usize,
}

/// Decide which documents need (re)indexing.
///
/// A document is selected when it is new, its hash changed, or `force` is
/// set. Returns the selection alongside the full fresh state, which the
/// caller persists after processing.
pub fn plan<'a>(
    prev: &IndexState,
    docs: &'a [Document],
    force: bool,
) -> (Vec<&'a Document>, IndexState) {
    let mut current = IndexState::default();
    let mut to_index = Vec::new();

    for doc in docs {
        let hash = content_hash(&doc.text);
        let changed = prev.0.get(&doc.source) != Some(&hash);
        current.0.insert(doc.source.clone(), hash);
        if force || changed {
            to_index.push(doc);
        }
    }

    (to_index, current)
}
