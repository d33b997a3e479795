use crate::model::{NodePath, TreeModel};
use crate::utils::{now_iso, SNAPSHOT_SCHEMA_VERSION, SYLVA_VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read snapshot: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse snapshot: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("No snapshot stored for {0}")]
    NotFound(NodePath),
}

/// Producer of baseline or update models. Parsing of whatever textual
/// definition format sits behind an implementation is out of scope here.
pub trait ModelSource {
    fn load(&self) -> Result<TreeModel, StoreError>;
}

/// Which stored snapshot to load
#[derive(Debug, Clone, Default)]
pub struct SnapshotSelector {
    /// Fragment root; the store root when unset
    pub root_path: Option<NodePath>,
}

impl SnapshotSelector {
    pub fn for_root(root_path: NodePath) -> Self {
        Self {
            root_path: Some(root_path),
        }
    }

    fn effective_root(&self) -> NodePath {
        self.root_path.clone().unwrap_or_default()
    }
}

/// Durable storage for applied-state snapshots (baselines)
pub trait SnapshotStore {
    fn load(&self, selector: &SnapshotSelector) -> Result<Option<TreeModel>, StoreError>;
    fn store(&self, model: &TreeModel) -> Result<(), StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    schema_version: u32,
    sylva_version: String,
    stored_at: String,
    model: TreeModel,
}

/// One JSON file per fragment root in a directory
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    dir: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// A [`ModelSource`] that loads the snapshot selected here
    pub fn source(&self, selector: SnapshotSelector) -> SnapshotHandle<'_> {
        SnapshotHandle {
            store: self,
            selector,
        }
    }

    fn file_path(&self, root_path: &NodePath) -> PathBuf {
        let name: String = root_path
            .to_string()
            .chars()
            .map(|c| match c {
                '/' => '_',
                '[' | ']' | ':' => '-',
                other => other,
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self, selector: &SnapshotSelector) -> Result<Option<TreeModel>, StoreError> {
        let path = self.file_path(&selector.effective_root());
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let snapshot: SnapshotFile = serde_json::from_str(&content)?;
        Ok(Some(snapshot.model))
    }

    fn store(&self, model: &TreeModel) -> Result<(), StoreError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        let snapshot = SnapshotFile {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            sylva_version: SYLVA_VERSION.to_string(),
            stored_at: now_iso(),
            model: model.clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        fs::write(self.file_path(model.root_path()), content)?;
        Ok(())
    }
}

/// Couples a [`JsonSnapshotStore`] with one selector
#[derive(Debug)]
pub struct SnapshotHandle<'a> {
    store: &'a JsonSnapshotStore,
    selector: SnapshotSelector,
}

impl ModelSource for SnapshotHandle<'_> {
    fn load(&self) -> Result<TreeModel, StoreError> {
        self.store
            .load(&self.selector)?
            .ok_or_else(|| StoreError::NotFound(self.selector.effective_root()))
    }
}
