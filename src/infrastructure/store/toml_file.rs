use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::domain::{FormItem, FormItemRef, NodeId, NodeRecord, ResponseId};
use crate::infrastructure::traits::{NodeStore, StoreDocument, StoreError, StoreResult};

/// Node store persisted as one TOML document.
///
/// Writes go to a temp file in the same directory which then replaces the
/// original, so a reader sees either the old or the new document.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TomlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file reads as an empty document.
    pub fn read_document(&self) -> StoreResult<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::io(format!("read {}", self.path.display()), e))?;
        toml::from_str(&content).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    #[instrument(level = "debug", skip(self, doc), fields(path = %self.path.display()))]
    pub fn write_document(&self, doc: &StoreDocument) -> StoreResult<()> {
        let content =
            toml::to_string_pretty(doc).map_err(|e| StoreError::Serialize(e.to_string()))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("create {}", dir.display()), e))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|e| StoreError::io(format!("temp file in {}", dir.display()), e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io("write temp store", e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(format!("replace {}", self.path.display()), e.error))?;
        debug!("wrote {} rows", doc.nodes.len());
        Ok(())
    }

    /// Read-modify-write under the process-local writer lock.
    fn update<T>(&self, f: impl FnOnce(&mut StoreDocument) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("store writer lock poisoned".into()))?;
        let mut doc = self.read_document()?;
        let result = f(&mut doc)?;
        self.write_document(&doc)?;
        Ok(result)
    }
}

impl NodeStore for TomlFileStore {
    fn load(&self, response: ResponseId) -> StoreResult<Vec<NodeRecord>> {
        Ok(self.read_document()?.rows_of(response))
    }

    fn replace(&self, response: ResponseId, records: Vec<NodeRecord>) -> StoreResult<()> {
        self.update(|doc| {
            doc.replace_rows(response, records);
            Ok(())
        })
    }

    fn reassign(&self, ids: &[NodeId], from: ResponseId, to: ResponseId) -> StoreResult<usize> {
        self.update(|doc| doc.reassign_rows(ids, from, to))
    }

    fn responses(&self) -> StoreResult<Vec<ResponseId>> {
        Ok(self.read_document()?.responses())
    }

    fn form_items(&self) -> StoreResult<BTreeMap<FormItemRef, FormItem>> {
        Ok(self.read_document()?.catalog())
    }
}
