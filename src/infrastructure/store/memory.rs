use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{FormItem, FormItemRef, NodeId, NodeRecord, ResponseId};
use crate::infrastructure::traits::{
    FormItemEntry, NodeStore, StoreDocument, StoreError, StoreResult,
};

/// Process-local node store.
#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    doc: Mutex<StoreDocument>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: StoreDocument) -> Self {
        Self {
            doc: Mutex::new(doc),
        }
    }

    /// Register a catalog entry.
    pub fn with_form_item(self, key: impl Into<FormItemRef>, item: FormItem) -> Self {
        if let Ok(mut doc) = self.doc.lock() {
            doc.form_items.push(FormItemEntry {
                key: key.into(),
                item_type: item.item_type,
                rank: item.rank,
            });
        }
        self
    }

    pub fn snapshot(&self) -> StoreResult<StoreDocument> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreDocument>> {
        self.doc
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }
}

impl NodeStore for InMemoryNodeStore {
    fn load(&self, response: ResponseId) -> StoreResult<Vec<NodeRecord>> {
        Ok(self.lock()?.rows_of(response))
    }

    fn replace(&self, response: ResponseId, records: Vec<NodeRecord>) -> StoreResult<()> {
        self.lock()?.replace_rows(response, records);
        Ok(())
    }

    fn reassign(&self, ids: &[NodeId], from: ResponseId, to: ResponseId) -> StoreResult<usize> {
        self.lock()?.reassign_rows(ids, from, to)
    }

    fn responses(&self) -> StoreResult<Vec<ResponseId>> {
        Ok(self.lock()?.responses())
    }

    fn form_items(&self) -> StoreResult<BTreeMap<FormItemRef, FormItem>> {
        Ok(self.lock()?.catalog())
    }
}
