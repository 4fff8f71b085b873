//! I/O boundary traits for testability
//!
//! The node store abstracts persistence of response-tree rows, allowing
//! services to be tested with in-memory or fault-injecting implementations.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{FormItem, FormItemRef, NodeId, NodeRecord, ResponseId};

/// Errors raised by node store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse store {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("cannot serialize store: {0}")]
    Serialize(String),

    #[error("{missing} of {expected} rows not found under response {response}")]
    MissingRows {
        response: ResponseId,
        expected: usize,
        missing: usize,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for node store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of response-tree rows.
///
/// Every mutating call is one atomic unit of work: it either applies
/// completely or leaves the store unchanged.
pub trait NodeStore: Send + Sync {
    /// Rows of one response, in stored order.
    fn load(&self, response: ResponseId) -> StoreResult<Vec<NodeRecord>>;

    /// Replace all rows of `response` with `records`.
    fn replace(&self, response: ResponseId, records: Vec<NodeRecord>) -> StoreResult<()>;

    /// Move the rows `ids` from `from` to `to`, all or nothing.
    ///
    /// Only `response_id` changes; moved rows are stored after the
    /// existing rows of `to`.
    fn reassign(&self, ids: &[NodeId], from: ResponseId, to: ResponseId) -> StoreResult<usize>;

    /// Responses that currently own at least one row.
    fn responses(&self) -> StoreResult<Vec<ResponseId>>;

    /// Form-item catalog kept alongside the rows, if any.
    fn form_items(&self) -> StoreResult<BTreeMap<FormItemRef, FormItem>> {
        Ok(BTreeMap::new())
    }
}

/// Catalog entry as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormItemEntry {
    pub key: FormItemRef,
    #[serde(rename = "type")]
    pub item_type: String,
    pub rank: i32,
}

/// Whole store contents: catalog plus one row per node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDocument {
    pub form_items: Vec<FormItemEntry>,
    pub nodes: Vec<NodeRecord>,
}

impl StoreDocument {
    pub fn rows_of(&self, response: ResponseId) -> Vec<NodeRecord> {
        self.nodes
            .iter()
            .filter(|r| r.response_id == response)
            .cloned()
            .collect()
    }

    pub fn replace_rows(&mut self, response: ResponseId, records: Vec<NodeRecord>) {
        self.nodes.retain(|r| r.response_id != response);
        self.nodes.extend(records);
    }

    /// Validate first, then rewrite; a shortfall changes nothing.
    pub fn reassign_rows(
        &mut self,
        ids: &[NodeId],
        from: ResponseId,
        to: ResponseId,
    ) -> StoreResult<usize> {
        let found = self
            .nodes
            .iter()
            .filter(|r| r.response_id == from && ids.contains(&r.id))
            .count();
        if found != ids.len() {
            return Err(StoreError::MissingRows {
                response: from,
                expected: ids.len(),
                missing: ids.len() - found,
            });
        }

        let (mut moved, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|r| r.response_id == from && ids.contains(&r.id));
        for row in &mut moved {
            row.response_id = to;
        }
        self.nodes = kept;
        self.nodes.extend(moved);
        Ok(found)
    }

    pub fn responses(&self) -> Vec<ResponseId> {
        let mut ids: Vec<_> = self.nodes.iter().map(|r| r.response_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn catalog(&self) -> BTreeMap<FormItemRef, FormItem> {
        self.form_items
            .iter()
            .map(|e| (e.key.clone(), FormItem::new(e.item_type.clone(), e.rank)))
            .collect()
    }
}
