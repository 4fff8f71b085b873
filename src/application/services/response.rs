//! Response tree service
//!
//! Loads a response's rows from the node store, applies one tree operation
//! and writes the result back. Each call runs alone per response id.

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, StoreResultExt};
use crate::application::services::ResponseLocks;
use crate::domain::{
    FormItemRef, NewNode, NodeId, Position, ResponseId, ResponseNode, ResponseTree, TreeBuilder,
};
use crate::infrastructure::traits::{NodeStore, StoreError};

/// Service for reading and editing response trees.
pub struct ResponseTreeService {
    store: Arc<dyn NodeStore>,
    locks: ResponseLocks,
}

impl ResponseTreeService {
    /// Create a new response tree service.
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self {
            store,
            locks: ResponseLocks::new(),
        }
    }

    /// Current tree of `response`; empty when it has no rows.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, response: ResponseId) -> ApplicationResult<ResponseTree> {
        self.locks.run(&[response], || self.load_unlocked(response))
    }

    /// Responses that own at least one node.
    pub fn responses(&self) -> ApplicationResult<Vec<ResponseId>> {
        self.store.responses().with_context("list responses", "store")
    }

    #[instrument(level = "debug", skip(self, new))]
    pub fn attach(
        &self,
        response: ResponseId,
        parent: Option<NodeId>,
        new: NewNode,
        position: Position,
    ) -> ApplicationResult<NodeId> {
        self.edit(response, |tree| Ok(tree.attach(parent, new, position)?))
    }

    /// Ordered children of `node`, or the roots when `node` is `None`.
    pub fn children(
        &self,
        response: ResponseId,
        node: Option<NodeId>,
    ) -> ApplicationResult<Vec<ResponseNode>> {
        let tree = self.load(response)?;
        let nodes = match node {
            Some(id) => tree.children(id),
            None => tree.roots(),
        };
        Ok(nodes.into_iter().cloned().collect())
    }

    /// Node answering `item` below `parent`; `None` is a normal outcome.
    pub fn find(
        &self,
        response: ResponseId,
        parent: Option<NodeId>,
        item: &FormItemRef,
    ) -> ApplicationResult<Option<ResponseNode>> {
        let tree = self.load(response)?;
        Ok(tree.find_by_form_item(parent, item).cloned())
    }

    /// Delete `node` and its subtree; returns how many nodes went away.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&self, response: ResponseId, node: NodeId) -> ApplicationResult<usize> {
        self.locks.run(&[response], || {
            let mut tree = self.load_unlocked(response)?;
            let removed = tree.remove(node)?;
            if !removed.is_empty() {
                self.save_unlocked(&tree)?;
            }
            Ok(removed.len())
        })
    }

    pub fn set_value(
        &self,
        response: ResponseId,
        node: NodeId,
        value: Option<String>,
    ) -> ApplicationResult<()> {
        self.edit(response, |tree| Ok(tree.set_value(node, value)?))
    }

    pub fn set_rank(&self, response: ResponseId, node: NodeId, rank: i32) -> ApplicationResult<()> {
        self.edit(response, |tree| Ok(tree.set_rank(node, rank)?))
    }

    pub fn move_node(
        &self,
        response: ResponseId,
        node: NodeId,
        parent: Option<NodeId>,
        position: Position,
    ) -> ApplicationResult<()> {
        self.edit(response, |tree| Ok(tree.move_node(node, parent, position)?))
    }

    /// Hand the subtree at `root` over to response `target`.
    ///
    /// The store rewrites every row of the subtree in one unit of work. Any
    /// store failure is reported as `PartialUpdate`: the caller must treat
    /// the subtree's ownership as unknown until it re-reads it.
    #[instrument(level = "info", skip(self))]
    pub fn reassociate(
        &self,
        response: ResponseId,
        root: NodeId,
        target: ResponseId,
    ) -> ApplicationResult<usize> {
        self.locks.run(&[response, target], || {
            let tree = self.load_unlocked(response)?;
            let ids = tree.subtree_ids(root)?;
            if target == response {
                debug!("reassociate: {} already owned by {}", root, target);
                return Ok(ids.len());
            }

            let partial = |source: StoreError| {
                error!(
                    "reassociate {} from {} to {} failed: {}",
                    root, response, target, source
                );
                ApplicationError::PartialUpdate {
                    root,
                    from: response,
                    to: target,
                    source,
                }
            };
            let moved = self.store.reassign(&ids, response, target).map_err(&partial)?;
            if moved != ids.len() {
                return Err(partial(StoreError::MissingRows {
                    response,
                    expected: ids.len(),
                    missing: ids.len().saturating_sub(moved),
                }));
            }
            info!("reassociated {} nodes from {} to {}", moved, response, target);
            Ok(moved)
        })
    }

    /// Debug dump of `response`, resolving form items through the store's catalog.
    pub fn debug_tree(&self, response: ResponseId, indent_width: usize) -> ApplicationResult<String> {
        let tree = self.load(response)?;
        let catalog = self
            .store
            .form_items()
            .with_context("load form items", "store")?;
        let lines = tree
            .debug_lines_with(&catalog, indent_width)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    fn edit<T>(
        &self,
        response: ResponseId,
        f: impl FnOnce(&mut ResponseTree) -> ApplicationResult<T>,
    ) -> ApplicationResult<T> {
        self.locks.run(&[response], || {
            let mut tree = self.load_unlocked(response)?;
            let result = f(&mut tree)?;
            self.save_unlocked(&tree)?;
            Ok(result)
        })
    }

    fn load_unlocked(&self, response: ResponseId) -> ApplicationResult<ResponseTree> {
        let records = self
            .store
            .load(response)
            .with_context("load response", response)?;
        let tree = TreeBuilder::new().build_response(response, records)?;
        debug!("loaded response {} with {} nodes", response, tree.len());
        Ok(tree)
    }

    fn save_unlocked(&self, tree: &ResponseTree) -> ApplicationResult<()> {
        self.store
            .replace(tree.response_id(), tree.to_records())
            .with_context("save response", tree.response_id())
    }
}
