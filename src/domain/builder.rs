//! Tree builder: rebuilds response trees from persisted node rows.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::domain::arena::ResponseTree;
use crate::domain::entities::{NodeId, NodeRecord, ResponseId};
use crate::domain::error::{DomainError, DomainResult, StructuralViolation};

/// Constructs response trees from flat `parent_id` + `rank` rows.
///
/// Rows are the source of truth; sibling ties keep row order.
#[derive(Default)]
pub struct TreeBuilder {
    relationship_cache: HashMap<Option<NodeId>, Vec<NodeId>>,
    visited: HashSet<NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one tree per response found in `records`, ordered by response id.
    #[instrument(level = "debug", skip_all, fields(rows = records.len()))]
    pub fn build_from_records(&mut self, records: Vec<NodeRecord>) -> DomainResult<Vec<ResponseTree>> {
        let owner: HashMap<NodeId, ResponseId> = records
            .iter()
            .map(|r| (r.id, r.response_id))
            .collect();
        if owner.len() != records.len() {
            let dup = records
                .iter()
                .map(|r| r.id)
                .duplicates()
                .next()
                .unwrap_or_default();
            return Err(StructuralViolation::DuplicateId(dup).into());
        }

        let groups = records.into_iter().into_group_map_by(|r| r.response_id);
        let mut trees = Vec::with_capacity(groups.len());
        for (response_id, rows) in groups.into_iter().sorted_by_key(|(id, _)| *id) {
            trees.push(self.build_tree(response_id, rows, &owner)?);
        }
        Ok(trees)
    }

    /// Build the tree of a single response; rows of other responses are an error.
    pub fn build_response(
        &mut self,
        response_id: ResponseId,
        records: Vec<NodeRecord>,
    ) -> DomainResult<ResponseTree> {
        let mut trees = self.build_from_records(records)?;
        match trees.len() {
            0 => Ok(ResponseTree::new(response_id)),
            1 if trees[0].response_id() == response_id => Ok(trees.remove(0)),
            _ => {
                let found = trees
                    .iter()
                    .map(|t| t.response_id())
                    .find(|id| *id != response_id)
                    .unwrap_or(response_id);
                Err(StructuralViolation::MixedResponses {
                    expected: response_id,
                    found,
                }
                .into())
            }
        }
    }

    fn build_tree(
        &mut self,
        response_id: ResponseId,
        rows: Vec<NodeRecord>,
        owner: &HashMap<NodeId, ResponseId>,
    ) -> DomainResult<ResponseTree> {
        self.relationship_cache.clear();
        self.visited.clear();

        for row in &rows {
            if let Some(parent) = row.parent_id {
                match owner.get(&parent) {
                    None => {
                        return Err(StructuralViolation::DanglingParent {
                            node: row.id,
                            parent,
                        }
                        .into())
                    }
                    Some(&other) if other != response_id => {
                        return Err(StructuralViolation::MixedResponses {
                            expected: response_id,
                            found: other,
                        }
                        .into())
                    }
                    Some(_) => {}
                }
            }
            self.relationship_cache
                .entry(row.parent_id)
                .or_default()
                .push(row.id);
        }

        let mut by_id: HashMap<NodeId, NodeRecord> = rows.into_iter().map(|r| (r.id, r)).collect();
        let mut tree = ResponseTree::new(response_id);
        let mut stack: Vec<NodeId> = self
            .relationship_cache
            .get(&None)
            .map(|roots| roots.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if !self.visited.insert(current) {
                return Err(DomainError::CycleDetected(current));
            }
            if let Some(record) = by_id.remove(&current) {
                tree.insert_record(record)?;
            }
            if let Some(children) = self.relationship_cache.get(&Some(current)) {
                for child in children.iter().rev() {
                    stack.push(*child);
                }
            }
        }

        // rows never reached from a root sit on a parent loop
        if let Some(stranded) = by_id.keys().min() {
            return Err(DomainError::CycleDetected(*stranded));
        }

        debug!("built response {} with {} nodes", response_id, tree.len());
        Ok(tree)
    }
}
