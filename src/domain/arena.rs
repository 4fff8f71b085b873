use std::collections::{HashMap, HashSet};

use generational_arena::{Arena, Index};
use tracing::{debug, instrument, trace};

use crate::domain::entities::{
    FormItemRef, NewNode, NodeId, NodeRecord, Position, ResponseId, ResponseNode,
};
use crate::domain::error::{DomainError, DomainResult, StructuralViolation};

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Answer payload for this node
    pub data: ResponseNode,
    /// Index of parent node in the arena, None for root nodes
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in sibling order
    pub children: Vec<Index>,
    /// Insertion sequence, breaks rank ties
    seq: u64,
}

impl TreeNode {
    fn sort_key(&self) -> (i32, u64) {
        (self.data.rank, self.seq)
    }
}

/// Arena-based response tree.
///
/// Holds every node of one top-level response. Roots form a sibling group of
/// their own, so the whole structure is a forest with one shared
/// `response_id`. Sibling vectors are kept sorted by `(rank, insertion)`.
#[derive(Debug, Clone)]
pub struct ResponseTree {
    response_id: ResponseId,
    arena: Arena<TreeNode>,
    roots: Vec<Index>,
    index: HashMap<NodeId, Index>,
    next_seq: u64,
}

impl ResponseTree {
    pub fn new(response_id: ResponseId) -> Self {
        Self {
            response_id,
            arena: Arena::new(),
            roots: Vec::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn response_id(&self) -> ResponseId {
        self.response_id
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&ResponseNode> {
        self.index
            .get(&id)
            .and_then(|&idx| self.arena.get(idx))
            .map(|n| &n.data)
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn index_of(&self, id: NodeId) -> Option<Index> {
        self.index.get(&id).copied()
    }

    pub fn root_indices(&self) -> &[Index] {
        &self.roots
    }

    pub fn roots(&self) -> Vec<&ResponseNode> {
        self.nodes_at(&self.roots)
    }

    pub fn parent(&self, id: NodeId) -> Option<&ResponseNode> {
        self.get(id)?.parent_id.and_then(|p| self.get(p))
    }

    /// Children of `id` sorted by rank ascending, ties in insertion order.
    ///
    /// Unknown ids and leaves both yield an empty sequence.
    #[instrument(level = "trace", skip(self))]
    pub fn children(&self, id: NodeId) -> Vec<&ResponseNode> {
        match self.index_of(id).and_then(|idx| self.arena.get(idx)) {
            Some(node) => self.nodes_at(&node.children),
            None => Vec::new(),
        }
    }

    /// Parent chain of `id`, nearest first; empty for roots and unknown ids.
    ///
    /// A parent chain that revisits a node fails with `CycleDetected`.
    pub fn ancestors(&self, id: NodeId) -> DomainResult<Vec<&ResponseNode>> {
        let mut result = Vec::new();
        let Some(start) = self.index_of(id) else {
            return Ok(result);
        };
        let mut seen = HashSet::from([start]);
        let mut current = self.arena.get(start).and_then(|n| n.parent);
        while let Some(p) = current {
            let Some(parent) = self.arena.get(p) else {
                break;
            };
            if !seen.insert(p) {
                return Err(DomainError::CycleDetected(parent.data.id));
            }
            result.push(&parent.data);
            current = parent.parent;
        }
        Ok(result)
    }

    /// Pre-order subtree below `id` (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> DomainResult<Vec<&ResponseNode>> {
        let idx = self.index_of(id).ok_or(DomainError::NodeNotFound(id))?;
        let order = self.collect_subtree(idx)?;
        Ok(self.nodes_at(&order[1..]))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(|&root| self.calculate_depth(root))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Ids of all nodes without children, in traversal order.
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(_, node)| node.data.id)
            .collect()
    }

    /// Attach a new node under `parent` (or as a root).
    ///
    /// The node inherits the tree's `response_id`; its rank follows
    /// `position`. Existing siblings keep their relative order.
    #[instrument(level = "debug", skip(self, new), fields(response = %self.response_id))]
    pub fn attach(
        &mut self,
        parent: Option<NodeId>,
        new: NewNode,
        position: Position,
    ) -> DomainResult<NodeId> {
        let id = new.id.unwrap_or_default();
        if self.index.contains_key(&id) {
            return Err(StructuralViolation::DuplicateId(id).into());
        }
        let parent_idx = self.resolve_parent(id, parent)?;

        let rank = self.resolve_rank(id, parent_idx, position)?;
        let seq = self.bump_seq();
        let node = TreeNode {
            data: ResponseNode {
                id,
                response_id: self.response_id,
                parent_id: parent,
                form_item: new.form_item,
                kind: new.kind,
                rank,
                value: new.value,
            },
            parent: parent_idx,
            children: Vec::new(),
            seq,
        };
        let idx = self.arena.insert(node);
        self.index.insert(id, idx);
        self.insert_sorted(parent_idx, idx);
        debug!("attached {} at rank {} under {:?}", id, rank, parent);
        Ok(id)
    }

    /// Insert a persisted row as-is; its parent must already be present.
    pub(crate) fn insert_record(&mut self, record: NodeRecord) -> DomainResult<NodeId> {
        if record.response_id != self.response_id {
            return Err(StructuralViolation::MixedResponses {
                expected: self.response_id,
                found: record.response_id,
            }
            .into());
        }
        let new = NewNode {
            id: Some(record.id),
            form_item: record.form_item,
            kind: record.kind,
            value: record.value,
        };
        self.attach(record.parent_id, new, Position::Rank(record.rank))
    }

    pub fn set_value(&mut self, id: NodeId, value: Option<String>) -> DomainResult<()> {
        let idx = self.index_of(id).ok_or(DomainError::NodeNotFound(id))?;
        if let Some(node) = self.arena.get_mut(idx) {
            node.data.value = value;
        }
        Ok(())
    }

    /// Change the rank of `id` and re-sort it among its siblings.
    pub fn set_rank(&mut self, id: NodeId, rank: i32) -> DomainResult<()> {
        let idx = self.index_of(id).ok_or(DomainError::NodeNotFound(id))?;
        let parent = self.arena[idx].parent;
        self.siblings_mut(parent).retain(|&s| s != idx);
        self.arena[idx].data.rank = rank;
        self.insert_sorted(parent, idx);
        Ok(())
    }

    /// Reparent `id` (with its subtree) within this tree.
    #[instrument(level = "debug", skip(self))]
    pub fn move_node(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
        position: Position,
    ) -> DomainResult<()> {
        let idx = self.index_of(id).ok_or(DomainError::NodeNotFound(id))?;
        let parent_idx = self.resolve_parent(id, new_parent)?;
        if let Some(p) = parent_idx {
            if p == idx || self.is_ancestor(idx, p) {
                return Err(StructuralViolation::Cycle {
                    node: id,
                    parent: self.arena[p].data.id,
                }
                .into());
            }
        }

        let old_parent = self.arena[idx].parent;
        self.siblings_mut(old_parent).retain(|&s| s != idx);

        let rank = match self.resolve_rank(id, parent_idx, position) {
            Ok(rank) => rank,
            Err(e) => {
                self.insert_sorted(old_parent, idx);
                return Err(e);
            }
        };
        let seq = self.bump_seq();
        let node = &mut self.arena[idx];
        node.parent = parent_idx;
        node.data.parent_id = new_parent;
        node.data.rank = rank;
        node.seq = seq;
        self.insert_sorted(parent_idx, idx);
        debug!("moved {} under {:?} at rank {}", id, new_parent, rank);
        Ok(())
    }

    /// Delete `id` together with its whole subtree.
    ///
    /// Returns the removed nodes in pre-order; empty when `id` is unknown.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, id: NodeId) -> DomainResult<Vec<ResponseNode>> {
        let Some(idx) = self.index_of(id) else {
            return Ok(Vec::new());
        };
        let order = self.collect_subtree(idx)?;

        let parent = self.arena[idx].parent;
        self.siblings_mut(parent).retain(|&s| s != idx);

        let mut removed = Vec::with_capacity(order.len());
        for i in order {
            if let Some(node) = self.arena.remove(i) {
                self.index.remove(&node.data.id);
                removed.push(node.data);
            }
        }
        debug!("removed {} nodes below and including {}", removed.len(), id);
        Ok(removed)
    }

    /// Node answering `item` directly below `parent` (roots when `None`).
    pub fn find_by_form_item(
        &self,
        parent: Option<NodeId>,
        item: &FormItemRef,
    ) -> Option<&ResponseNode> {
        let siblings = match parent {
            Some(p) => &self.arena.get(self.index_of(p)?)?.children,
            None => &self.roots,
        };
        siblings
            .iter()
            .filter_map(|&s| self.arena.get(s))
            .map(|n| &n.data)
            .find(|n| &n.form_item == item)
    }

    /// Every node answering `item`, in traversal order.
    pub fn find_all_by_form_item(&self, item: &FormItemRef) -> Vec<&ResponseNode> {
        self.iter()
            .map(|(_, n)| &n.data)
            .filter(|n| &n.form_item == item)
            .collect()
    }

    /// Pre-order ids of the subtree rooted at `root`, root first.
    ///
    /// `root` must be a root node of this tree.
    pub fn subtree_ids(&self, root: NodeId) -> DomainResult<Vec<NodeId>> {
        let idx = self.index_of(root).ok_or(DomainError::NodeNotFound(root))?;
        if self.arena[idx].parent.is_some() {
            return Err(StructuralViolation::NotARoot(root).into());
        }
        let order = self.collect_subtree(idx)?;
        Ok(order.iter().map(|&i| self.arena[i].data.id).collect())
    }

    /// Detach the subtree at `root` into a new tree owned by `target`.
    ///
    /// Every moved node gets `target` as its `response_id`; parent links,
    /// ranks and values are kept. Validation happens before anything is
    /// touched, so a failed call leaves this tree unchanged.
    #[instrument(level = "debug", skip(self), fields(from = %self.response_id))]
    pub fn reassociate(&mut self, root: NodeId, target: ResponseId) -> DomainResult<ResponseTree> {
        let idx = self.index_of(root).ok_or(DomainError::NodeNotFound(root))?;
        if self.arena[idx].parent.is_some() {
            return Err(StructuralViolation::NotARoot(root).into());
        }
        let order = self.collect_subtree(idx)?;

        self.roots.retain(|&r| r != idx);
        let mut moved = ResponseTree::new(target);
        moved.next_seq = self.next_seq;
        let mut remap: HashMap<Index, Index> = HashMap::with_capacity(order.len());
        for old_idx in order {
            let Some(mut node) = self.arena.remove(old_idx) else {
                continue;
            };
            self.index.remove(&node.data.id);
            node.data.response_id = target;
            node.children.clear();
            node.parent = node.parent.and_then(|p| remap.get(&p).copied());
            let parent = node.parent;
            let id = node.data.id;
            let new_idx = moved.arena.insert(node);
            moved.index.insert(id, new_idx);
            // pre-order visits siblings in order, so pushing keeps them sorted
            moved.siblings_mut(parent).push(new_idx);
            remap.insert(old_idx, new_idx);
        }
        debug!("reassociated {} nodes to response {}", moved.len(), target);
        Ok(moved)
    }

    /// Merge the roots of `other` into this tree.
    ///
    /// Both trees must belong to the same response and share no node ids.
    #[instrument(level = "debug", skip(self, other))]
    pub fn graft(&mut self, other: ResponseTree) -> DomainResult<usize> {
        if other.response_id != self.response_id {
            return Err(StructuralViolation::MixedResponses {
                expected: self.response_id,
                found: other.response_id,
            }
            .into());
        }
        if let Some(dup) = other.index.keys().find(|id| self.index.contains_key(id)) {
            return Err(StructuralViolation::DuplicateId(*dup).into());
        }

        let count = other.len();
        for record in other.to_records() {
            self.insert_record(record)?;
        }
        Ok(count)
    }

    /// Rows in pre-order, so reloading reproduces sibling order.
    pub fn to_records(&self) -> Vec<NodeRecord> {
        self.iter().map(|(_, n)| n.data.to_record()).collect()
    }

    fn nodes_at(&self, indices: &[Index]) -> Vec<&ResponseNode> {
        indices
            .iter()
            .filter_map(|&i| self.arena.get(i))
            .map(|n| &n.data)
            .collect()
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn resolve_parent(&self, node: NodeId, parent: Option<NodeId>) -> DomainResult<Option<Index>> {
        match parent {
            Some(p) => self
                .index_of(p)
                .map(Some)
                .ok_or_else(|| StructuralViolation::DanglingParent { node, parent: p }.into()),
            None => Ok(None),
        }
    }

    fn siblings(&self, parent: Option<Index>) -> &Vec<Index> {
        match parent {
            Some(p) => &self.arena[p].children,
            None => &self.roots,
        }
    }

    fn siblings_mut(&mut self, parent: Option<Index>) -> &mut Vec<Index> {
        match parent {
            Some(p) => &mut self.arena[p].children,
            None => &mut self.roots,
        }
    }

    /// Rank for `node` entering the sibling group of `parent`.
    ///
    /// `Position::Index` bumps colliding later siblings so their relative
    /// order survives. Ranks past `i32::MAX` fail with `RankOverflow` before
    /// any sibling is touched.
    fn resolve_rank(
        &mut self,
        node: NodeId,
        parent: Option<Index>,
        position: Position,
    ) -> DomainResult<i32> {
        let overflow = || DomainError::from(StructuralViolation::RankOverflow { node });
        let siblings = self.siblings(parent).clone();
        let after_last = match siblings.last() {
            Some(&s) => self.arena[s].data.rank.checked_add(1),
            None => Some(1),
        };
        match position {
            Position::Last => after_last.ok_or_else(overflow),
            Position::Rank(rank) => Ok(rank),
            Position::Index(i) if i >= siblings.len() => after_last.ok_or_else(overflow),
            Position::Index(i) => {
                let rank = self.arena[siblings[i]].data.rank;
                let mut bumps = Vec::new();
                let mut next = rank.checked_add(1);
                for &s in &siblings[i..] {
                    let target = next.ok_or_else(overflow)?;
                    if self.arena[s].data.rank >= target {
                        break;
                    }
                    bumps.push((s, target));
                    next = target.checked_add(1);
                }
                for (s, new_rank) in bumps {
                    let data = &mut self.arena[s].data;
                    trace!("bumping {} from rank {} to {}", data.id, data.rank, new_rank);
                    data.rank = new_rank;
                }
                Ok(rank)
            }
        }
    }

    fn insert_sorted(&mut self, parent: Option<Index>, idx: Index) {
        let key = self.arena[idx].sort_key();
        let pos = self
            .siblings(parent)
            .partition_point(|&s| self.arena[s].sort_key() <= key);
        self.siblings_mut(parent).insert(pos, idx);
    }

    fn is_ancestor(&self, candidate: Index, of: Index) -> bool {
        let mut current = self.arena.get(of).and_then(|n| n.parent);
        let mut steps = 0;
        while let Some(p) = current {
            if p == candidate {
                return true;
            }
            steps += 1;
            if steps > self.arena.len() {
                return true;
            }
            current = self.arena.get(p).and_then(|n| n.parent);
        }
        false
    }

    /// Pre-order indices of the subtree at `idx`, failing on revisits.
    fn collect_subtree(&self, idx: Index) -> DomainResult<Vec<Index>> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            let Some(node) = self.arena.get(current) else {
                continue;
            };
            if !seen.insert(current) {
                return Err(DomainError::CycleDetected(node.data.id));
            }
            order.push(current);
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        Ok(order)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_link(&mut self, parent: NodeId, child: NodeId) {
        let p = self.index[&parent];
        let c = self.index[&child];
        self.arena[p].children.push(c);
    }

    #[cfg(test)]
    pub(crate) fn corrupt_parent(&mut self, child: NodeId, parent: NodeId) {
        let p = self.index[&parent];
        let c = self.index[&child];
        self.arena[c].parent = Some(p);
    }
}

pub struct TreeIterator<'a> {
    tree: &'a ResponseTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a ResponseTree) -> Self {
        let stack = tree.root_indices().iter().rev().copied().collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a ResponseTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a ResponseTree) -> Self {
        let stack = tree
            .root_indices()
            .iter()
            .rev()
            .map(|&r| (r, false))
            .collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
