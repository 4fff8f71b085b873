//! Diagnostic rendering of response trees.
//!
//! Two views: line-oriented debug dumps (one line per node, indented by
//! depth) and `termtree` rendering for the CLI.

use generational_arena::Index;
use termtree::Tree;
use tracing::{error, instrument};

use crate::domain::arena::{ResponseTree, TreeNode};
use crate::domain::entities::{FormItemCatalog, ResponseNode};
use crate::domain::error::{DomainError, DomainResult};

pub const DEFAULT_INDENT_WIDTH: usize = 2;

/// Lazy pre-order sequence of formatted lines.
///
/// Cloning yields an independent cursor; `ResponseTree::debug_lines` starts
/// a fresh one. A node met again on its own ancestor path ends the sequence
/// with `DomainError::CycleDetected`.
pub struct DebugLines<'a, C: FormItemCatalog + ?Sized> {
    tree: &'a ResponseTree,
    catalog: &'a C,
    indent_width: usize,
    stack: Vec<(Index, usize)>,
    path: Vec<Index>,
    failed: bool,
}

impl<'a, C: FormItemCatalog + ?Sized> Clone for DebugLines<'a, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            catalog: self.catalog,
            indent_width: self.indent_width,
            stack: self.stack.clone(),
            path: self.path.clone(),
            failed: self.failed,
        }
    }
}

impl<'a, C: FormItemCatalog + ?Sized> DebugLines<'a, C> {
    fn new(tree: &'a ResponseTree, catalog: &'a C, indent_width: usize) -> Self {
        let stack = tree
            .root_indices()
            .iter()
            .rev()
            .map(|&r| (r, 0))
            .collect();
        Self {
            tree,
            catalog,
            indent_width,
            stack,
            path: Vec::new(),
            failed: false,
        }
    }

    fn format_line(&self, node: &ResponseNode, depth: usize) -> String {
        let form_item = match self.catalog.lookup(node.form_item()) {
            Some(item) => format!("(FI: {} {})", item.item_type, item.rank),
            None => "(FI: ? ?)".to_string(),
        };
        let mut line = format!(
            "{}{:>2} {:<15}{}",
            " ".repeat(depth * self.indent_width),
            node.rank(),
            node.kind(),
            form_item
        );
        if let Some(value) = node.value().filter(|v| !v.trim().is_empty()) {
            line.push_str(" Value: ");
            line.push_str(value);
        }
        line
    }
}

impl<'a, C: FormItemCatalog + ?Sized> Iterator for DebugLines<'a, C> {
    type Item = DomainResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let (idx, depth) = self.stack.pop()?;
            let Some(node) = self.tree.get_node(idx) else {
                continue;
            };
            self.path.truncate(depth);
            if self.path.contains(&idx) {
                error!("cycle at node {} during traversal", node.data.id());
                self.failed = true;
                return Some(Err(DomainError::CycleDetected(node.data.id())));
            }
            self.path.push(idx);
            for &child in node.children.iter().rev() {
                self.stack.push((child, depth + 1));
            }
            return Some(Ok(self.format_line(&node.data, depth)));
        }
    }
}

impl ResponseTree {
    pub fn debug_lines<'a, C: FormItemCatalog + ?Sized>(
        &'a self,
        catalog: &'a C,
    ) -> DebugLines<'a, C> {
        DebugLines::new(self, catalog, DEFAULT_INDENT_WIDTH)
    }

    pub fn debug_lines_with<'a, C: FormItemCatalog + ?Sized>(
        &'a self,
        catalog: &'a C,
        indent_width: usize,
    ) -> DebugLines<'a, C> {
        DebugLines::new(self, catalog, indent_width)
    }

    /// Whole debug dump, one line per node.
    #[instrument(level = "debug", skip_all, fields(response = %self.response_id()))]
    pub fn debug_tree<C: FormItemCatalog + ?Sized>(&self, catalog: &C) -> DomainResult<String> {
        let lines = self.debug_lines(catalog).collect::<DomainResult<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }
}

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

fn node_label(node: &ResponseNode) -> String {
    match node.value() {
        Some(v) => format!("{} {} #{} = {}", node.kind(), node.form_item(), node.rank(), v),
        None => format!("{} {} #{}", node.kind(), node.form_item(), node.rank()),
    }
}

impl TreeNodeConvert for ResponseTree {
    fn to_tree_string(&self) -> Tree<String> {
        fn build_tree(tree: &ResponseTree, node: &TreeNode) -> Tree<String> {
            let leaves: Vec<_> = node
                .children
                .iter()
                .filter_map(|&c| tree.get_node(c))
                .map(|c| build_tree(tree, c))
                .collect();
            Tree::new(node_label(&node.data)).with_leaves(leaves)
        }

        let leaves: Vec<_> = self
            .root_indices()
            .iter()
            .filter_map(|&r| self.get_node(r))
            .map(|r| build_tree(self, r))
            .collect();
        Tree::new(format!("response {}", self.response_id())).with_leaves(leaves)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::entities::{FormItem, FormItemRef, NewNode, NodeKind, Position, ResponseId};

    fn catalog() -> HashMap<FormItemRef, FormItem> {
        let mut c = HashMap::new();
        c.insert(FormItemRef::new("grp"), FormItem::new("QingGroup", 1));
        c.insert(FormItemRef::new("q1"), FormItem::new("Questioning", 2));
        c
    }

    #[test]
    fn given_nested_nodes_when_rendering_then_lines_are_indented_and_padded() {
        let mut tree = ResponseTree::new(ResponseId(3));
        let root = tree
            .attach(None, NewNode::group("grp", NodeKind::AnswerGroup), Position::Last)
            .unwrap();
        tree.attach(Some(root), NewNode::answer("q1", "yes"), Position::Last)
            .unwrap();

        let lines: Vec<String> = tree
            .debug_lines(&catalog())
            .collect::<DomainResult<_>>()
            .unwrap();

        assert_eq!(
            lines,
            vec![
                " 1 AnswerGroup    (FI: QingGroup 1)".to_string(),
                "   1 Answer         (FI: Questioning 2) Value: yes".to_string(),
            ]
        );
    }

    #[test]
    fn given_unknown_form_item_when_rendering_then_uses_placeholder() {
        let mut tree = ResponseTree::new(ResponseId(3));
        tree.attach(None, NewNode::group("nope", NodeKind::AnswerSet), Position::Rank(12))
            .unwrap();

        let dump = tree.debug_tree(&catalog()).unwrap();

        assert_eq!(dump, "12 AnswerSet      (FI: ? ?)");
    }

    #[test]
    fn given_cyclic_links_when_rendering_then_fails_instead_of_looping() {
        let mut tree = ResponseTree::new(ResponseId(3));
        let root = tree
            .attach(None, NewNode::group("grp", NodeKind::AnswerGroup), Position::Last)
            .unwrap();
        let child = tree
            .attach(Some(root), NewNode::answer("q1", "yes"), Position::Last)
            .unwrap();
        tree.corrupt_link(child, root);

        let cat = catalog();
        let results: Vec<_> = tree.debug_lines(&cat).take(10).collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert_eq!(results[2], Err(DomainError::CycleDetected(root)));
    }

    #[test]
    fn given_partially_consumed_cursor_when_cloned_then_both_continue_identically() {
        let mut tree = ResponseTree::new(ResponseId(3));
        let root = tree
            .attach(None, NewNode::group("grp", NodeKind::AnswerGroup), Position::Last)
            .unwrap();
        tree.attach(Some(root), NewNode::answer("q1", "a"), Position::Last)
            .unwrap();
        tree.attach(Some(root), NewNode::answer("q1", "b"), Position::Last)
            .unwrap();

        let cat = catalog();
        let mut lines = tree.debug_lines(&cat);
        lines.next();
        let copy = lines.clone();

        let rest: Vec<_> = lines.collect();
        let rest_copy: Vec<_> = copy.collect();
        assert_eq!(rest, rest_copy);
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn given_tree_when_converting_to_termtree_then_root_label_names_response() {
        let mut tree = ResponseTree::new(ResponseId(5));
        tree.attach(None, NewNode::answer("q1", "x"), Position::Last)
            .unwrap();

        let rendered = tree.to_tree_string().to_string();

        assert!(rendered.starts_with("response 5"));
        assert!(rendered.contains("Answer q1 #1 = x"));
    }
}
