//! Domain entities: identifiers, nodes and persisted rows

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a response node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of the top-level response owning a tree.
///
/// Parsing accepts `0..=ResponseId::MAX`, the range a TOML integer can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub u64);

impl ResponseId {
    pub const MAX: u64 = i64::MAX as u64;
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResponseId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u64 = s
            .parse()
            .map_err(|e| format!("invalid response id {s:?}: {e}"))?;
        if id > Self::MAX {
            return Err(format!("response id {id} exceeds {}", Self::MAX));
        }
        Ok(Self(id))
    }
}

/// Opaque key into the form-item catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormItemRef(String);

impl FormItemRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormItemRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Read-only metadata of a form item, as far as the tree cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub rank: i32,
}

impl FormItem {
    pub fn new(item_type: impl Into<String>, rank: i32) -> Self {
        Self {
            item_type: item_type.into(),
            rank,
        }
    }
}

/// Read-only lookup `form_item_ref -> {type, rank}`.
///
/// The tree never owns or mutates form items.
pub trait FormItemCatalog {
    fn lookup(&self, item: &FormItemRef) -> Option<FormItem>;
}

impl FormItemCatalog for HashMap<FormItemRef, FormItem> {
    fn lookup(&self, item: &FormItemRef) -> Option<FormItem> {
        self.get(item).cloned()
    }
}

impl FormItemCatalog for BTreeMap<FormItemRef, FormItem> {
    fn lookup(&self, item: &FormItemRef) -> Option<FormItem> {
        self.get(item).cloned()
    }
}

/// Node-type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NodeKind {
    #[default]
    Answer,
    AnswerSet,
    AnswerGroup,
    AnswerGroupSet,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Answer => "Answer",
            NodeKind::AnswerSet => "AnswerSet",
            NodeKind::AnswerGroup => "AnswerGroup",
            NodeKind::AnswerGroupSet => "AnswerGroupSet",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so width/alignment flags apply
        f.pad(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "answer" => Ok(NodeKind::Answer),
            "answerset" => Ok(NodeKind::AnswerSet),
            "answergroup" => Ok(NodeKind::AnswerGroup),
            "answergroupset" => Ok(NodeKind::AnswerGroupSet),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

/// One answer (or answer group) in a response tree.
///
/// `response_id` and `parent_id` are maintained by the owning tree; callers
/// read them but cannot set them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseNode {
    pub(crate) id: NodeId,
    pub(crate) response_id: ResponseId,
    pub(crate) parent_id: Option<NodeId>,
    pub(crate) form_item: FormItemRef,
    pub(crate) kind: NodeKind,
    pub(crate) rank: i32,
    pub(crate) value: Option<String>,
}

impl ResponseNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn response_id(&self) -> ResponseId {
        self.response_id
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn form_item(&self) -> &FormItemRef {
        &self.form_item
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id,
            response_id: self.response_id,
            parent_id: self.parent_id,
            form_item: self.form_item.clone(),
            kind: self.kind,
            rank: self.rank,
            value: self.value.clone(),
        }
    }
}

/// Input for attaching a new node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub id: Option<NodeId>,
    pub form_item: FormItemRef,
    pub kind: NodeKind,
    pub value: Option<String>,
}

impl NewNode {
    pub fn answer(form_item: impl Into<FormItemRef>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            form_item: form_item.into(),
            kind: NodeKind::Answer,
            value: Some(value.into()),
        }
    }

    pub fn group(form_item: impl Into<FormItemRef>, kind: NodeKind) -> Self {
        Self {
            id: None,
            form_item: form_item.into(),
            kind,
            value: None,
        }
    }

    /// Use a caller-chosen id instead of a fresh one.
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Where an attached or moved node lands among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// After every existing sibling.
    #[default]
    Last,
    /// Explicit rank; after existing siblings of equal rank.
    Rank(i32),
    /// Sibling index; colliding later siblings are bumped.
    Index(usize),
}

/// Persisted row: one record per node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub response_id: ResponseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    pub form_item: FormItemRef,
    #[serde(default)]
    pub kind: NodeKind,
    pub rank: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<NodeRecord> for ResponseNode {
    fn from(r: NodeRecord) -> Self {
        Self {
            id: r.id,
            response_id: r.response_id,
            parent_id: r.parent_id,
            form_item: r.form_item,
            kind: r.kind,
            rank: r.rank,
            value: r.value,
        }
    }
}

impl From<String> for FormItemRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}
