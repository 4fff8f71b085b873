//! Tests for TomlFileStore persistence

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use restree::application::services::ResponseTreeService;
use restree::domain::{
    FormItem, FormItemRef, NewNode, NodeId, NodeKind, NodeRecord, Position, ResponseId,
};
use restree::infrastructure::store::TomlFileStore;
use restree::infrastructure::traits::{NodeStore, StoreError};

fn record(response: u64, parent: Option<NodeId>, item: &str, rank: i32) -> NodeRecord {
    NodeRecord {
        id: NodeId::new(),
        response_id: ResponseId(response),
        parent_id: parent,
        form_item: FormItemRef::new(item),
        kind: NodeKind::Answer,
        rank,
        value: Some("v".into()),
    }
}

#[test]
fn given_missing_file_when_loading_then_empty() {
    let temp = TempDir::new().unwrap();
    let store = TomlFileStore::new(temp.path().join("absent.toml"));

    assert!(store.load(ResponseId(1)).unwrap().is_empty());
    assert!(store.responses().unwrap().is_empty());
    assert!(!store.path().exists());
}

#[test]
fn given_replaced_rows_when_reloading_then_rows_survive() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested/dir/responses.toml");
    let store = TomlFileStore::new(&path);
    let root = record(3, None, "root", 1);
    let child = record(3, Some(root.id), "child", 1);

    // Act
    store
        .replace(ResponseId(3), vec![root.clone(), child.clone()])
        .unwrap();

    // Assert
    let reopened = TomlFileStore::new(&path);
    assert_eq!(reopened.load(ResponseId(3)).unwrap(), vec![root, child]);
    assert_eq!(reopened.responses().unwrap(), vec![ResponseId(3)]);
}

#[test]
fn given_hand_written_document_when_loading_then_parses_catalog_and_rows() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("responses.toml");
    fs::write(
        &path,
        r#"
[[form_items]]
key = "q1"
type = "Questioning"
rank = 2

[[nodes]]
id = "6f1c1f3e-5b8e-4a53-9d0a-1c2f3e4d5a6b"
response_id = 5
form_item = "q1"
kind = "AnswerGroup"
rank = 1
"#,
    )
    .unwrap();
    let store = TomlFileStore::new(&path);

    // Act
    let rows = store.load(ResponseId(5)).unwrap();
    let catalog = store.form_items().unwrap();

    // Assert
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, NodeKind::AnswerGroup);
    assert_eq!(rows[0].parent_id, None);
    assert_eq!(rows[0].value, None);
    assert_eq!(
        catalog.get(&FormItemRef::new("q1")),
        Some(&FormItem::new("Questioning", 2))
    );
}

#[test]
fn given_garbage_file_when_loading_then_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("responses.toml");
    fs::write(&path, "nodes = 17 [[[").unwrap();

    let result = TomlFileStore::new(&path).load(ResponseId(1));

    assert!(matches!(result, Err(StoreError::Parse { .. })));
}

#[test]
fn given_unknown_id_when_reassigning_then_nothing_changes() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("responses.toml");
    let store = TomlFileStore::new(&path);
    let root = record(1, None, "root", 1);
    store.replace(ResponseId(1), vec![root.clone()]).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    // Act
    let result = store.reassign(&[root.id, NodeId::new()], ResponseId(1), ResponseId(2));

    // Assert
    assert!(matches!(
        result,
        Err(StoreError::MissingRows { expected: 2, missing: 1, .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn given_rows_when_reassigning_then_only_response_id_changes() {
    let temp = TempDir::new().unwrap();
    let store = TomlFileStore::new(temp.path().join("responses.toml"));
    let root = record(1, None, "root", 1);
    let child = record(1, Some(root.id), "child", 4);
    let stay = record(1, None, "stay", 2);
    store
        .replace(ResponseId(1), vec![root.clone(), child.clone(), stay.clone()])
        .unwrap();

    let moved = store
        .reassign(&[root.id, child.id], ResponseId(1), ResponseId(2))
        .unwrap();

    assert_eq!(moved, 2);
    assert_eq!(store.load(ResponseId(1)).unwrap(), vec![stay]);
    let target = store.load(ResponseId(2)).unwrap();
    assert_eq!(target.len(), 2);
    assert_eq!(target[1].parent_id, Some(root.id));
    assert_eq!(target[1].rank, 4);
}

#[test]
fn given_service_over_toml_store_when_reassociating_then_file_reflects_move() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("responses.toml");
    let service = ResponseTreeService::new(Arc::new(TomlFileStore::new(&path)));
    let root = service
        .attach(ResponseId(7), None, NewNode::group("R", NodeKind::AnswerSet), Position::Last)
        .unwrap();
    service
        .attach(ResponseId(7), Some(root), NewNode::answer("A", "1"), Position::Last)
        .unwrap();

    // Act
    service.reassociate(ResponseId(7), root, ResponseId(9)).unwrap();

    // Assert: a fresh store sees the result
    let reopened = TomlFileStore::new(&path);
    assert!(reopened.load(ResponseId(7)).unwrap().is_empty());
    assert_eq!(reopened.load(ResponseId(9)).unwrap().len(), 2);
    // no temp files left behind
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}
