//! FILENAME: tests/test_columns.rs
//! Integration tests for column sets and column visibility.

mod common;

use common::{control, control_columns, controls, TestHarness};
use table_engine::{
    Column, ColumnSet, ConfigError, Field, FieldValue, SortDirection, TableError,
};

// ============================================================================
// COLUMN SET
// ============================================================================

#[test]
fn test_duplicate_column_is_a_config_error() {
    let first = Column::new(Field::new("owner", "Owner", |_: &common::Control| {
        FieldValue::Null
    }));
    let second = Column::new(Field::new("owner", "Owner again", |_: &common::Control| {
        FieldValue::Null
    }));

    let err = ColumnSet::new(vec![first, second]).unwrap_err();
    assert_eq!(err, ConfigError::DuplicateColumn("owner".to_string()));
    assert_eq!(
        TableError::from(err).to_string(),
        "Configuration error: Duplicate column name: owner"
    );
}

#[test]
fn test_unknown_filter_name() {
    let columns = control_columns();
    assert_eq!(
        columns.filter("severity").unwrap_err(),
        TableError::ColumnNotFound("severity".to_string())
    );
    assert_eq!(columns.names(), vec!["reference", "title", "owner", "status"]);
}

// ============================================================================
// VISIBILITY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_optional_column_follows_row_content() {
    let harness = TestHarness::unpaginated(controls(3));
    harness.settle().await;
    let frame = &harness.frame;

    // Every control has a status, none has an owner.
    assert_eq!(
        frame.visible_columns().get(),
        vec!["reference", "title", "status"]
    );

    let mut owned = control(2);
    owned.owner = Some("ann".to_string());
    assert!(frame.update_item(owned));
    assert_eq!(
        frame.visible_columns().get(),
        vec!["reference", "title", "owner", "status"]
    );

    assert!(frame.remove_item(&control(2)));
    assert_eq!(
        frame.visible_columns().get(),
        vec!["reference", "title", "status"]
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_discovery_reports_present_fields() {
    let harness = TestHarness::new(controls(3));
    harness.discovery.set_fields(&["owner"]);
    harness.settle().await;
    let frame = &harness.frame;

    assert_eq!(
        frame.visible_columns().get(),
        vec!["reference", "title", "owner", "status"]
    );
    assert!(!frame.loading_columns().get());

    frame.columns().column("owner").unwrap().hide();
    assert_eq!(
        frame.visible_columns().get(),
        vec!["reference", "title", "status"]
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_discovery_query_drops_paging_and_sort() {
    let harness = TestHarness::new(controls(3));
    let frame = &harness.frame;
    frame.sorter().set_sort("title", SortDirection::Asc);
    frame.search().set_text("net");
    frame.columns().column("status").unwrap().hide();
    harness.settle().await;

    let discovered = harness.discovery.queries();
    assert_eq!(discovered.len(), 1);
    let query = &discovered[0];
    assert_eq!(query.get_text("search"), Some("net"));
    for key in ["page", "page_size", "sort_by", "sort_order", "hidden_columns"] {
        assert!(!query.contains_key(key), "unexpected key {}", key);
    }

    let fetched = harness.source.last_query().unwrap();
    assert_eq!(fetched.get_text("sort_by"), Some("title"));
    assert!(fetched.contains_key("hidden_columns"));

    harness.shutdown().await.unwrap();
}
