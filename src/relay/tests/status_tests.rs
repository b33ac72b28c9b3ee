//! Tests for status derivation and the JSON wire shape.

use super::{CompilationResult, StatusAction, StatusMessage};
use serde_json::json;

#[test]
fn building_message_only_carries_action() {
    let json = StatusMessage::building()
        .to_json()
        .expect("building message should serialize");
    assert_eq!(json, r#"{"action":"building"}"#);
}

#[test]
fn built_message_copies_hash_and_diagnostics() {
    let result = CompilationResult::failed("abc123", vec![String::from("E1")])
        .with_warnings(vec![String::from("W1"), String::from("W2")]);

    let message = StatusMessage::from_result(StatusAction::Built, &result);
    let value: serde_json::Value = serde_json::from_str(
        &message.to_json().expect("built message should serialize"),
    )
    .expect("serialized message should be valid json");

    assert_eq!(
        value,
        json!({
            "action": "built",
            "hash": "abc123",
            "warnings": ["W1", "W2"],
            "errors": ["E1"],
        })
    );
}

#[test]
fn clean_results_still_send_empty_lists() {
    let message = StatusMessage::from_result(StatusAction::Sync, &CompilationResult::success("A"));
    let value: serde_json::Value = serde_json::from_str(
        &message.to_json().expect("sync message should serialize"),
    )
    .expect("serialized message should be valid json");

    assert_eq!(value["action"], "sync");
    assert_eq!(value["warnings"], json!([]));
    assert_eq!(value["errors"], json!([]));
}

#[test]
fn compilation_result_reads_camel_case_with_missing_lists() {
    let result: CompilationResult = serde_json::from_str(r#"{"hasErrors":true,"hash":"h"}"#)
        .expect("minimal result should deserialize");
    assert!(result.has_errors);
    assert!(result.warnings.is_empty());
    assert!(result.errors.is_empty());
}

#[test]
fn accessors_default_to_empty_slices() {
    let message = StatusMessage::building();
    assert!(message.errors().is_empty());
    assert!(message.warnings().is_empty());
    assert_eq!(StatusAction::Built.to_string(), "built");
}
