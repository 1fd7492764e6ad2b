//! HTTP tests for `PATCH /forms/{form_id}/inputs`.
//!
//! | Status | Scenario                                   |
//! |--------|--------------------------------------------|
//! | 204    | Batch committed                            |
//! | 400    | Malformed body or violated batch rule      |
//! | 403    | Form owned by another guild                |
//! | 404    | Form does not exist                        |

mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::json;

use ticketdash_storage::{FormStore, MemoryFormStore};

use common::{
    create_test_app, layout, patch_inputs, seed_field, seed_form, send_as, GUILD_ID,
};

const TEXT: u8 = 4;
const STRING_SELECT: u8 = 3;
const RADIO_GROUP: u8 = 21;
const CHECKBOX_GROUP: u8 = 22;

fn text_spec(label: &str, position: u8) -> serde_json::Value {
    json!({
        "label": label,
        "type": TEXT,
        "position": position,
        "style": 1,
        "required": true
    })
}

// ============================================================
// Section 1: Success
// ============================================================

#[tokio::test]
async fn test_reorder_create_and_delete_in_one_request() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;
    let first = seed_field(&storage, form_id, 1, TEXT, &[]).await;
    let second = seed_field(&storage, form_id, 2, TEXT, &[]).await;

    let mut moved = text_spec("Moved", 2);
    moved["id"] = json!(first);
    let (status, _) = patch_inputs(
        &storage,
        form_id,
        json!({
            "create": [text_spec("Brand new", 1)],
            "update": [moved],
            "delete": [second]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);

    let fields = layout(&storage, form_id).await;
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].0, 1);
    assert_ne!(fields[0].1, "seededfield1");
    assert_eq!((fields[1].0, fields[1].1.as_str()), (2, "seededfield1"));
}

#[tokio::test]
async fn test_first_inputs_for_an_empty_form() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    let (status, _) = patch_inputs(
        &storage,
        form_id,
        json!({
            "create": [
                text_spec("Name", 1),
                {
                    "label": "Topic",
                    "type": STRING_SELECT,
                    "position": 2,
                    "required": true,
                    "max_length": 0,
                    "options": [
                        {"label": "Billing", "value": "billing"},
                        {"label": "Bugs", "value": "bugs", "description": "Something broke"}
                    ]
                }
            ],
            "update": null,
            "delete": null
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let fields = storage.list_fields(form_id).await.unwrap();
    assert_eq!(fields.len(), 2);
    let select = &fields[1];
    assert_eq!(select.field.field_type, STRING_SELECT);
    assert_eq!(select.field.min_length, Some(0));
    assert_eq!(select.field.max_length, Some(2));
    assert_eq!(select.options[1].description.as_deref(), Some("Something broke"));
}

#[tokio::test]
async fn test_string_select_max_is_capped_at_option_count() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;
    let field_id = seed_field(&storage, form_id, 1, STRING_SELECT, &["a"]).await;

    let options: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|v| json!({"label": v, "value": v}))
        .collect();
    let (status, _) = patch_inputs(
        &storage,
        form_id,
        json!({
            "update": [{
                "id": field_id,
                "label": "Pick",
                "type": STRING_SELECT,
                "position": 1,
                "required": false,
                "min_length": 1,
                "max_length": 10,
                "options": options
            }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let fields = storage.list_fields(form_id).await.unwrap();
    assert_eq!(fields[0].field.max_length, Some(4));
    assert_eq!(fields[0].field.min_length, Some(1));
    assert_eq!(fields[0].options.len(), 4);
}

// ============================================================
// Section 2: Batch rule violations (400)
// ============================================================

#[tokio::test]
async fn test_non_exhaustive_update_is_rejected() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;
    let ids = [
        seed_field(&storage, form_id, 1, TEXT, &[]).await,
        seed_field(&storage, form_id, 2, TEXT, &[]).await,
        seed_field(&storage, form_id, 3, TEXT, &[]).await,
    ];
    let before = layout(&storage, form_id).await;

    let updates: Vec<_> = ids[..2]
        .iter()
        .zip(1u8..)
        .map(|(id, position)| {
            let mut spec = text_spec("Kept", position);
            spec["id"] = json!(id);
            spec
        })
        .collect();

    let (status, body) =
        patch_inputs(&storage, form_id, json!({ "update": updates.clone() })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert_eq!(layout(&storage, form_id).await, before);

    // Deleting the third makes the request exhaustive.
    let (status, _) = patch_inputs(
        &storage,
        form_id,
        json!({ "update": updates, "delete": [ids[2]] }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(layout(&storage, form_id).await.len(), 2);
}

#[tokio::test]
async fn test_update_and_delete_of_same_field_is_rejected() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;
    let field_id = seed_field(&storage, form_id, 1, TEXT, &[]).await;

    let mut spec = text_spec("Both", 1);
    spec["id"] = json!(field_id);
    let (status, body) = patch_inputs(
        &storage,
        form_id,
        json!({ "create": [text_spec("Other", 1)], "update": [spec], "delete": [field_id] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains(&field_id.to_string()));
}

#[tokio::test]
async fn test_positions_must_be_a_permutation() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    for positions in [[1u8, 1, 3], [1, 3, 4]] {
        let creates: Vec<_> = positions.iter().map(|p| text_spec("Q", *p)).collect();
        let (status, body) = patch_inputs(&storage, form_id, json!({ "create": creates })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "positions {positions:?}");
        assert!(body["message"].as_str().unwrap().contains("positions"));
    }
    assert!(layout(&storage, form_id).await.is_empty());
}

#[tokio::test]
async fn test_radio_group_option_cardinality() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    let radio = |count: usize| {
        let options: Vec<_> = (0..count)
            .map(|i| json!({"label": format!("Option {i}"), "value": format!("v{i}")}))
            .collect();
        json!({ "create": [{
            "label": "Choose",
            "type": RADIO_GROUP,
            "position": 1,
            "required": true,
            "options": options
        }]})
    };

    let (status, body) = patch_inputs(&storage, form_id, radio(1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("at least 2"));

    let (status, _) = patch_inputs(&storage, form_id, radio(11)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = patch_inputs(&storage, form_id, radio(10)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(layout(&storage, form_id).await[0].2.len(), 10);
}

#[tokio::test]
async fn test_duplicate_option_values_are_named() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    let (status, body) = patch_inputs(
        &storage,
        form_id,
        json!({ "create": [{
            "label": "Tags",
            "type": CHECKBOX_GROUP,
            "position": 1,
            "required": false,
            "options": [
                {"label": "A", "value": "a"},
                {"label": "A again", "value": "a"},
                {"label": "B", "value": "b"}
            ]
        }]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("detected: a."), "message was {message}");
}

#[tokio::test]
async fn test_shape_violations_are_all_listed() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    let (status, body) = patch_inputs(
        &storage,
        form_id,
        json!({ "create": [
            { "label": "", "type": TEXT, "position": 1, "required": true },
            { "label": "x".repeat(46), "type": TEXT, "position": 2, "required": true }
        ]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("create[0].label"));
    assert!(message.contains("create[1].label"));
}

#[tokio::test]
async fn test_unknown_field_type_is_bad_request() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    let (status, body) = patch_inputs(
        &storage,
        form_id,
        json!({ "create": [{ "label": "Q", "type": 99, "position": 1, "required": true }] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

// ============================================================
// Section 3: Ownership (403 / 404)
// ============================================================

#[tokio::test]
async fn test_missing_form_is_404() {
    let storage = MemoryFormStore::new_shared();
    let (status, body) =
        patch_inputs(&storage, 777, json!({ "create": [text_spec("Q", 1)] })).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "form_not_found");
}

#[tokio::test]
async fn test_other_guilds_form_is_403() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    let (status, body) = send_as(
        create_test_app(&storage),
        Method::PATCH,
        &format!("/forms/{form_id}/inputs"),
        Some(json!({ "create": [text_spec("Q", 1)] })),
        GUILD_ID + 1,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
    assert!(layout(&storage, form_id).await.is_empty());
}

// ============================================================
// Section 4: Audit
// ============================================================

#[tokio::test]
async fn test_committed_update_is_audited() {
    let storage = MemoryFormStore::new_shared();
    let form_id = seed_form(&storage).await;

    let (status, _) = patch_inputs(
        &storage,
        form_id,
        json!({ "create": [text_spec("Q", 1)] }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let entries = wait_for_audit(&storage).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action_type, "form_inputs_update");
    assert_eq!(entries[0].old_data, Some(json!([])));
    assert_eq!(entries[0].metadata.as_ref().unwrap()["created"], 1);
}

async fn wait_for_audit(
    storage: &Arc<MemoryFormStore>,
) -> Vec<ticketdash_storage::StoredAuditEntry> {
    for _ in 0..100 {
        let entries = storage.list_audit_entries(GUILD_ID, 10).await.unwrap();
        if !entries.is_empty() {
            return entries;
        }
        tokio::task::yield_now().await;
    }
    Vec::new()
}
