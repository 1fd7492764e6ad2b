//! Shared test utilities for the HTTP API tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use tower::ServiceExt;

use ticketdash_api::http::{create_router, AppState};
use ticketdash_storage::{FormStore, MemoryFormStore, NewField, NewOption};

/// Guild and user sent by [`send_json`].
pub const GUILD_ID: u64 = 1_100_000_000_000_000_001;
pub const USER_ID: u64 = 2_200_000_000_000_000_002;

/// Creates a router over `storage` that audits into the same store.
pub fn create_test_app(storage: &Arc<MemoryFormStore>) -> axum::Router {
    create_router(AppState::new(Arc::clone(storage)))
}

/// Creates a form owned by [`GUILD_ID`].
pub async fn seed_form(storage: &MemoryFormStore) -> i32 {
    storage
        .create_form(GUILD_ID, "Support", "seededformcustomid")
        .await
        .unwrap()
        .id
}

/// Adds an input to a form, returning its id.
pub async fn seed_field(
    storage: &MemoryFormStore,
    form_id: i32,
    position: u8,
    field_type: u8,
    option_values: &[&str],
) -> i32 {
    let mut tx = storage.begin().await.unwrap();
    let field_id = tx
        .create_field(&NewField {
            form_id,
            field_type,
            position,
            custom_id: format!("seededfield{position}"),
            label: format!("Question {position}"),
            description: None,
            placeholder: None,
            style: Some(1),
            required: true,
            min_length: None,
            max_length: None,
        })
        .await
        .unwrap();
    for (value, option_position) in option_values.iter().zip(1u8..) {
        tx.create_option(&NewOption {
            field_id,
            position: option_position,
            label: value.to_uppercase(),
            description: None,
            value: value.to_string(),
        })
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();
    field_id
}

/// Sends a request as [`GUILD_ID`]/[`USER_ID`] and returns status + parsed JSON.
///
/// Empty bodies parse as `{}`.
pub async fn send_json(
    app: axum::Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    send_as(app, method, uri, body, GUILD_ID).await
}

/// Like [`send_json`] but acting for `guild_id`.
pub async fn send_as(
    app: axum::Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
    guild_id: u64,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-guild-id", guild_id.to_string())
        .header("x-user-id", USER_ID.to_string());
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| {
            serde_json::json!({ "raw_body": String::from_utf8_lossy(&body).to_string() })
        })
    };
    (status, json)
}

/// `PATCH /forms/{form_id}/inputs`.
pub async fn patch_inputs(
    storage: &Arc<MemoryFormStore>,
    form_id: i32,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(
        create_test_app(storage),
        Method::PATCH,
        &format!("/forms/{form_id}/inputs"),
        Some(body),
    )
    .await
}

/// (position, custom_id, option values) of every input, in position order.
pub async fn layout(storage: &MemoryFormStore, form_id: i32) -> Vec<(u8, String, Vec<String>)> {
    storage
        .list_fields(form_id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| {
            (
                f.field.position,
                f.field.custom_id,
                f.options.into_iter().map(|o| o.value).collect(),
            )
        })
        .collect()
}
