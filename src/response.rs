//! Success bodies: the record or the list of records itself, no wrapper.

use axum::{http::StatusCode, Json};
use serde_json::Value;

/// 201 with the stored record.
pub fn created(record: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(record))
}

pub fn record(record: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(record))
}

/// 200 with a JSON array; empty when nothing matches.
pub fn records(records: Vec<Value>) -> (StatusCode, Json<Vec<Value>>) {
    (StatusCode::OK, Json(records))
}
