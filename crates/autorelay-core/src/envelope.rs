//! Management-API response envelopes.
//!
//! Every management endpoint answers HTTP 200; success/failure lives in the
//! `status` field (`1` = ok, `0` = failed). Dynamic proxy routes use the
//! 404 envelope when a handler signals an empty-body failure.

use serde_json::{Value, json};

/// `{status: 1, msg}` — management operation succeeded.
pub fn ok(msg: &str) -> Value {
    json!({ "status": 1, "msg": msg })
}

/// `{status: 1, data}` — management read succeeded.
pub fn ok_data(data: Value) -> Value {
    json!({ "status": 1, "data": data })
}

/// `{status: 0, msg}` — management operation failed (still HTTP 200).
pub fn fail(msg: &str) -> Value {
    json!({ "status": 0, "msg": msg })
}

/// Canonical not-found envelope for dynamic routes.
pub fn not_found() -> Value {
    json!({ "code": 404, "data": null, "msg": "Not Found" })
}
