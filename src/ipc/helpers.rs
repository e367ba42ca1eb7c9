use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppResult;
use crate::ipc::error::{app_err, err, ok};
use crate::ipc::types::Request;

/// Turns a service result into a protocol response.
pub fn respond<T: Serialize>(req: &Request, result: AppResult<T>) -> Value {
    match result {
        Ok(v) => match serde_json::to_value(v) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(e) => app_err(&req.id, &e),
    }
}

/// Deserializes the whole params object. A missing object reads as `{}`.
pub fn params<T: DeserializeOwned>(req: &Request) -> Result<T, Value> {
    let raw = if req.params.is_null() {
        Value::Object(Default::default())
    } else {
        req.params.clone()
    };
    serde_json::from_value(raw).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

pub fn id_param(req: &Request, key: &str) -> Result<i64, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {key}"), None))
}

pub fn str_param(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {key}"), None))
}

pub fn path_param(req: &Request, key: &str) -> Result<PathBuf, Value> {
    let raw = str_param(req, key)?;
    if raw.trim().is_empty() {
        return Err(err(&req.id, "bad_params", format!("{key} must not be empty"), None));
    }
    Ok(PathBuf::from(raw))
}

pub fn bool_param(req: &Request, key: &str) -> bool {
    req.params.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

pub fn limit_param(req: &Request, default: i64) -> i64 {
    req.params
        .get("limit")
        .and_then(|v| v.as_i64())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// Splits `{ "<id_key>": n, ...fields }` into the id and the remaining
/// fields deserialized as a patch.
pub fn patch_params<T: DeserializeOwned>(req: &Request, id_key: &str) -> Result<(i64, T), Value> {
    let id = id_param(req, id_key)?;
    let mut rest = req.params.clone();
    if let Some(obj) = rest.as_object_mut() {
        obj.remove(id_key);
    }
    let patch =
        serde_json::from_value(rest).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))?;
    Ok((id, patch))
}
