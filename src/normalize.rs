//! Mapping of raw token endpoint payloads into [`AccessToken`] records.

use std::collections::HashMap;

use serde_json::Value;

use crate::types::unix_now;
use crate::{AccessToken, ImportProvider};

const KNOWN_FIELDS: &[&str] = &[
    "access_token",
    "refresh_token",
    "expires_at",
    "expires_in",
    "scope",
];

/// Maps `raw` through the provider's handler. `previous` is the token being
/// refreshed, if any. `None` means the payload does not describe a usable token.
pub fn normalize(
    provider: &dyn ImportProvider,
    previous: Option<&AccessToken>,
    raw: &Value,
) -> Option<AccessToken> {
    provider.normalize(previous, raw)
}

/// Provider-agnostic mapping shared by all handlers.
///
/// Providers that omit an unchanged `refresh_token` on refresh inherit it from
/// `previous`. A relative `expires_in` is converted to an absolute `expires_at`
/// only when the payload has no `expires_at` of its own.
pub fn map_token_response(previous: Option<&AccessToken>, raw: &Value) -> Option<AccessToken> {
    let object = raw.as_object()?;

    let access_token = object
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())?
        .to_string();

    let refresh_token = non_empty_str(object.get("refresh_token"))
        .or_else(|| previous.and_then(|token| token.refresh_token.clone()));

    let expires_at = object
        .get("expires_at")
        .and_then(as_seconds)
        .or_else(|| {
            object
                .get("expires_in")
                .and_then(as_seconds)
                .map(|expires_in| unix_now().saturating_add(expires_in))
        });

    let scope = non_empty_str(object.get("scope"));

    let extra: HashMap<String, Value> = object
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(AccessToken {
        access_token,
        refresh_token,
        expires_at,
        scope,
        extra,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// Some backends serialize timestamps as strings.
fn as_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
