use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Field name -> messages, flattened from a backend error body.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Login rejected. Carries the backend payload untouched.
    #[error("login rejected: {0}")]
    Credential(Value),

    /// Registration rejected, by the backend or by the local form checks.
    #[error("registration rejected: {payload}")]
    Validation { payload: Value, fields: FieldErrors },

    /// The stored or presented token could not be verified. The session has been dropped.
    #[error("session is no longer valid")]
    SessionInvalid,

    /// Transport failure or server-side error. Never retried automatically.
    #[error("network error: {0}")]
    Network(String),

    /// Tokens could not be written to durable storage; no session was created.
    #[error("token storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn validation(payload: Value) -> Self {
        let fields = field_errors(&payload);
        AuthError::Validation { payload, fields }
    }

    /// The backend payload, verbatim, for the error kinds that carry one.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            AuthError::Credential(payload) | AuthError::Validation { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Messages for one form field, if the error names that field.
    pub fn field(&self, name: &str) -> Option<&[String]> {
        match self {
            AuthError::Validation { fields, .. } => fields.get(name).map(Vec::as_slice),
            _ => None,
        }
    }

    /// Single line suitable for showing next to a form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Credential(payload) | AuthError::Validation { payload, .. } => {
                let fields = field_errors(payload);
                if let Some(detail) = fields.get("detail") {
                    return detail.join(", ");
                }
                if let Some(general) = fields.get("non_field_errors") {
                    return general.join(", ");
                }
                if fields.is_empty() {
                    return "Request rejected".to_string();
                }
                fields
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.join(", ")))
                    .collect::<Vec<_>>()
                    .join("; ")
            }
            AuthError::SessionInvalid => "Your session has expired, please sign in again".into(),
            AuthError::Network(_) => "Could not reach the server, please try again".into(),
            AuthError::Storage(_) => "Could not save your session on this device".into(),
        }
    }
}

/// Flatten a backend error body into per-field messages.
///
/// Accepts `{"field": ["msg"]}`, `{"field": "msg"}`, nested serializer
/// errors (`{"user": {"username": ["msg"]}}`, merged under the inner key)
/// and bare strings or lists (reported as `non_field_errors`).
pub fn field_errors(payload: &Value) -> FieldErrors {
    let mut out = FieldErrors::new();
    collect(None, payload, &mut out);
    out
}

fn collect(key: Option<&str>, value: &Value, out: &mut FieldErrors) {
    let slot = key.unwrap_or("non_field_errors");
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                collect(Some(k), v, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) => collect(None, item, out),
                    other => collect(Some(slot), other, out),
                }
            }
        }
        Value::String(s) => out.entry(slot.to_string()).or_default().push(s.clone()),
        Value::Null => {}
        other => out.entry(slot.to_string()).or_default().push(other.to_string()),
    }
}
