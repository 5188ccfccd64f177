//! API error type and error-detail extraction.
//!
//! Failed responses from the dashboard proxy come in several shapes:
//! `{"detail": "..."}` from the data service, `{"error": "..."}` from the
//! proxy itself, `{"detail": [{"loc": [...], "msg": "..."}]}` for request
//! validation, or plain text from anything in between. The extracted
//! message is what the user sees, so it is never empty.

use serde_json::Value;

const MAX_RAW_BODY_CHARS: usize = 300;

/// Error type for API operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Request never completed (connection refused, timeout, DNS)
    Network(String),
    /// Non-2xx response, message already extracted from the body
    Http(u16, String),
    /// Scenario name already taken for this user (shown to the user as-is)
    DuplicateName(String),
    /// 404 from the service
    NotFound(String),
    /// Response body didn't match the expected shape
    Parse(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            ApiError::DuplicateName(msg) => write!(f, "{}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http(code, _) => Some(*code),
            ApiError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Fetch rejected or non-2xx response.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::Http(..) | ApiError::NotFound(_)
        )
    }

    /// Message suitable for a status bar, without the error-kind prefix.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(msg)
            | ApiError::Http(_, msg)
            | ApiError::DuplicateName(msg)
            | ApiError::NotFound(msg)
            | ApiError::Parse(msg) => msg.clone(),
        }
    }

    /// Classify a failed response.
    ///
    /// `scenario_name` is the name being created or renamed. Duplicate-name
    /// detection only applies to those requests; every other failure keeps
    /// the server's own detail.
    pub fn from_response(status: u16, body: &str, scenario_name: Option<&str>) -> Self {
        let detail = extract_error_detail(status, body);

        if let Some(name) = scenario_name {
            if is_duplicate_name_text(&detail) || status == 409 {
                let message = if detail.to_lowercase().contains("already exists") {
                    detail
                } else {
                    duplicate_name_message(name)
                };
                return ApiError::DuplicateName(message);
            }
        }

        if status == 404 {
            return ApiError::NotFound(detail);
        }

        ApiError::Http(status, detail)
    }
}

/// Best human-readable message for a failed response. Never empty.
///
/// Order: structured `detail` / `error` / `message` fields, then the raw
/// body text, then a generic status line.
pub fn extract_error_detail(status: u16, body: &str) -> String {
    let trimmed = body.trim();

    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => {
            if let Some(detail) = detail_from_json(&json) {
                return detail;
            }
        }
        Err(_) => {
            if !trimmed.is_empty() {
                return truncate_chars(trimmed, MAX_RAW_BODY_CHARS);
            }
        }
    }

    format!("Request failed with status {}", status)
}

fn detail_from_json(json: &Value) -> Option<String> {
    match json {
        Value::Object(obj) => ["detail", "error", "message"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(message_from_value)),
        Value::String(_) => message_from_value(json),
        _ => None,
    }
}

fn message_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(validation_entry).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        // {"error": {"message": "..."}}
        Value::Object(obj) => ["message", "detail", "msg"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(message_from_value)),
        _ => None,
    }
}

/// One entry of a validation-error array: `{"loc": ["body", "name"], "msg": "..."}`.
fn validation_entry(item: &Value) -> Option<String> {
    if let Some(s) = item.as_str() {
        let s = s.trim();
        return (!s.is_empty()).then(|| s.to_string());
    }

    let msg = item.get("msg").or_else(|| item.get("message"))?.as_str()?.trim();
    if msg.is_empty() {
        return None;
    }

    let loc: Vec<String> = item
        .get("loc")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if loc.is_empty() {
        Some(msg.to_string())
    } else {
        Some(format!("{}: {}", loc.join("."), msg))
    }
}

fn is_duplicate_name_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("unique constraint")
        || lower.contains("already exists")
        || lower.contains("integrity")
}

fn duplicate_name_message(name: &str) -> String {
    format!(
        "Scenario name '{}' already exists for this user. Please choose a different name.",
        name
    )
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}
