use serde_json::Value as JsonValue;

const REDACTED: &str = "[REDACTED]";

/// Masks student-authored text and identity fields before a payload is logged.
pub fn redact_student_text(data: &JsonValue) -> JsonValue {
    match data {
        JsonValue::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, value) in map {
                let masked = if is_student_text_field(key) {
                    mask(value)
                } else {
                    redact_student_text(value)
                };
                redacted.insert(key.clone(), masked);
            }
            JsonValue::Object(redacted)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact_student_text).collect()),
        _ => data.clone(),
    }
}

/// Loggable stand-in for free text: its length, never its content.
pub fn describe_text(text: &str) -> String {
    format!("<{} words>", text.split_whitespace().count())
}

fn is_student_text_field(field_name: &str) -> bool {
    matches!(
        field_name.to_ascii_lowercase().as_str(),
        "goal" | "goaltext" | "reflection" | "reflectiontext" | "text" | "name" | "email"
            | "answers"
    )
}

fn mask(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) if !s.is_empty() => JsonValue::String(REDACTED.to_string()),
        JsonValue::Array(items) if !items.is_empty() => JsonValue::String(REDACTED.to_string()),
        _ => value.clone(),
    }
}
