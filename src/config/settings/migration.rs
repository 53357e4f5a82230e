// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::Value;

/// Rewrite keys written by older releases before deserializing.
///
/// Older config files stored the rate limit as an integer and used
/// `"api_type": "openai"` in lower case.
pub(super) fn migrate_on_load(value: Value) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };

    if let Some(Value::String(api_type)) = map.get("api_type") {
        let normalized = match api_type.to_lowercase().as_str() {
            "openai" => Some("OpenAI"),
            "gemini" => Some("Gemini"),
            "ollama" => Some("Ollama"),
            _ => None,
        };
        if let Some(normalized) = normalized {
            map.insert("api_type".to_string(), Value::String(normalized.to_string()));
        }
    }

    if let Some(Value::String(seconds)) = map.get("rate_limit_seconds") {
        if let Ok(parsed) = seconds.trim().parse::<f64>() {
            map.insert("rate_limit_seconds".to_string(), serde_json::json!(parsed));
        }
    }

    Value::Object(map)
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is serialized current struct.
/// Overlay values take priority.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}
