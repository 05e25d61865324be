use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "scanner": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "policy_dir": { "type": "string" },
                    "plugin_dir": { "type": "string" },
                    "default_policy": { "type": "string", "minLength": 1 },
                    "attack_policy": { "type": "string", "minLength": 1 },
                    "default_threshold": { "type": "string", "enum": ["OFF", "LOW", "MEDIUM", "HIGH"] },
                    "default_strength": { "type": "string", "enum": ["LOW", "MEDIUM", "HIGH", "INSANE"] },
                    "excluded_urls": { "type": "array", "items": { "type": "string" } }
                }
            },
            "attack_mode": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "pool_size": { "type": "integer", "minimum": 1 },
                    "rescan_on_scope_change": { "type": "boolean" },
                    "poll_interval_ms": { "type": "integer", "minimum": 1 },
                    "status_debounce_ms": { "type": "integer", "minimum": 0 }
                }
            },
            "api": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "host": { "type": "string" },
                    "port": { "type": "integer", "minimum": 1, "maximum": 65535 }
                }
            }
        }
    })
});
