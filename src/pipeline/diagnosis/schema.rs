// Output schemas sent with each inference request, and the validator the
// gateway runs on the response. Only the JSON-schema subset the schemas
// below use is supported: type, properties, required, items.

use serde_json::{json, Value};

/// Fundus schema: closed label set, all three fields required.
pub fn fundus_schema(catalog_labels: &[String]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "disease_name": { "type": "string", "enum": catalog_labels },
            "confidence_score": { "type": "number" },
            "justification": { "type": "string" }
        },
        "required": ["disease_name", "confidence_score", "justification"]
    })
}

/// ERG schema: open interpretation, only the diagnosis is mandatory.
pub fn erg_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "primary_diagnosis": { "type": "string" },
            "detected_conditions": { "type": "array", "items": { "type": "string" } },
            "severity": { "type": "string", "enum": ["mild", "moderate", "severe", "critical"] },
            "confidence_score": { "type": "number" },
            "recommendations": { "type": "string" },
            "follow_up_required": { "type": "boolean" },
            "detailed_findings": { "type": "string" }
        },
        "required": ["primary_diagnosis"]
    })
}

/// Check `value` against `schema`. Returns the first violation found,
/// described with a JSON-pointer-like path.
///
/// `enum` is not enforced: label membership is the reconciler's job, so an
/// off-vocabulary label surfaces as an unknown classification rather than a
/// malformed response. `null` is accepted for optional properties.
pub fn validate(value: &Value, schema: &Value) -> Result<(), String> {
    validate_at(value, schema, "$")
}

fn validate_at(value: &Value, schema: &Value, path: &str) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(value, expected) {
            return Err(format!(
                "{path}: expected {expected}, found {}",
                type_name(value)
            ));
        }
    }

    if let Value::Object(map) = value {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                match map.get(key) {
                    None | Some(Value::Null) => {
                        return Err(format!("{path}.{key}: required property missing"))
                    }
                    Some(_) => {}
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, property_schema) in properties {
                match map.get(key) {
                    None | Some(Value::Null) => {}
                    Some(child) => {
                        validate_at(child, property_schema, &format!("{path}.{key}"))?
                    }
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            validate_at(item, item_schema, &format!("{path}[{i}]"))?;
        }
    }

    Ok(())
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        // Unknown type keywords are not ours to reject.
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
