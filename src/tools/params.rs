//! Parameter descriptors and argument coercion.
//!
//! Models frequently send `"true"` for booleans, `"10"` for numbers, a JSON
//! string for an array, or camelCase keys. Arguments are coerced against the
//! descriptor before any handler sees them.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<ParamType>),
    Object,
}

impl ParamType {
    fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::Object => json!({"type": "object"}),
            ParamType::Array(item) => json!({"type": "array", "items": item.schema()}),
        }
    }

    fn label(&self) -> String {
        match self {
            ParamType::String => "a string".into(),
            ParamType::Number => "a number".into(),
            ParamType::Integer => "an integer".into(),
            ParamType::Boolean => "a boolean".into(),
            ParamType::Object => "an object".into(),
            ParamType::Array(item) => format!("an array of {}", item.label().trim_start_matches("a ").trim_start_matches("an ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub required: bool,
    pub description: String,
    pub enum_values: Vec<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
            enum_values: Vec::new(),
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Number, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn object(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Object, description)
    }

    pub fn array(name: &str, item: ParamType, description: &str) -> Self {
        Self::new(name, ParamType::Array(Box::new(item)), description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|v| v.to_string()).collect();
        self
    }
}

/// JSON Schema object describing `params`.
pub fn json_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    for p in params {
        let mut schema = p.kind.schema();
        if let Some(obj) = schema.as_object_mut() {
            obj.insert("description".into(), Value::String(p.description.clone()));
            if !p.enum_values.is_empty() {
                obj.insert("enum".into(), json!(p.enum_values));
            }
        }
        properties.insert(p.name.clone(), schema);
    }
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// `startLine` -> `start_line`.
pub fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn type_error(name: &str, kind: &ParamType) -> ToolError {
    ToolError::BadRequest(format!("Parameter '{}' must be {}", name, kind.label()))
}

fn coerce_value(name: &str, kind: &ParamType, value: Value) -> ToolResult<Value> {
    match (kind, value) {
        (ParamType::String, Value::String(s)) => Ok(Value::String(s)),
        (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ParamType::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(type_error(name, kind)),
        },

        (ParamType::Number, Value::Number(n)) => Ok(Value::Number(n)),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| type_error(name, kind)),

        (ParamType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(Value::Number(n))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(json!(f as i64)),
                    _ => Err(type_error(name, kind)),
                }
            }
        }
        (ParamType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|i| json!(i))
            .map_err(|_| type_error(name, kind)),

        (ParamType::Object, Value::Object(o)) => Ok(Value::Object(o)),
        (ParamType::Object, Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(o)) => Ok(Value::Object(o)),
            _ => Err(type_error(name, kind)),
        },

        (ParamType::Array(item), Value::Array(items)) => items
            .into_iter()
            .map(|v| coerce_value(name, item, v))
            .collect::<ToolResult<Vec<_>>>()
            .map(Value::Array),
        (ParamType::Array(item), Value::String(s)) if s.trim_start().starts_with('[') => {
            match serde_json::from_str::<Value>(&s) {
                Ok(parsed @ Value::Array(_)) => coerce_value(name, kind, parsed),
                _ => Err(type_error(name, kind)),
            }
        }
        (ParamType::Array(item), single) => {
            Ok(Value::Array(vec![coerce_value(name, item, single)?]))
        }

        _ => Err(type_error(name, kind)),
    }
}

/// Coerce `args` against `params`: accept camelCase aliases, convert
/// scalar encodings, check required parameters and enums. Unknown keys pass
/// through untouched; explicit nulls on optional parameters are dropped.
pub fn coerce_args(params: &[ParamSpec], args: Value) -> ToolResult<Value> {
    let mut map = match args {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        Value::String(s) if s.trim().is_empty() => Map::new(),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(ToolError::BadRequest(
                    "Tool arguments must be a JSON object".to_string(),
                ))
            }
        },
        _ => {
            return Err(ToolError::BadRequest(
                "Tool arguments must be a JSON object".to_string(),
            ))
        }
    };

    let aliased: Vec<(String, String)> = map
        .keys()
        .filter(|k| !params.iter().any(|p| &p.name == *k))
        .filter_map(|k| {
            let snake = snake_case(k);
            params
                .iter()
                .any(|p| p.name == snake)
                .then(|| (k.clone(), snake))
        })
        .collect();
    for (alias, name) in aliased {
        if let Some(value) = map.remove(&alias) {
            map.entry(name).or_insert(value);
        }
    }

    for p in params {
        let value = match map.remove(&p.name) {
            Some(Value::Null) | None => {
                if p.required {
                    return Err(ToolError::BadRequest(format!(
                        "Missing required parameter '{}'",
                        p.name
                    )));
                }
                continue;
            }
            Some(value) => value,
        };

        let value = coerce_value(&p.name, &p.kind, value)?;
        if !p.enum_values.is_empty() {
            if let Some(s) = value.as_str() {
                if !p.enum_values.iter().any(|e| e == s) {
                    return Err(ToolError::BadRequest(format!(
                        "Parameter '{}' must be one of: {}",
                        p.name,
                        p.enum_values.join(", ")
                    )));
                }
            }
        }
        map.insert(p.name.clone(), value);
    }

    Ok(Value::Object(map))
}

/// Deserialize coerced arguments into a handler's typed struct.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> ToolResult<T> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::BadRequest(format!("Invalid arguments for {}: {}", tool, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("filename", "File").required(),
            ParamSpec::integer("start_line", "First line"),
            ParamSpec::boolean("include_line_numbers", "Numbers"),
            ParamSpec::array("filenames", ParamType::String, "Files"),
            ParamSpec::string("priority", "Priority").one_of(&["low", "medium", "high"]),
        ]
    }

    #[test]
    fn test_coerces_strings_and_aliases() {
        let out = coerce_args(
            &specs(),
            json!({
                "filename": "a.rs",
                "startLine": "12",
                "includeLineNumbers": "TRUE",
                "filenames": "[\"a\", \"b\"]",
                "extra": 1
            }),
        )
        .unwrap();
        assert_eq!(out["start_line"], 12);
        assert_eq!(out["include_line_numbers"], true);
        assert_eq!(out["filenames"], json!(["a", "b"]));
        assert_eq!(out["extra"], 1);
        assert!(out.get("startLine").is_none());
    }

    #[test]
    fn test_single_value_becomes_array() {
        let out = coerce_args(&specs(), json!({"filename": "a", "filenames": "only.rs"})).unwrap();
        assert_eq!(out["filenames"], json!(["only.rs"]));
    }

    #[test]
    fn test_rejects_missing_and_invalid() {
        let err = coerce_args(&specs(), json!({})).unwrap_err();
        assert_eq!(err.message(), "Missing required parameter 'filename'");

        let err = coerce_args(&specs(), json!({"filename": "a", "start_line": "ten"})).unwrap_err();
        assert!(err.message().contains("must be an integer"));

        let err = coerce_args(&specs(), json!({"filename": "a", "priority": "urgent"})).unwrap_err();
        assert!(err.message().contains("one of: low, medium, high"));

        assert!(coerce_args(&specs(), json!([1])).is_err());
    }

    #[test]
    fn test_null_optional_is_dropped() {
        let out = coerce_args(&specs(), json!({"filename": "a", "start_line": null})).unwrap();
        assert!(out.get("start_line").is_none());
    }

    #[test]
    fn test_schema_lists_required() {
        let schema = json_schema(&specs());
        assert_eq!(schema["required"], json!(["filename"]));
        assert_eq!(schema["properties"]["filenames"]["items"]["type"], "string");
        assert_eq!(schema["properties"]["priority"]["enum"][2], "high");
        assert_eq!(snake_case("maxResults"), "max_results");
    }
}
