//! Declared parameter shapes for tools.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Enum(&'static [&'static str]),
    Object,
    Array,
}

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl Param {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }

    fn schema(&self) -> Value {
        let mut schema = match self.kind {
            ParamKind::String => json!({"type": "string"}),
            ParamKind::Number => json!({"type": "number"}),
            ParamKind::Integer => json!({"type": "integer"}),
            ParamKind::Boolean => json!({"type": "boolean"}),
            ParamKind::Enum(values) => json!({"type": "string", "enum": values}),
            ParamKind::Object => json!({"type": "object"}),
            ParamKind::Array => json!({"type": "array"}),
        };
        schema["description"] = Value::String(self.description.to_string());
        schema
    }

    /// Check one value, returning it in canonical form.
    fn check(&self, value: &Value) -> Result<Value, String> {
        let ok = match self.kind {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Integer => return integer(value).ok_or_else(|| self.mismatch("an integer")),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Enum(values) => {
                return match value.as_str() {
                    Some(s) if values.contains(&s) => Ok(value.clone()),
                    _ => Err(format!(
                        "parameter '{}' must be one of: {}",
                        self.name,
                        values.join(", ")
                    )),
                };
            }
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
        };
        if ok {
            Ok(value.clone())
        } else {
            Err(self.mismatch(self.kind_name()))
        }
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            ParamKind::String | ParamKind::Enum(_) => "a string",
            ParamKind::Number => "a number",
            ParamKind::Integer => "an integer",
            ParamKind::Boolean => "a boolean",
            ParamKind::Object => "an object",
            ParamKind::Array => "an array",
        }
    }

    fn mismatch(&self, expected: &str) -> String {
        format!("parameter '{}' must be {}", self.name, expected)
    }
}

/// Integers may arrive as integral floats (`200.0`).
fn integer(value: &Value) -> Option<Value> {
    if value.is_i64() || value.is_u64() {
        return Some(value.clone());
    }
    let f = value.as_f64()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then(|| json!(f as i64))
}

/// JSON Schema for a tool's `inputSchema`.
pub fn input_schema(params: &[Param]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.to_string(), p.schema()))
        .collect();
    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Validate caller arguments against `params`.
///
/// Returns an object holding only the declared parameters that were given;
/// nothing is defaulted. `null` counts as absent.
pub fn normalize(params: &[Param], arguments: &Value) -> Result<Value, String> {
    let empty = Map::new();
    let given = match arguments {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return Err("arguments must be an object".to_string()),
    };

    let mut out = Map::new();
    for param in params {
        match given.get(param.name) {
            None | Some(Value::Null) if param.required => {
                return Err(format!("missing required parameter '{}'", param.name));
            }
            None | Some(Value::Null) => {}
            Some(value) => {
                out.insert(param.name.to_string(), param.check(value)?);
            }
        }
    }
    Ok(Value::Object(out))
}
