// SPDX-License-Identifier: MIT OR Apache-2.0
//! CWL ↔ IR type mapping.

use serde_json::Value;
use wf2wf_core::ParameterType;

/// Parse a CWL type expression into an IR parameter type.
///
/// Handles the string shorthands (`"File"`, `"File[]"`, `"int?"`), the
/// structured forms (`{"type": "array", "items": ...}`, records, enums),
/// and union lists (`["null", "File"]`).
#[must_use]
pub fn cwl_type_to_ir(value: &Value) -> ParameterType {
    match value {
        Value::String(s) => string_type(s),
        Value::Array(members) => ParameterType::Union {
            members: members.iter().map(cwl_type_to_ir).collect(),
        },
        Value::Object(obj) => match obj.get("type").and_then(Value::as_str) {
            Some("array") => ParameterType::array(
                obj.get("items").map_or(ParameterType::String, cwl_type_to_ir),
            ),
            Some("record") => {
                let fields = obj
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|fields| {
                        fields
                            .iter()
                            .filter_map(|f| {
                                let name = f.get("name")?.as_str()?.to_string();
                                let ty = cwl_type_to_ir(f.get("type")?);
                                Some((name, ty))
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ParameterType::Record { fields }
            }
            Some("enum") => {
                let symbols = obj
                    .get("symbols")
                    .and_then(Value::as_array)
                    .map(|syms| {
                        syms.iter()
                            .filter_map(|s| s.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                ParameterType::Enum { symbols }
            }
            _ => ParameterType::String,
        },
        _ => ParameterType::String,
    }
}

fn string_type(s: &str) -> ParameterType {
    if let Some(base) = s.strip_suffix("[]") {
        return ParameterType::array(string_type(base));
    }
    if let Some(base) = s.strip_suffix('?') {
        return ParameterType::optional(string_type(base));
    }
    match s {
        "null" => ParameterType::Null,
        "boolean" => ParameterType::Boolean,
        "int" => ParameterType::Int,
        "long" => ParameterType::Long,
        "float" => ParameterType::Float,
        "double" => ParameterType::Double,
        "File" => ParameterType::File,
        "Directory" => ParameterType::Directory,
        _ => ParameterType::String,
    }
}

/// Render an IR parameter type as a CWL type expression, preferring the
/// string shorthands.
#[must_use]
pub fn ir_type_to_cwl(ty: &ParameterType) -> Value {
    match ty {
        ParameterType::Null => Value::String("null".into()),
        ParameterType::Boolean => Value::String("boolean".into()),
        ParameterType::Int => Value::String("int".into()),
        ParameterType::Long => Value::String("long".into()),
        ParameterType::Float => Value::String("float".into()),
        ParameterType::Double => Value::String("double".into()),
        ParameterType::String => Value::String("string".into()),
        ParameterType::File => Value::String("File".into()),
        ParameterType::Directory => Value::String("Directory".into()),
        ParameterType::Array { items } => match ir_type_to_cwl(items) {
            Value::String(base) => Value::String(format!("{base}[]")),
            complex => serde_json::json!({"type": "array", "items": complex}),
        },
        ParameterType::Record { fields } => {
            let fields: Vec<Value> = fields
                .iter()
                .map(|(name, ty)| serde_json::json!({"name": name, "type": ir_type_to_cwl(ty)}))
                .collect();
            serde_json::json!({"type": "record", "fields": fields})
        }
        ParameterType::Enum { symbols } => {
            serde_json::json!({"type": "enum", "symbols": symbols})
        }
        ParameterType::Union { members } => {
            Value::Array(members.iter().map(ir_type_to_cwl).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_shorthands() {
        assert_eq!(cwl_type_to_ir(&serde_json::json!("File")), ParameterType::File);
        assert_eq!(
            cwl_type_to_ir(&serde_json::json!("File[]")),
            ParameterType::array(ParameterType::File)
        );
        assert_eq!(
            cwl_type_to_ir(&serde_json::json!("int?")),
            ParameterType::optional(ParameterType::Int)
        );
    }

    #[test]
    fn union_list() {
        let ty = cwl_type_to_ir(&serde_json::json!(["null", "File"]));
        assert_eq!(ty, ParameterType::optional(ParameterType::File));
    }

    #[test]
    fn structured_array() {
        let ty = cwl_type_to_ir(&serde_json::json!({"type": "array", "items": "string"}));
        assert_eq!(ty, ParameterType::array(ParameterType::String));
    }

    #[test]
    fn enum_symbols() {
        let ty = cwl_type_to_ir(&serde_json::json!({
            "type": "enum", "symbols": ["a", "b"]
        }));
        assert_eq!(
            ty,
            ParameterType::Enum {
                symbols: vec!["a".into(), "b".into()]
            }
        );
    }

    #[test]
    fn roundtrip_common_types() {
        for ty in [
            ParameterType::File,
            ParameterType::array(ParameterType::File),
            ParameterType::optional(ParameterType::String),
            ParameterType::Enum {
                symbols: vec!["x".into()],
            },
        ] {
            let back = cwl_type_to_ir(&ir_type_to_cwl(&ty));
            assert_eq!(back, ty, "{ty:?}");
        }
    }
}
