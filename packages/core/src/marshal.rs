//! Conversion between typed values and their JSON wire form.
//!
//! Every value that crosses the wire is checked against its [`TypeSpec`]:
//!
//! - optional values accept `null` as the absent marker;
//! - enumerations must use one of their declared names;
//! - records drop unknown fields and fill declared defaults;
//! - tagged unions dispatch on their discriminant field.
//!
//! Query parameters travel as individual tokens holding JSON text. A token
//! that is not valid JSON is taken as a bare string when the parameter is
//! text or an enumeration, so `?variant=server` and `?variant="server"` mean
//! the same thing.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::types::{RecordSpec, TypeSpec, UnionSpec};
use crate::wire::ErrorKind;

/// Marshalling failures. All of them are client mistakes and surface as
/// `400 Bad Request` at the router boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarshalError {
    #[error("missing field `{field}` in {record}")]
    MissingField { record: String, field: String },

    #[error("unknown value {value:?} for enumeration {name}")]
    UnknownEnumValue { name: String, value: String },

    #[error("unknown variant {variant:?} for {name}")]
    UnknownVariant { name: String, variant: String },

    #[error("missing discriminant field `{tag}` for {name}")]
    MissingDiscriminant { name: String, tag: String },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The JSON was well-formed for the schema but not for the Rust type.
    #[error("{0}")]
    Serde(String),
}

impl MarshalError {
    /// The wire error kind this failure is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarshalError::MissingField { .. } => ErrorKind::MissingField,
            MarshalError::UnknownEnumValue { .. } => ErrorKind::UnknownEnumValue,
            MarshalError::UnknownVariant { .. } | MarshalError::MissingDiscriminant { .. } => {
                ErrorKind::UnknownVariant
            }
            _ => ErrorKind::BadRequest,
        }
    }
}

// ---------------------------------------------------------------------------
// Untyped
// ---------------------------------------------------------------------------

/// Check `value` against `spec` and return its canonical form.
pub fn normalize(spec: &TypeSpec, value: Value) -> Result<Value, MarshalError> {
    match (spec, value) {
        (TypeSpec::Any, v) => Ok(v),
        (TypeSpec::Unit, Value::Null) => Ok(Value::Null),
        (TypeSpec::Text, v @ Value::String(_)) => Ok(v),
        (TypeSpec::Boolean, v @ Value::Bool(_)) => Ok(v),
        (TypeSpec::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
        (TypeSpec::Float, v @ Value::Number(_)) => Ok(v),
        (TypeSpec::Optional(_), Value::Null) => Ok(Value::Null),
        (TypeSpec::Optional(inner), v) => normalize(inner, v),
        (TypeSpec::Sequence(inner), Value::Array(items)) => items
            .into_iter()
            .map(|item| normalize(inner, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (TypeSpec::Enum(e), Value::String(s)) => {
            if e.contains(&s) {
                Ok(Value::String(s))
            } else {
                Err(MarshalError::UnknownEnumValue {
                    name: e.name.clone(),
                    value: s,
                })
            }
        }
        (TypeSpec::Record(r), Value::Object(map)) => normalize_record(r, map).map(Value::Object),
        (TypeSpec::Union(u), Value::Object(map)) => normalize_union(u, map),
        (spec, other) => Err(MarshalError::TypeMismatch {
            expected: spec.to_string(),
            found: describe(&other).to_string(),
        }),
    }
}

fn normalize_record(
    spec: &RecordSpec,
    mut incoming: Map<String, Value>,
) -> Result<Map<String, Value>, MarshalError> {
    let mut out = Map::new();
    for field in &spec.fields {
        let value = match incoming.remove(&field.name) {
            Some(v) => normalize(&field.ty, v)?,
            None => match &field.default {
                Some(default) => default.clone(),
                None => {
                    return Err(MarshalError::MissingField {
                        record: spec.name.clone(),
                        field: field.name.clone(),
                    })
                }
            },
        };
        out.insert(field.name.clone(), value);
    }
    // Whatever is left in `incoming` is unknown and dropped.
    Ok(out)
}

fn normalize_union(spec: &UnionSpec, mut incoming: Map<String, Value>) -> Result<Value, MarshalError> {
    let discriminant = match incoming.remove(&spec.tag) {
        Some(Value::String(s)) => s,
        _ => {
            return Err(MarshalError::MissingDiscriminant {
                name: spec.name.clone(),
                tag: spec.tag.clone(),
            })
        }
    };
    let variant = spec
        .find(&discriminant)
        .ok_or_else(|| MarshalError::UnknownVariant {
            name: spec.name.clone(),
            variant: discriminant.clone(),
        })?;
    let mut out = normalize_record(variant, incoming)?;
    out.insert(spec.tag.clone(), Value::String(discriminant));
    Ok(Value::Object(out))
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Typed
// ---------------------------------------------------------------------------

/// Serialise `value` and check it against `spec`.
pub fn encode<T: Serialize + ?Sized>(spec: &TypeSpec, value: &T) -> Result<Value, MarshalError> {
    let json = serde_json::to_value(value).map_err(|e| MarshalError::Serde(e.to_string()))?;
    normalize(spec, json)
}

/// Check `value` against `spec` and deserialise it into `T`.
pub fn decode<T: DeserializeOwned>(spec: &TypeSpec, value: Value) -> Result<T, MarshalError> {
    let json = normalize(spec, value)?;
    serde_json::from_value(json).map_err(|e| MarshalError::Serde(e.to_string()))
}

// ---------------------------------------------------------------------------
// Query tokens
// ---------------------------------------------------------------------------

/// Render a query-safe value as a single token (JSON text, before URL escaping).
pub fn encode_query(spec: &TypeSpec, value: &Value) -> Result<String, MarshalError> {
    if !spec.is_query_safe() {
        return Err(MarshalError::TypeMismatch {
            expected: "a scalar or enumeration".into(),
            found: spec.to_string(),
        });
    }
    let json = normalize(spec, value.clone())?;
    serde_json::to_string(&json).map_err(|e| MarshalError::Serde(e.to_string()))
}

/// Parse a query token (already URL-unescaped) against `spec`.
pub fn decode_query(spec: &TypeSpec, token: &str) -> Result<Value, MarshalError> {
    let parsed = match serde_json::from_str::<Value>(token) {
        Ok(v @ (Value::String(_) | Value::Null)) => v,
        Ok(v) => {
            if spec.accepts_bare_text() {
                Value::String(token.to_string())
            } else {
                v
            }
        }
        Err(e) => {
            if spec.accepts_bare_text() {
                Value::String(token.to_string())
            } else {
                return Err(MarshalError::InvalidJson(e.to_string()));
            }
        }
    };
    normalize(spec, parsed)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::types::{EnumSpec, WireType};

    fn mode() -> TypeSpec {
        EnumSpec::new("ShutdownMode", ["REBOOT", "POWEROFF"]).into()
    }

    fn setting() -> TypeSpec {
        RecordSpec::new("KeyboardSetting")
            .field::<String>("layout")
            .field_or::<String>("variant", json!(""))
            .optional::<String>("toggle")
            .into()
    }

    fn step() -> TypeSpec {
        UnionSpec::new("AnyStep")
            .variant(
                RecordSpec::new("StepPressKey")
                    .field::<Vec<String>>("symbols")
                    .field::<Vec<i64>>("keycodes"),
            )
            .variant(
                RecordSpec::new("StepResult")
                    .field::<String>("layout")
                    .field::<String>("variant"),
            )
            .into()
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(tag = "$type")]
    enum AnyStep {
        StepPressKey { symbols: Vec<String>, keycodes: Vec<i64> },
        StepResult { layout: String, variant: String },
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(normalize(&TypeSpec::Text, json!("en_US")).unwrap(), json!("en_US"));
        assert_eq!(normalize(&TypeSpec::Integer, json!(42)).unwrap(), json!(42));
        assert_eq!(normalize(&TypeSpec::Boolean, json!(true)).unwrap(), json!(true));
        assert_eq!(normalize(&TypeSpec::Float, json!(1)).unwrap(), json!(1));
    }

    #[test]
    fn integer_rejects_fraction() {
        let err = normalize(&TypeSpec::Integer, json!(1.5)).unwrap_err();
        assert!(matches!(err, MarshalError::TypeMismatch { .. }));
    }

    #[test]
    fn optional_accepts_absent_marker() {
        let spec = Option::<String>::type_spec();
        assert_eq!(normalize(&spec, Value::Null).unwrap(), Value::Null);
        assert_eq!(normalize(&spec, json!("x")).unwrap(), json!("x"));
        let back: Option<String> = decode(&spec, Value::Null).unwrap();
        assert_eq!(back, None);
    }

    #[test]
    fn non_optional_rejects_null() {
        let err = normalize(&TypeSpec::Text, Value::Null).unwrap_err();
        assert_eq!(
            err,
            MarshalError::TypeMismatch {
                expected: "str".into(),
                found: "null".into()
            }
        );
    }

    #[test]
    fn sequence_preserves_order() {
        let disks = vec!["sdb".to_string(), "sda".to_string(), "nvme0n1".to_string()];
        let spec = Vec::<String>::type_spec();
        let wire = encode(&spec, &disks).unwrap();
        assert_eq!(wire, json!(["sdb", "sda", "nvme0n1"]));
        let back: Vec<String> = decode(&spec, wire).unwrap();
        assert_eq!(back, disks);
    }

    #[test]
    fn enum_uses_declared_names() {
        assert_eq!(normalize(&mode(), json!("REBOOT")).unwrap(), json!("REBOOT"));
        let err = normalize(&mode(), json!("HIBERNATE")).unwrap_err();
        assert_eq!(
            err,
            MarshalError::UnknownEnumValue {
                name: "ShutdownMode".into(),
                value: "HIBERNATE".into()
            }
        );
        assert_eq!(err.kind(), ErrorKind::UnknownEnumValue);
    }

    #[test]
    fn record_fills_defaults_and_drops_unknown_fields() {
        let wire = json!({ "layout": "us", "added_in_a_later_release": 1 });
        let out = normalize(&setting(), wire).unwrap();
        assert_eq!(out, json!({ "layout": "us", "variant": "", "toggle": null }));
    }

    #[test]
    fn record_missing_required_field() {
        let err = normalize(&setting(), json!({ "variant": "intl" })).unwrap_err();
        assert_eq!(
            err,
            MarshalError::MissingField {
                record: "KeyboardSetting".into(),
                field: "layout".into()
            }
        );
        assert_eq!(err.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn union_roundtrip_through_serde_tag() {
        let value = AnyStep::StepPressKey {
            symbols: vec!["z".into(), "y".into()],
            keycodes: vec![52, 29],
        };
        let wire = encode(&step(), &value).unwrap();
        assert_eq!(wire["$type"], json!("StepPressKey"));
        let back: AnyStep = decode(&step(), wire).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn union_rejects_unknown_variant() {
        let err = normalize(&step(), json!({ "$type": "StepTeleport" })).unwrap_err();
        assert_eq!(
            err,
            MarshalError::UnknownVariant {
                name: "AnyStep".into(),
                variant: "StepTeleport".into()
            }
        );
        let err = normalize(&step(), json!({ "layout": "us" })).unwrap_err();
        assert!(matches!(err, MarshalError::MissingDiscriminant { .. }));
        assert_eq!(err.kind(), ErrorKind::UnknownVariant);
    }

    #[test]
    fn query_tokens_accept_json_and_bare_text() {
        assert_eq!(decode_query(&TypeSpec::Boolean, "true").unwrap(), json!(true));
        assert_eq!(decode_query(&TypeSpec::Integer, "2048").unwrap(), json!(2048));
        assert_eq!(decode_query(&TypeSpec::Text, "\"eth0\"").unwrap(), json!("eth0"));
        assert_eq!(decode_query(&TypeSpec::Text, "eth0").unwrap(), json!("eth0"));
        // A text parameter keeps digits as text.
        assert_eq!(decode_query(&TypeSpec::Text, "42").unwrap(), json!("42"));
        assert_eq!(decode_query(&mode(), "POWEROFF").unwrap(), json!("POWEROFF"));
        assert_eq!(
            decode_query(&Option::<String>::type_spec(), "null").unwrap(),
            Value::Null
        );
        assert!(matches!(
            decode_query(&TypeSpec::Boolean, "yes"),
            Err(MarshalError::InvalidJson(_))
        ));
        assert!(matches!(
            decode_query(&mode(), "HALT"),
            Err(MarshalError::UnknownEnumValue { .. })
        ));
    }

    #[test]
    fn query_encoding_is_json_text() {
        assert_eq!(encode_query(&TypeSpec::Boolean, &json!(true)).unwrap(), "true");
        assert_eq!(encode_query(&TypeSpec::Text, &json!("en_US")).unwrap(), "\"en_US\"");
        assert!(encode_query(&Vec::<String>::type_spec(), &json!([])).is_err());
    }
}
