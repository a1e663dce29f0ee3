//! Decoding of inbound request arguments against an endpoint's parameters.
//!
//! Query parameters arrive as URL-decoded `(name, token)` pairs, as produced by
//! axum's `Query` extractor, holding JSON text (see
//! [`keel::marshal::decode_query`]); the body parameter, if any, is the whole
//! request body. Every declared parameter ends up in [`Arguments`] with its
//! [`Presence`], so handlers can tell "omitted" from "explicitly null".

use std::collections::HashMap;

use keel::{marshal, EndpointEntry, MarshalError};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::handlers::HandlerError;

/// How an argument was supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Not sent; the declared default was applied.
    Omitted,
    /// Sent as the absent marker (`null`).
    Null,
    /// Sent with a value.
    Given,
}

#[derive(Debug, Clone)]
struct Argument {
    value: Value,
    presence: Presence,
}

/// The decoded, schema-checked arguments of one request.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: HashMap<String, Argument>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument as if the caller had sent it. Used by tests and by
    /// code that invokes handlers directly.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        let presence = if value.is_null() {
            Presence::Null
        } else {
            Presence::Given
        };
        self.values.insert(name.into(), Argument { value, presence });
        self
    }

    /// Deserialise argument `name` into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, HandlerError> {
        let arg = self.values.get(name).ok_or_else(|| HandlerError::Argument {
            param: name.to_string(),
            source: MarshalError::MissingField {
                record: "arguments".into(),
                field: name.to_string(),
            },
        })?;
        serde_json::from_value(arg.value.clone()).map_err(|e| HandlerError::Argument {
            param: name.to_string(),
            source: MarshalError::Serde(e.to_string()),
        })
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(|a| &a.value)
    }

    /// [`Presence::Omitted`] for parameters the endpoint does not declare.
    pub fn presence(&self, name: &str) -> Presence {
        self.values
            .get(name)
            .map(|a| a.presence)
            .unwrap_or(Presence::Omitted)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decode the query pairs and body of a request for `entry`.
    ///
    /// The last occurrence of a repeated name wins. Unknown query tokens are
    /// ignored, as is a body sent to an endpoint without a body parameter.
    pub fn decode(
        entry: &EndpointEntry,
        query: Vec<(String, String)>,
        body: &[u8],
    ) -> Result<Self, AppError> {
        let mut tokens: HashMap<String, String> = query.into_iter().collect();
        let mut values = HashMap::new();

        for param in &entry.params {
            let supplied = if param.body {
                let raw = std::str::from_utf8(body).map_err(|_| AppError::BadRequest {
                    kind: keel::ErrorKind::BadRequest,
                    message: "request body is not valid UTF-8".into(),
                })?;
                if raw.trim().is_empty() {
                    None
                } else {
                    let json: Value = serde_json::from_str(raw).map_err(|e| {
                        AppError::argument(&param.name, &MarshalError::InvalidJson(e.to_string()))
                    })?;
                    Some(json)
                }
            } else {
                match tokens.remove(&param.name) {
                    Some(token) => Some(
                        marshal::decode_query(&param.ty, &token)
                            .map_err(|e| AppError::argument(&param.name, &e))?,
                    ),
                    None => None,
                }
            };

            let arg = match supplied {
                Some(value) => {
                    let value = marshal::normalize(&param.ty, value)
                        .map_err(|e| AppError::argument(&param.name, &e))?;
                    let presence = if value.is_null() {
                        Presence::Null
                    } else {
                        Presence::Given
                    };
                    Argument { value, presence }
                }
                None => match &param.default {
                    Some(default) => Argument {
                        value: default.clone(),
                        presence: Presence::Omitted,
                    },
                    None => return Err(AppError::missing(&param.name)),
                },
            };
            values.insert(param.name.clone(), arg);
        }

        if !tokens.is_empty() {
            let ignored: Vec<&str> = tokens.keys().map(String::as_str).collect();
            tracing::warn!(
                method = %entry.method,
                path = %entry.path,
                ?ignored,
                "ignoring unknown query parameters"
            );
        }
        if entry.body_param().is_none() && !body.is_empty() {
            tracing::debug!(
                method = %entry.method,
                path = %entry.path,
                "ignoring request body for endpoint without a body parameter"
            );
        }

        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use keel::{EndpointTable, ErrorKind, Method, ParamSpec, ResourceNode, VerbSpec};
    use serde_json::json;

    use super::*;

    fn entry(verb: VerbSpec) -> EndpointEntry {
        let tree = ResourceNode::root().child(ResourceNode::new("thing").verb(verb));
        let table = EndpointTable::derive(&tree).unwrap();
        let entry = table.iter().next().unwrap();
        (**entry).clone()
    }

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, token)| (name.to_string(), token.to_string()))
            .collect()
    }

    fn kind_of(err: AppError) -> ErrorKind {
        match err {
            AppError::BadRequest { kind, .. } => kind,
            other => panic!("expected a bad request, got {other:?}"),
        }
    }

    #[test]
    fn applies_defaults_and_tracks_presence() {
        let e = entry(
            VerbSpec::get()
                .param(ParamSpec::query::<bool>("wait").default(json!(false)))
                .param(ParamSpec::query::<Option<i64>>("min_size").default(Value::Null)),
        );
        let args = Arguments::decode(&e, query(&[("min_size", "null")]), b"").unwrap();
        assert_eq!(args.presence("wait"), Presence::Omitted);
        assert!(!args.get::<bool>("wait").unwrap());
        assert_eq!(args.presence("min_size"), Presence::Null);
        assert_eq!(args.get::<Option<i64>>("min_size").unwrap(), None);
    }

    #[test]
    fn bare_text_and_repeated_names() {
        let e = entry(VerbSpec::post().param(ParamSpec::query::<String>("tty")));
        let args = Arguments::decode(&e, query(&[("tty", "/dev/tty1")]), b"").unwrap();
        assert_eq!(args.get::<String>("tty").unwrap(), "/dev/tty1");
        let args = Arguments::decode(&e, query(&[("tty", "\"ttyS0\""), ("tty", "ttyS1")]), b"").unwrap();
        assert_eq!(args.get::<String>("tty").unwrap(), "ttyS1");
    }

    #[test]
    fn missing_required_parameter() {
        let e = entry(VerbSpec::post().param(ParamSpec::query::<String>("tty")));
        let err = Arguments::decode(&e, Vec::new(), b"").unwrap_err();
        assert_eq!(kind_of(err), ErrorKind::MissingField);
    }

    #[test]
    fn body_is_checked_against_its_type() {
        let e = entry(VerbSpec::post().param(ParamSpec::body::<Vec<String>>("names")));
        let args = Arguments::decode(&e, Vec::new(), br#"["a","b"]"#).unwrap();
        assert_eq!(args.get::<Vec<String>>("names").unwrap(), vec!["a", "b"]);

        let err = Arguments::decode(&e, Vec::new(), br#"{"a":1}"#).unwrap_err();
        assert_eq!(kind_of(err), ErrorKind::BadRequest);
        let err = Arguments::decode(&e, Vec::new(), b"[not json").unwrap_err();
        assert_eq!(kind_of(err), ErrorKind::BadRequest);
    }

    #[test]
    fn unknown_tokens_and_stray_body_are_ignored() {
        let e = entry(VerbSpec::get().param(ParamSpec::query::<bool>("wait").default(json!(false))));
        let args = Arguments::decode(&e, query(&[("wait", "true"), ("extra", "1")]), br#"{"x":1}"#).unwrap();
        assert_eq!(args.len(), 1);
        assert!(args.get::<bool>("wait").unwrap());
    }

    #[test]
    fn explicit_null_for_required_value_is_rejected() {
        let e = entry(VerbSpec::get().param(ParamSpec::query::<i64>("n")));
        assert!(Arguments::decode(&e, query(&[("n", "null")]), b"").is_err());
        assert_eq!(e.method, Method::Get);
    }
}
