//! The path/verb deriver and the flat endpoint table it produces.
//!
//! [`EndpointTable::derive`] walks a schema tree depth-first, accumulating the
//! slash-joined path, and emits one [`EndpointEntry`] per declared verb. Every
//! schema mistake (duplicate endpoints, two body parameters, records in query
//! position, ...) is reported here, once, before any server or client is
//! built. The resulting table is immutable and shared behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::marshal;
use crate::schema::{Method, ParamSpec, ResourceNode, VerbSpec};
use crate::types::TypeSpec;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A malformed schema. These are programming errors, caught at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate endpoint {method} {path}")]
    DuplicateEndpoint { method: Method, path: String },

    #[error("{method} {path}: more than one body parameter (`{first}`, `{second}`)")]
    MultipleBodyParams {
        method: Method,
        path: String,
        first: String,
        second: String,
    },

    #[error("{method} {path}: parameter `{param}` of type {ty} must be a body parameter")]
    NonScalarQueryParam {
        method: Method,
        path: String,
        param: String,
        ty: String,
    },

    #[error("{method} {path}: duplicate parameter `{param}`")]
    DuplicateParam {
        method: Method,
        path: String,
        param: String,
    },

    #[error("invalid resource name {name:?} under {parent:?}")]
    InvalidName { parent: String, name: String },

    #[error("group {path} declares verbs")]
    GroupWithVerbs { path: String },

    #[error("{method} {path}: default for `{param}` does not match its type: {reason}")]
    InvalidDefault {
        method: Method,
        path: String,
        param: String,
        reason: String,
    },
}

/// Why a request did not match any entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no endpoint at {path}")]
    NotFound { path: String },

    #[error("{method} is not allowed on {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
}

// ---------------------------------------------------------------------------
// EndpointEntry
// ---------------------------------------------------------------------------

/// One flattened (method, path) endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointEntry {
    pub method: Method,
    /// Absolute path, e.g. `/storage/guided`.
    pub path: String,
    pub params: Vec<ParamSpec>,
    pub returns: TypeSpec,
    pub doc: Option<String>,
    /// Name of the schema node the entry was derived from.
    pub resource: String,
}

impl EndpointEntry {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn body_param(&self) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.body)
    }

    pub fn query_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| !p.body)
    }

    /// One-line signature used by route listings:
    /// `GET /storage/guided(min_size: Optional[int] = null, wait: bool = false) -> GuidedStorageResponse`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut s = format!("{}: {}", p.name, p.ty);
                if p.body {
                    s = format!("{}: Payload[{}]", p.name, p.ty);
                }
                if let Some(default) = &p.default {
                    s.push_str(&format!(" = {default}"));
                }
                s
            })
            .collect();
        format!(
            "{} {}({}) -> {}",
            self.method,
            self.path,
            params.join(", "),
            self.returns
        )
    }
}

// ---------------------------------------------------------------------------
// EndpointTable
// ---------------------------------------------------------------------------

/// The immutable, flat list of endpoints derived from a schema tree.
#[derive(Debug, Clone, Default)]
pub struct EndpointTable {
    entries: Vec<Arc<EndpointEntry>>,
    index: HashMap<(Method, String), usize>,
}

impl EndpointTable {
    /// Walk `root` and build the table, validating the schema on the way.
    pub fn derive(root: &ResourceNode) -> Result<Self, SchemaError> {
        let mut table = Self::default();
        let prefix = if root.name.is_empty() {
            String::new()
        } else {
            validate_name("", &root.name)?;
            format!("/{}", root.name)
        };
        table.walk(root, &prefix)?;
        Ok(table)
    }

    fn walk(&mut self, node: &ResourceNode, prefix: &str) -> Result<(), SchemaError> {
        let path = if prefix.is_empty() { "/" } else { prefix };

        if node.group && !node.verbs.is_empty() {
            return Err(SchemaError::GroupWithVerbs {
                path: path.to_string(),
            });
        }

        for verb in &node.verbs {
            validate_verb(verb, path)?;
            let key = (verb.method, path.to_string());
            if self.index.contains_key(&key) {
                return Err(SchemaError::DuplicateEndpoint {
                    method: verb.method,
                    path: path.to_string(),
                });
            }
            self.index.insert(key, self.entries.len());
            self.entries.push(Arc::new(EndpointEntry {
                method: verb.method,
                path: path.to_string(),
                params: verb.params.clone(),
                returns: verb.returns.clone(),
                doc: verb.doc.clone(),
                resource: node.name.clone(),
            }));
        }

        for child in &node.children {
            validate_name(path, &child.name)?;
            self.walk(child, &format!("{prefix}/{}", child.name))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in derivation (depth-first, declaration) order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EndpointEntry>> {
        self.entries.iter()
    }

    pub fn get(&self, method: Method, path: &str) -> Option<&Arc<EndpointEntry>> {
        self.index
            .get(&(method, normalize_path(path)))
            .map(|&i| &self.entries[i])
    }

    /// Methods declared at `path`, in declaration order.
    pub fn methods_at(&self, path: &str) -> Vec<Method> {
        let path = normalize_path(path);
        self.entries
            .iter()
            .filter(|e| e.path == path)
            .map(|e| e.method)
            .collect()
    }

    /// Distinct paths, in the order they were first derived.
    pub fn paths(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !out.contains(&entry.path.as_str()) {
                out.push(&entry.path);
            }
        }
        out
    }

    /// Find the entry for an inbound request.
    pub fn resolve(&self, method: Method, path: &str) -> Result<&Arc<EndpointEntry>, RouteError> {
        if let Some(entry) = self.get(method, path) {
            return Ok(entry);
        }
        let allowed = self.methods_at(path);
        if allowed.is_empty() {
            Err(RouteError::NotFound {
                path: normalize_path(path),
            })
        } else {
            Err(RouteError::MethodNotAllowed {
                method,
                path: normalize_path(path),
                allowed,
            })
        }
    }
}

/// Canonical form of a request path: leading slash, no trailing slash.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

fn validate_name(parent: &str, name: &str) -> Result<(), SchemaError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidName {
            parent: parent.to_string(),
            name: name.to_string(),
        })
    }
}

fn validate_verb(verb: &VerbSpec, path: &str) -> Result<(), SchemaError> {
    let mut body: Option<&str> = None;
    for (i, param) in verb.params.iter().enumerate() {
        if verb.params[..i].iter().any(|p| p.name == param.name) {
            return Err(SchemaError::DuplicateParam {
                method: verb.method,
                path: path.to_string(),
                param: param.name.clone(),
            });
        }
        if param.body {
            if let Some(first) = body {
                return Err(SchemaError::MultipleBodyParams {
                    method: verb.method,
                    path: path.to_string(),
                    first: first.to_string(),
                    second: param.name.clone(),
                });
            }
            body = Some(param.name.as_str());
        } else if !param.ty.is_query_safe() {
            return Err(SchemaError::NonScalarQueryParam {
                method: verb.method,
                path: path.to_string(),
                param: param.name.clone(),
                ty: param.ty.to_string(),
            });
        }
        if let Some(default) = &param.default {
            marshal::normalize(&param.ty, default.clone()).map_err(|e| {
                SchemaError::InvalidDefault {
                    method: verb.method,
                    path: path.to_string(),
                    param: param.name.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::simple_endpoint;
    use crate::types::RecordSpec;

    fn storage_tree() -> ResourceNode {
        ResourceNode::root()
            .child(simple_endpoint::<String>("locale"))
            .child(
                ResourceNode::new("storage")
                    .verb(
                        VerbSpec::get()
                            .param(ParamSpec::query::<bool>("wait").default(json!(false)))
                            .returns::<Vec<String>>(),
                    )
                    .verb(VerbSpec::post().param(ParamSpec::body::<Vec<String>>("config")))
                    .child(
                        ResourceNode::new("guided").verb(
                            VerbSpec::get()
                                .param(ParamSpec::query::<Option<i64>>("min_size").default(json!(null)))
                                .returns::<String>(),
                        ),
                    )
                    .child(ResourceNode::new("reset").verb(VerbSpec::post())),
            )
            .child(
                ResourceNode::group("meta").child(
                    ResourceNode::new("status").verb(VerbSpec::get().returns::<String>()),
                ),
            )
    }

    #[test]
    fn one_entry_per_verb() {
        let tree = storage_tree();
        let table = EndpointTable::derive(&tree).unwrap();
        assert_eq!(table.len(), tree.verb_count());
        assert_eq!(table.len(), 7);

        let mut keys: Vec<(Method, &str)> =
            table.iter().map(|e| (e.method, e.path.as_str())).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), table.len(), "no duplicate (method, path) pairs");
    }

    #[test]
    fn paths_join_ancestor_names() {
        let table = EndpointTable::derive(&storage_tree()).unwrap();
        assert_eq!(
            table.paths(),
            vec!["/locale", "/storage", "/storage/guided", "/storage/reset", "/meta/status"]
        );
        assert_eq!(table.methods_at("/storage"), vec![Method::Get, Method::Post]);
        let guided = table.get(Method::Get, "/storage/guided").unwrap();
        assert_eq!(guided.resource, "guided");
    }

    #[test]
    fn resolve_distinguishes_not_found_from_wrong_method() {
        let table = EndpointTable::derive(&storage_tree()).unwrap();
        assert!(table.resolve(Method::Get, "/storage/").is_ok());
        assert_eq!(
            table.resolve(Method::Get, "/nope").unwrap_err(),
            RouteError::NotFound {
                path: "/nope".into()
            }
        );
        assert_eq!(
            table.resolve(Method::Delete, "/storage").unwrap_err(),
            RouteError::MethodNotAllowed {
                method: Method::Delete,
                path: "/storage".into(),
                allowed: vec![Method::Get, Method::Post],
            }
        );
        // A pure group has no endpoints of its own.
        assert!(matches!(
            table.resolve(Method::Get, "/meta"),
            Err(RouteError::NotFound { .. })
        ));
    }

    #[test]
    fn duplicate_endpoint_is_rejected() {
        let tree = ResourceNode::root()
            .child(ResourceNode::new("a").verb(VerbSpec::get()))
            .child(ResourceNode::new("a").verb(VerbSpec::get()));
        assert_eq!(
            EndpointTable::derive(&tree).unwrap_err(),
            SchemaError::DuplicateEndpoint {
                method: Method::Get,
                path: "/a".into()
            }
        );
    }

    #[test]
    fn two_body_params_are_rejected() {
        let tree = ResourceNode::root().child(
            ResourceNode::new("bond").verb(
                VerbSpec::post()
                    .param(ParamSpec::body::<String>("first"))
                    .param(ParamSpec::body::<String>("second")),
            ),
        );
        assert!(matches!(
            EndpointTable::derive(&tree),
            Err(SchemaError::MultipleBodyParams { .. })
        ));
    }

    #[test]
    fn records_and_sequences_cannot_be_query_params() {
        let record = RecordSpec::new("ZdevInfo").field::<String>("id");
        let tree = ResourceNode::root().child(
            ResourceNode::new("chzdev").verb(
                VerbSpec::post().param(ParamSpec::new("zdev", record.into(), false)),
            ),
        );
        assert!(matches!(
            EndpointTable::derive(&tree),
            Err(SchemaError::NonScalarQueryParam { .. })
        ));

        let tree = ResourceNode::root().child(
            ResourceNode::new("mark").verb(VerbSpec::post().param(ParamSpec::query::<Vec<String>>("names"))),
        );
        assert!(matches!(
            EndpointTable::derive(&tree),
            Err(SchemaError::NonScalarQueryParam { .. })
        ));
    }

    #[test]
    fn group_with_verbs_and_bad_names_are_rejected() {
        let tree = ResourceNode::root().child(ResourceNode::group("meta").verb(VerbSpec::get()));
        assert!(matches!(
            EndpointTable::derive(&tree),
            Err(SchemaError::GroupWithVerbs { .. })
        ));

        let tree = ResourceNode::root().child(ResourceNode::new("a/b").verb(VerbSpec::get()));
        assert!(matches!(
            EndpointTable::derive(&tree),
            Err(SchemaError::InvalidName { .. })
        ));
    }

    #[test]
    fn defaults_must_match_their_type() {
        let tree = ResourceNode::root().child(
            ResourceNode::new("refresh")
                .verb(VerbSpec::get().param(ParamSpec::query::<bool>("wait").default(json!("no")))),
        );
        assert!(matches!(
            EndpointTable::derive(&tree),
            Err(SchemaError::InvalidDefault { .. })
        ));

        let tree = ResourceNode::root().child(
            ResourceNode::new("p").verb(VerbSpec::get().param(ParamSpec::query::<String>("s").default(json!(null)))),
        );
        assert!(EndpointTable::derive(&tree).is_err());
    }

    #[test]
    fn signature_lists_params_and_return() {
        let table = EndpointTable::derive(&storage_tree()).unwrap();
        let entry = table.get(Method::Post, "/locale").unwrap();
        assert_eq!(entry.signature(), "POST /locale(data: Payload[str]) -> None");
        let entry = table.get(Method::Get, "/storage").unwrap();
        assert_eq!(entry.signature(), "GET /storage(wait: bool = false) -> List[str]");
    }
}
