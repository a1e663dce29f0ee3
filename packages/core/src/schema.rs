//! The schema tree: resources, verbs and parameters, built as plain data.
//!
//! ```rust,ignore
//! let api = ResourceNode::root()
//!     .child(simple_endpoint::<String>("locale"))
//!     .child(
//!         ResourceNode::new("refresh")
//!             .verb(VerbSpec::get().param(ParamSpec::query::<bool>("wait").default(json!(false)))
//!                 .returns::<RefreshStatus>())
//!             .verb(VerbSpec::post().returns::<String>()),
//!     );
//! let table = EndpointTable::derive(&api)?;
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{TypeSpec, WireType};

/// An HTTP verb a resource can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a method name case-insensitively (`"get"`, `"GET"`).
impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unknown HTTP method {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// ParamSpec
// ---------------------------------------------------------------------------

/// One declared parameter of a verb.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: TypeSpec,
    /// `None` means the parameter is required. `Some(Value::Null)` declares an
    /// optional parameter whose default is the absent value.
    pub default: Option<Value>,
    /// Serialised as the whole request body rather than a query token.
    pub body: bool,
}

impl ParamSpec {
    /// A query-token parameter of type `T`.
    pub fn query<T: WireType>(name: impl Into<String>) -> Self {
        Self::new(name, T::type_spec(), false)
    }

    /// A body (payload) parameter of type `T`.
    pub fn body<T: WireType>(name: impl Into<String>) -> Self {
        Self::new(name, T::type_spec(), true)
    }

    pub fn new(name: impl Into<String>, ty: TypeSpec, body: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            body,
        }
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

// ---------------------------------------------------------------------------
// VerbSpec
// ---------------------------------------------------------------------------

/// One HTTP-method declaration on a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct VerbSpec {
    pub method: Method,
    pub params: Vec<ParamSpec>,
    pub returns: TypeSpec,
    pub doc: Option<String>,
}

impl VerbSpec {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            params: Vec::new(),
            returns: TypeSpec::Unit,
            doc: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    pub fn post() -> Self {
        Self::new(Method::Post)
    }

    pub fn put() -> Self {
        Self::new(Method::Put)
    }

    pub fn delete() -> Self {
        Self::new(Method::Delete)
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns<T: WireType>(self) -> Self {
        self.returns_spec(T::type_spec())
    }

    pub fn returns_spec(mut self, spec: TypeSpec) -> Self {
        self.returns = spec;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// The body parameter, if the verb declares one.
    pub fn body_param(&self) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.body)
    }
}

// ---------------------------------------------------------------------------
// ResourceNode
// ---------------------------------------------------------------------------

/// A named node in the schema tree.
///
/// A node may carry verbs, children, or both: verbs act on the resource
/// itself, children are sub-resources addressed by appending their name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub name: String,
    pub children: Vec<ResourceNode>,
    pub verbs: Vec<VerbSpec>,
    /// A pure namespace. Declaring verbs on a group is a schema error.
    pub group: bool,
    pub doc: Option<String>,
}

impl ResourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            verbs: Vec::new(),
            group: false,
            doc: None,
        }
    }

    /// The unnamed root of an API tree.
    pub fn root() -> Self {
        Self::group("")
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            group: true,
            ..Self::new(name)
        }
    }

    pub fn child(mut self, child: ResourceNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn verb(mut self, verb: VerbSpec) -> Self {
        self.verbs.push(verb);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Total number of verbs declared in this subtree.
    pub fn verb_count(&self) -> usize {
        self.verbs.len() + self.children.iter().map(Self::verb_count).sum::<usize>()
    }
}

// ---------------------------------------------------------------------------
// Simple endpoints
// ---------------------------------------------------------------------------

/// Name of the body parameter of a simple endpoint's POST.
pub const SIMPLE_VALUE_PARAM: &str = "data";

/// Expand a get/set-of-one-value resource into its canonical verb pair:
///
/// - `GET() -> Optional[T]`: the stored value, or absent if never set.
/// - `POST(data: body T) -> None`: store the value.
pub fn simple_endpoint<T: WireType>(name: impl Into<String>) -> ResourceNode {
    simple_endpoint_spec(name, T::type_spec())
}

/// [`simple_endpoint`] for a shape given as a [`TypeSpec`].
pub fn simple_endpoint_spec(name: impl Into<String>, spec: TypeSpec) -> ResourceNode {
    ResourceNode::new(name)
        .verb(
            VerbSpec::get()
                .returns_spec(TypeSpec::optional(spec.clone()))
                .doc("Get the current value, or null if it was never set."),
        )
        .verb(
            VerbSpec::post()
                .param(ParamSpec::new(SIMPLE_VALUE_PARAM, spec, true))
                .doc("Replace the current value."),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_endpoint_expands_to_get_post_pair() {
        let node = simple_endpoint::<String>("locale");
        assert_eq!(node.name, "locale");
        assert!(node.children.is_empty());
        assert_eq!(node.verbs.len(), 2);

        let get = &node.verbs[0];
        assert_eq!(get.method, Method::Get);
        assert!(get.params.is_empty());
        assert_eq!(get.returns, TypeSpec::optional(TypeSpec::Text));

        let post = &node.verbs[1];
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.returns, TypeSpec::Unit);
        let body = post.body_param().unwrap();
        assert_eq!(body.name, SIMPLE_VALUE_PARAM);
        assert_eq!(body.ty, TypeSpec::Text);
        assert!(body.is_required());
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("PATCH".parse::<Method>().is_err());
    }

    #[test]
    fn verb_count_walks_subtree() {
        let tree = ResourceNode::root()
            .child(simple_endpoint::<String>("a"))
            .child(ResourceNode::group("g").child(simple_endpoint::<bool>("b")));
        assert_eq!(tree.verb_count(), 4);
    }
}
