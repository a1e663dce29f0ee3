//! Declarative API schemas that drive both ends of an HTTP protocol.
//!
//! A single [`ResourceNode`] tree declares resources, verbs, parameters and
//! return types. [`EndpointTable::derive`] flattens it into the immutable
//! table that `keel-server` binds to handlers and `keel-client` binds to a
//! transport, so both sides agree on paths, verbs and shapes by construction.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`schema`] | The schema tree: [`ResourceNode`], [`VerbSpec`], [`ParamSpec`], [`simple_endpoint`] |
//! | [`types`] | Value shapes: [`TypeSpec`] and the [`WireType`] trait |
//! | [`table`] | The path/verb deriver: [`EndpointTable`], [`EndpointEntry`] |
//! | [`marshal`] | JSON marshalling checked against a [`TypeSpec`] |
//! | [`waitable`] | [`WaitableValue`], the broadcast primitive behind `wait=true` |
//! | [`wire`] | Structured error bodies and [`ErrorKind`] |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use keel::{simple_endpoint, EndpointTable, Method, ResourceNode};
//!
//! let api = ResourceNode::root().child(simple_endpoint::<String>("locale"));
//! let table = EndpointTable::derive(&api)?;
//! assert!(table.get(Method::Post, "/locale").is_some());
//! ```

pub mod marshal;
pub mod schema;
pub mod table;
pub mod types;
pub mod waitable;
pub mod wire;

pub use marshal::MarshalError;
pub use schema::{
    simple_endpoint, simple_endpoint_spec, Method, ParamSpec, ResourceNode, VerbSpec,
    SIMPLE_VALUE_PARAM,
};
pub use table::{normalize_path, EndpointEntry, EndpointTable, RouteError, SchemaError};
pub use types::{EnumSpec, FieldSpec, RecordSpec, TypeSpec, UnionSpec, WireType};
pub use waitable::{WaitError, WaitableValue};
pub use wire::{kinds, ErrorKind, ErrorReportRef, ErrorReportState, ErrorResponse};
