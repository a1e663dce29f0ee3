//! Handler bindings: the server half of an endpoint table.
//!
//! A [`Bindings`] registry maps each `(method, path)` of the table to an
//! async function taking the decoded [`Arguments`]. Results are serialised
//! with serde and checked against the entry's declared return type by the
//! router, so a handler can return any `Serialize` value.
//!
//! ```rust,ignore
//! let mut bindings = Bindings::new();
//! bindings.bind(Method::Post, "/meta/confirm", |args: Arguments| async move {
//!     let tty: String = args.get("tty")?;
//!     confirm(tty).await;
//!     Ok(())
//! });
//! ```

pub mod simple;

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use keel::{normalize_path, EndpointTable, MarshalError, Method};
use serde::Serialize;
use serde_json::Value;

use crate::args::Arguments;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a bound handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A domain failure, reported to the caller under `kind` with status 422.
    #[error("{message}")]
    Domain { kind: String, message: String },

    /// An unexpected failure. Answered with 500 and an error report.
    #[error("internal error: {0}")]
    Internal(String),

    /// An argument could not be converted to the type the handler asked for.
    #[error("parameter `{param}`: {source}")]
    Argument {
        param: String,
        #[source]
        source: MarshalError,
    },
}

impl HandlerError {
    pub fn domain(kind: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Domain {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }
}

/// Binding a handler to something the table does not declare.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("no endpoint {method} {path} is declared")]
    UnknownEndpoint { method: Method, path: String },

    #[error("{method} {path} is bound twice")]
    DuplicateBinding { method: Method, path: String },
}

/// Object-safe handler interface used by the router.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, args: Arguments) -> BoxFuture<'static, Result<Value, HandlerError>>;
}

/// Wrapper that serialises the result of an async function.
struct FnHandler<F, R, Fut> {
    handler: F,
    _phantom: PhantomData<fn() -> (R, Fut)>,
}

impl<F, R, Fut> Handler for FnHandler<F, R, Fut>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    fn call(&self, args: Arguments) -> BoxFuture<'static, Result<Value, HandlerError>> {
        let fut = (self.handler)(args);
        Box::pin(async move {
            let result = fut.await?;
            serde_json::to_value(&result)
                .map_err(|e| HandlerError::Internal(format!("serialising result: {e}")))
        })
    }
}

/// Registry of handlers keyed by `(method, path)`.
#[derive(Default)]
pub struct Bindings {
    handlers: Vec<(Method, String, Arc<dyn Handler>)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `method path`. Whether the endpoint exists is
    /// checked when the router is built.
    pub fn bind<F, R, Fut>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler: Arc<dyn Handler> = Arc::new(FnHandler {
            handler,
            _phantom: PhantomData,
        });
        self.handlers.push((method, normalize_path(path), handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Check every binding against `table` and index them for dispatch.
    pub(crate) fn resolve(
        self,
        table: &EndpointTable,
    ) -> Result<HashMap<(Method, String), Arc<dyn Handler>>, BindError> {
        let mut out = HashMap::new();
        for (method, path, handler) in self.handlers {
            if table.get(method, &path).is_none() {
                return Err(BindError::UnknownEndpoint { method, path });
            }
            if out.contains_key(&(method, path.clone())) {
                return Err(BindError::DuplicateBinding { method, path });
            }
            out.insert((method, path), handler);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use keel::{simple_endpoint, ResourceNode};
    use serde_json::json;

    use super::*;

    fn table() -> EndpointTable {
        EndpointTable::derive(&ResourceNode::root().child(simple_endpoint::<String>("locale"))).unwrap()
    }

    #[tokio::test]
    async fn bound_handler_serialises_its_result() {
        let mut bindings = Bindings::new();
        bindings.bind(Method::Get, "locale/", |_args| async { Ok(Some("en_US")) });
        let handlers = bindings.resolve(&table()).unwrap();
        let handler = &handlers[&(Method::Get, "/locale".to_string())];
        assert_eq!(handler.call(Arguments::new()).await.unwrap(), json!("en_US"));
    }

    #[test]
    fn binding_an_undeclared_endpoint_fails() {
        let mut bindings = Bindings::new();
        bindings.bind(Method::Delete, "/locale", |_args| async { Ok(()) });
        assert_eq!(
            bindings.resolve(&table()).err(),
            Some(BindError::UnknownEndpoint {
                method: Method::Delete,
                path: "/locale".into()
            })
        );
    }

    #[test]
    fn binding_twice_fails() {
        let mut bindings = Bindings::new();
        bindings
            .bind(Method::Get, "/locale", |_args| async { Ok(()) })
            .bind(Method::Get, "/locale", |_args| async { Ok(()) });
        assert!(matches!(
            bindings.resolve(&table()),
            Err(BindError::DuplicateBinding { .. })
        ));
    }
}
