//! Typed call stubs derived from an [`EndpointTable`].
//!
//! ```rust,ignore
//! let client = ApiClient::new(Arc::new(installer_table()?), HttpTransport::new(url)?);
//! let status: ApplicationStatus = client
//!     .stub(Method::Get, "/meta/status")?
//!     .call(Args::new().with("cur", ApplicationState::Waiting))
//!     .await?;
//! client.resource("/locale").post(Args::new().with("data", "fr_FR.UTF-8")).await?;
//! ```
//!
//! Arguments are checked against the declared parameter types before
//! anything is sent, so a malformed call never reaches the network.

use std::sync::Arc;

use keel::{marshal, EndpointEntry, EndpointTable, ErrorResponse, Method, RouteError, TypeSpec};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::transport::{Transport, WireRequest, WireResponse};

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

/// Named arguments for one call. Parameters not mentioned are omitted, and
/// the server applies their defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(String, Result<Value, String>)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a native value. Serialisation failures are reported when the call
    /// is made.
    pub fn with<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Self {
        let value = serde_json::to_value(value).map_err(|e| e.to_string());
        self.values.push((name.into(), value));
        self
    }

    /// Add a value that is already JSON.
    pub fn json(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.push((name.into(), Ok(value)));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// A client bound to one endpoint table and one transport.
#[derive(Clone)]
pub struct ApiClient {
    table: Arc<EndpointTable>,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(table: Arc<EndpointTable>, transport: impl Transport + 'static) -> Self {
        Self::with_transport(table, Arc::new(transport))
    }

    pub fn with_transport(table: Arc<EndpointTable>, transport: Arc<dyn Transport>) -> Self {
        Self { table, transport }
    }

    pub fn table(&self) -> &EndpointTable {
        &self.table
    }

    /// The stub for `method path`, or an error if the table does not declare it.
    pub fn stub(&self, method: Method, path: &str) -> Result<Stub, ClientError> {
        let entry = self.table.resolve(method, path).map_err(|e| match e {
            RouteError::NotFound { path } | RouteError::MethodNotAllowed { path, .. } => {
                ClientError::UnknownEndpoint { method, path }
            }
        })?;
        Ok(Stub {
            entry: Arc::clone(entry),
            transport: Arc::clone(&self.transport),
        })
    }

    /// A handle on the resource at `path`, called verb by verb.
    pub fn resource(&self, path: &str) -> Resource<'_> {
        Resource {
            client: self,
            path: keel::normalize_path(path),
        }
    }
}

/// The verbs of one resource, e.g. `client.resource("/storage/guided").get(..)`.
pub struct Resource<'a> {
    client: &'a ApiClient,
    path: String,
}

impl Resource<'_> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A nested resource, e.g. `resource("/meta").child("status")`.
    pub fn child(&self, name: &str) -> Self {
        let path = if self.path == "/" {
            format!("/{name}")
        } else {
            format!("{}/{name}", self.path)
        };
        Resource {
            client: self.client,
            path,
        }
    }

    pub fn stub(&self, method: Method) -> Result<Stub, ClientError> {
        self.client.stub(method, &self.path)
    }

    pub async fn get(&self, args: Args) -> Result<Value, ClientError> {
        self.stub(Method::Get)?.call_json(args).await
    }

    pub async fn post(&self, args: Args) -> Result<Value, ClientError> {
        self.stub(Method::Post)?.call_json(args).await
    }

    pub async fn put(&self, args: Args) -> Result<Value, ClientError> {
        self.stub(Method::Put)?.call_json(args).await
    }

    pub async fn delete(&self, args: Args) -> Result<Value, ClientError> {
        self.stub(Method::Delete)?.call_json(args).await
    }
}

// ---------------------------------------------------------------------------
// Stub
// ---------------------------------------------------------------------------

/// A callable stub for one endpoint.
#[derive(Clone)]
pub struct Stub {
    entry: Arc<EndpointEntry>,
    transport: Arc<dyn Transport>,
}

impl Stub {
    pub fn entry(&self) -> &EndpointEntry {
        &self.entry
    }

    /// Validate `args` and lay them out as a request.
    pub fn build_request(&self, args: Args) -> Result<WireRequest, ClientError> {
        let entry = &self.entry;
        let mut query = Vec::new();
        let mut body = None;

        for (name, _) in &args.values {
            if entry.param(name).is_none() {
                return Err(ClientError::UnknownArgument {
                    method: entry.method,
                    path: entry.path.clone(),
                    param: name.clone(),
                });
            }
        }

        for param in &entry.params {
            let given = args
                .values
                .iter()
                .rev()
                .find(|(name, _)| *name == param.name)
                .map(|(_, value)| value.clone());
            let Some(value) = given else {
                if param.is_required() {
                    return Err(ClientError::MissingArgument(param.name.clone()));
                }
                continue;
            };
            let marshal_err = |source| ClientError::Marshal {
                param: param.name.clone(),
                source,
            };
            let value = value.map_err(|e| marshal_err(keel::MarshalError::Serde(e)))?;
            let value = marshal::normalize(&param.ty, value).map_err(marshal_err)?;
            if param.body {
                body = Some(value);
            } else {
                let token = marshal::encode_query(&param.ty, &value).map_err(marshal_err)?;
                query.push((param.name.clone(), token));
            }
        }

        Ok(WireRequest {
            method: entry.method,
            path: entry.path.clone(),
            query,
            body,
        })
    }

    /// Make the call and return the result as checked JSON. Endpoints that
    /// return nothing yield `null`.
    pub async fn call_json(&self, args: Args) -> Result<Value, ClientError> {
        let request = self.build_request(args)?;
        let response = self.transport.send(request).await?;
        self.read_response(response)
    }

    /// Make the call and decode the result into `R`.
    pub async fn call<R: DeserializeOwned>(&self, args: Args) -> Result<R, ClientError> {
        let value = self.call_json(args).await?;
        serde_json::from_value(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    fn read_response(&self, response: WireResponse) -> Result<Value, ClientError> {
        if !response.is_success() {
            return Err(error_from(response));
        }
        if self.entry.returns == TypeSpec::Unit {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        marshal::normalize(&self.entry.returns, value).map_err(|e| {
            ClientError::InvalidResponse(format!("expected {}: {e}", self.entry.returns))
        })
    }
}

fn error_from(response: WireResponse) -> ClientError {
    match serde_json::from_slice::<ErrorResponse>(&response.body) {
        Ok(body) => ClientError::Api {
            status: response.status,
            kind: body.kind,
            message: body.message,
            report: body.report,
        },
        Err(_) => ClientError::UnexpectedStatus {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        },
    }
}
