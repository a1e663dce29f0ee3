//! Assembles the Axum [`Router`] from an endpoint table and its bindings.
//!
//! Every distinct table path becomes one route; each declared verb on it
//! becomes one method filter dispatching to the bound handler. Requests for a
//! path that exists with an undeclared verb get the structured
//! `method_not_allowed` body, and unknown paths get `not_found`. A trailing
//! slash is accepted on every path, matching [`keel::normalize_path`].

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query},
    http::{self, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
    Json, Router,
};
use keel::{kinds, marshal, EndpointEntry, EndpointTable, ErrorKind, Method, TypeSpec};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::args::Arguments;
use crate::error::AppError;
use crate::handlers::{BindError, Bindings, Handler, HandlerError};
use crate::reports::ErrorReports;

/// Build the application router for `table`.
///
/// Fails if a binding names an endpoint the table does not declare. Declared
/// endpoints without a binding answer `501 not_implemented`.
pub fn build_router(
    table: Arc<EndpointTable>,
    bindings: Bindings,
    reports: ErrorReports,
) -> Result<Router, BindError> {
    let mut handlers = bindings.resolve(&table)?;
    let mut router = Router::new();

    for path in table.paths() {
        let mut methods: MethodRouter = MethodRouter::new();
        let mut allowed = Vec::new();

        for entry in table.iter().filter(|e| e.path == path) {
            let handler = handlers.remove(&(entry.method, entry.path.clone()));
            if handler.is_none() {
                tracing::warn!(method = %entry.method, path = %entry.path, "endpoint has no handler");
            }
            let endpoint = Arc::new(BoundEndpoint {
                entry: Arc::clone(entry),
                handler,
                reports: reports.clone(),
            });
            allowed.push(entry.method);
            methods = methods.on(
                method_filter(entry.method),
                move |query: Result<Query<QueryPairs>, QueryRejection>, body: Bytes| {
                    let endpoint = Arc::clone(&endpoint);
                    async move { endpoint.dispatch(query, body).await }
                },
            );
        }

        let route_path = path.to_string();
        methods = methods.fallback(move |method: http::Method| {
            let error = AppError::MethodNotAllowed {
                message: format!("{method} is not allowed on {route_path}"),
                allowed: allowed.clone(),
            };
            async move { error }
        });
        if path != "/" {
            router = router.route(&format!("{path}/"), methods.clone());
        }
        router = router.route(path, methods);
    }

    tracing::info!(endpoints = table.len(), "router built");

    Ok(router
        .fallback(|uri: Uri| async move { AppError::NotFound(format!("no endpoint at {}", uri.path())) })
        .layer(TraceLayer::new_for_http()))
}

fn method_filter(method: Method) -> MethodFilter {
    match method {
        Method::Get => MethodFilter::GET,
        Method::Post => MethodFilter::POST,
        Method::Put => MethodFilter::PUT,
        Method::Delete => MethodFilter::DELETE,
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// URL-decoded query pairs in request order.
type QueryPairs = Vec<(String, String)>;

struct BoundEndpoint {
    entry: Arc<EndpointEntry>,
    handler: Option<Arc<dyn Handler>>,
    reports: ErrorReports,
}

impl BoundEndpoint {
    async fn dispatch(&self, query: Result<Query<QueryPairs>, QueryRejection>, body: Bytes) -> Response {
        match self.try_dispatch(query, body).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn try_dispatch(
        &self,
        query: Result<Query<QueryPairs>, QueryRejection>,
        body: Bytes,
    ) -> Result<Response, AppError> {
        let Some(handler) = &self.handler else {
            return Err(AppError::NotImplemented(format!(
                "{} {} is declared but not implemented",
                self.entry.method, self.entry.path
            )));
        };
        let Query(pairs) = query.map_err(|e| AppError::BadRequest {
            kind: ErrorKind::BadRequest,
            message: e.body_text(),
        })?;
        let args = Arguments::decode(&self.entry, pairs, &body)?;
        tracing::debug!(method = %self.entry.method, path = %self.entry.path, "dispatch");

        let mut in_flight = InFlight::new(&self.entry);
        let result = handler.call(args).await;
        in_flight.finish();

        match result {
            Ok(value) => self.respond(value),
            Err(HandlerError::Domain { kind, message }) => Err(AppError::Domain { kind, message }),
            Err(HandlerError::Argument { param, source }) => Err(AppError::argument(&param, &source)),
            Err(HandlerError::Internal(detail)) => Err(self.internal(&detail)),
        }
    }

    fn respond(&self, value: Value) -> Result<Response, AppError> {
        if self.entry.returns == TypeSpec::Unit {
            return Ok(StatusCode::OK.into_response());
        }
        match marshal::normalize(&self.entry.returns, value) {
            Ok(value) => Ok(Json(value).into_response()),
            Err(e) => Err(self.internal(&format!("result does not match {}: {e}", self.entry.returns))),
        }
    }

    fn internal(&self, detail: &str) -> AppError {
        let detail = format!("{} {}: {detail}", self.entry.method, self.entry.path);
        let report = self.reports.create(kinds::INTERNAL_ERROR, &detail);
        AppError::Internal {
            message: "internal server error".into(),
            report: Some(report),
        }
    }
}

/// Logs requests whose handler future is dropped before completing, which
/// is what happens when a long-polling client disconnects.
struct InFlight<'a> {
    entry: &'a EndpointEntry,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn new(entry: &'a EndpointEntry) -> Self {
        Self {
            entry,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                kind = kinds::CANCELLED_WAIT,
                method = %self.entry.method,
                path = %self.entry.path,
                "request cancelled before the handler finished"
            );
        }
    }
}
