//! Error reports for internal failures.
//!
//! When a handler fails unexpectedly the router answers `500` with an
//! [`ErrorReportRef`] in state `INCOMPLETE`. The report is populated in a
//! background task; `GET /errors/wait?id=<id>` blocks until it is `DONE`.
//!
//! Each report keeps the failure detail for diagnostics. At most
//! [`MAX_REPORTS`] are retained; the oldest are dropped first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use keel::{ErrorReportRef, ErrorReportState, Method, WaitableValue};

use crate::args::Arguments;
use crate::handlers::{Bindings, HandlerError};

/// Path of the long-poll endpoint served by [`ErrorReports::bind`].
pub const WAIT_PATH: &str = "/errors/wait";

/// How many reports are retained before the oldest is evicted.
pub const MAX_REPORTS: usize = 256;

/// Registry of error reports, shared between the router and the
/// `errors/wait` endpoint.
#[derive(Clone, Default)]
pub struct ErrorReports {
    reports: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
    by_id: HashMap<String, Report>,
    /// Ids in creation order, oldest first.
    order: VecDeque<String>,
}

#[derive(Clone)]
struct Report {
    opened: ErrorReportRef,
    detail: String,
    done: Arc<WaitableValue<ErrorReportRef>>,
}

impl ErrorReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a report for a failure of `kind` and start populating it.
    /// Must be called from within a tokio runtime.
    pub fn create(&self, kind: &str, detail: &str) -> ErrorReportRef {
        let reference = ErrorReportRef {
            id: uuid::Uuid::now_v7().to_string(),
            kind: kind.to_string(),
            state: ErrorReportState::Incomplete,
        };
        let slot = Arc::new(WaitableValue::new());
        {
            let mut reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
            reports.order.push_back(reference.id.clone());
            reports.by_id.insert(
                reference.id.clone(),
                Report {
                    opened: reference.clone(),
                    detail: detail.to_string(),
                    done: Arc::clone(&slot),
                },
            );
            while reports.order.len() > MAX_REPORTS {
                if let Some(evicted) = reports.order.pop_front() {
                    reports.by_id.remove(&evicted);
                    tracing::debug!(report = %evicted, "evicting old error report");
                }
            }
        }

        tracing::error!(report = %reference.id, %kind, "{detail}");

        let done = ErrorReportRef {
            state: ErrorReportState::Done,
            ..reference.clone()
        };
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            slot.resolve(done);
        });
        reference
    }

    /// The current state of report `id`.
    pub fn get(&self, id: &str) -> Option<ErrorReportRef> {
        let report = self.report(id)?;
        Some(report.done.get().unwrap_or(report.opened))
    }

    /// The failure detail recorded for report `id`.
    pub fn detail(&self, id: &str) -> Option<String> {
        self.report(id).map(|report| report.detail)
    }

    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until report `id` is fully populated. `None` for unknown ids.
    pub async fn wait(&self, id: &str) -> Option<ErrorReportRef> {
        let report = self.report(id)?;
        report.done.wait().await.ok()
    }

    fn report(&self, id: &str) -> Option<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(id)
            .cloned()
    }

    /// Bind `GET /errors/wait`.
    pub fn bind(&self, bindings: &mut Bindings) {
        let reports = self.clone();
        bindings.bind(Method::Get, WAIT_PATH, move |args: Arguments| {
            let reports = reports.clone();
            async move {
                let id: String = args.get("id")?;
                reports.wait(&id).await.ok_or_else(|| {
                    HandlerError::domain("unknown_error_report", format!("no error report {id:?}"))
                })
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_complete_in_the_background() {
        let reports = ErrorReports::new();
        let reference = reports.create("internal_error", "boom");
        assert_eq!(reference.state, ErrorReportState::Incomplete);

        let done = reports.wait(&reference.id).await.unwrap();
        assert_eq!(done.id, reference.id);
        assert_eq!(done.state, ErrorReportState::Done);
        assert_eq!(reports.get(&reference.id).unwrap().state, ErrorReportState::Done);
    }

    #[tokio::test]
    async fn keeps_the_detail() {
        let reports = ErrorReports::new();
        let reference = reports.create("internal_error", "GET /storage: probe exploded");
        assert_eq!(
            reports.detail(&reference.id).as_deref(),
            Some("GET /storage: probe exploded")
        );
    }

    #[tokio::test]
    async fn oldest_reports_are_evicted() {
        let reports = ErrorReports::new();
        let first = reports.create("internal_error", "first");
        let mut last = first.clone();
        for i in 0..MAX_REPORTS {
            last = reports.create("internal_error", &format!("failure {i}"));
        }
        assert_eq!(reports.len(), MAX_REPORTS);
        assert!(reports.get(&first.id).is_none());
        assert!(reports.get(&last.id).is_some());
    }

    #[tokio::test]
    async fn unknown_ids() {
        let reports = ErrorReports::new();
        assert!(reports.get("nope").is_none());
        assert!(reports.wait("nope").await.is_none());
    }
}
