//! Dry-run controllers for the installer API.
//!
//! Nothing here touches the machine. Background work (the storage probe, the
//! refresh check, the install itself) is simulated by sleeping for
//! [`ServerConfig::dry_run_delay`], which is enough to exercise every
//! long-poll endpoint end to end.
//!
//! | Endpoint | Behaviour |
//! |----------|-----------|
//! | simple endpoints | held in [`SimpleStore`]s; a `POST` marks them configured |
//! | `GET /meta/status?cur=S` | answers once the state differs from `S` |
//! | `POST /meta/confirm` | `WAITING` -> `RUNNING` -> `DONE` |
//! | `GET /refresh?wait=true` | blocks until the refresh check completes |
//! | `POST /refresh` | restarts the check; returns its change id |
//! | `GET /refresh/progress` | `Doing` or `Done` for a change id |
//! | `GET /storage?wait=true` | blocks until the probe completes |
//! | `GET /dry_run/crash` | fails with an internal error |

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError};

use axum::Router;
use keel::{EndpointTable, Method, WaitableValue};
use keel_installer_api::{
    ApplicationState, ApplicationStatus, IdentityData, LiveSessionSSHInfo, ProbeStatus,
    RefreshCheckState, RefreshStatus, SSHData, StorageResponse, WSLConfigurationAdvanced,
    WSLConfigurationBase,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::args::{Arguments, Presence};
use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::handlers::{simple::SimpleStore, Bindings, HandlerError};
use crate::reports::ErrorReports;
use crate::router::build_router;

/// A fully assembled installer server, ready to be served.
pub struct InstallerApp {
    pub router: Router,
    pub table: Arc<EndpointTable>,
    pub installer: Arc<DryRunInstaller>,
    pub reports: ErrorReports,
}

/// Derive the installer table, bind the dry-run controllers and build the
/// router. Background work is not started; call
/// [`DryRunInstaller::start`] once a runtime is running.
pub fn installer_app(config: ServerConfig) -> Result<InstallerApp, StartupError> {
    let table = Arc::new(keel_installer_api::installer_table()?);
    let installer = DryRunInstaller::new(config);
    let reports = ErrorReports::new();

    let mut bindings = Bindings::new();
    installer.bind(&mut bindings);
    reports.bind(&mut bindings);

    let router = build_router(Arc::clone(&table), bindings, reports.clone())?;
    Ok(InstallerApp {
        router,
        table,
        installer,
        reports,
    })
}

/// The installer's simple get/set values.
#[derive(Clone, Default)]
pub struct SimpleValues {
    pub identity: SimpleStore<IdentityData>,
    pub locale: SimpleStore<String>,
    pub mirror: SimpleStore<String>,
    pub proxy: SimpleStore<String>,
    pub ssh: SimpleStore<SSHData>,
    pub updates: SimpleStore<String>,
    pub wslconfbase: SimpleStore<WSLConfigurationBase>,
    pub wslconfadvanced: SimpleStore<WSLConfigurationAdvanced>,
}

impl SimpleValues {
    /// Bind every store. `mark` receives the endpoint name after each
    /// successful `POST`.
    fn bind<F>(&self, bindings: &mut Bindings, mark: F)
    where
        F: Fn(&str) + Clone + Send + Sync + 'static,
    {
        fn hook<F>(mark: &F, name: &'static str) -> impl Fn() + Send + Sync + 'static
        where
            F: Fn(&str) + Clone + Send + Sync + 'static,
        {
            let mark = mark.clone();
            move || mark(name)
        }

        self.identity.bind_with(bindings, "/identity", hook(&mark, "identity"));
        self.locale.bind_with(bindings, "/locale", hook(&mark, "locale"));
        self.mirror.bind_with(bindings, "/mirror", hook(&mark, "mirror"));
        self.proxy.bind_with(bindings, "/proxy", hook(&mark, "proxy"));
        self.ssh.bind_with(bindings, "/ssh", hook(&mark, "ssh"));
        self.updates.bind_with(bindings, "/updates", hook(&mark, "updates"));
        self.wslconfbase.bind_with(bindings, "/wslconfbase", hook(&mark, "wslconfbase"));
        self.wslconfadvanced
            .bind_with(bindings, "/wslconfadvanced", hook(&mark, "wslconfadvanced"));
    }
}

fn dry_run_refresh() -> RefreshStatus {
    RefreshStatus {
        availability: RefreshCheckState::Unavailable,
        current_snap_version: "dry-run".into(),
        new_snap_version: String::new(),
    }
}

/// The simulated installer.
pub struct DryRunInstaller {
    config: ServerConfig,
    pub values: SimpleValues,
    status: WaitableValue<ApplicationStatus>,
    refresh: WaitableValue<RefreshStatus>,
    storage: WaitableValue<StorageResponse>,
    configured: std::sync::Mutex<BTreeSet<String>>,
    variant: Mutex<Option<String>>,
}

impl DryRunInstaller {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            values: SimpleValues::default(),
            status: WaitableValue::resolved(ApplicationStatus::new(ApplicationState::StartingUp)),
            refresh: WaitableValue::new(),
            storage: WaitableValue::new(),
            configured: std::sync::Mutex::new(BTreeSet::new()),
            variant: Mutex::new(None),
        })
    }

    /// Start the simulated background work. Must be called from within a
    /// tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let delay = self.config.dry_run_delay;
        let refresh = self.refresh.generation();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.refresh.complete(refresh, dry_run_refresh());
            this.storage.resolve(StorageResponse {
                status: ProbeStatus::Done,
                error_report: None,
                config: Some(Vec::new()),
                orig_config: Some(Vec::new()),
            });
            this.set_state(ApplicationState::Waiting);
            tracing::info!("dry run: probes finished, waiting for confirmation");
        });
    }

    pub fn state(&self) -> ApplicationState {
        self.status
            .get()
            .map(|s| s.state)
            .unwrap_or(ApplicationState::StartingUp)
    }

    fn set_state(&self, state: ApplicationState) {
        let mut status = self
            .status
            .get()
            .unwrap_or_else(|| ApplicationStatus::new(state));
        status.state = state;
        self.status.advance(status);
    }

    /// Number of clients currently long-polling `GET /meta/status`.
    pub fn status_waiters(&self) -> usize {
        self.status.waiters()
    }

    /// Names of the endpoints marked configured, either through
    /// `POST /meta/mark_configured` or by writing a simple endpoint.
    pub fn configured(&self) -> BTreeSet<String> {
        self.configured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mark_configured(&self, names: impl IntoIterator<Item = String>) {
        self.configured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(names);
    }

    /// Start a new refresh check, superseding any check in flight, and
    /// return its change id.
    pub fn refresh_start(self: &Arc<Self>) -> String {
        let generation = self.refresh.rearm();
        tracing::info!(generation, "dry run: refresh check started");

        let delay = self.config.dry_run_delay;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !this.refresh.complete(generation, dry_run_refresh()) {
                tracing::debug!(generation, "dry run: refresh check superseded");
            }
        });
        generation.to_string()
    }

    pub async fn variant(&self) -> Option<String> {
        self.variant.lock().await.clone()
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    async fn status_get(&self, args: Arguments) -> Result<ApplicationStatus, HandlerError> {
        let cur = match args.presence("cur") {
            Presence::Given => args.get::<Option<ApplicationState>>("cur")?,
            Presence::Null | Presence::Omitted => None,
        };
        let current = self.status.get();
        match (cur, current) {
            (None, Some(status)) => Ok(status),
            (Some(cur), Some(status)) if status.state != cur => Ok(status),
            (cur, _) => self
                .status
                .wait_until(|s| cur.map_or(true, |cur| s.state != cur))
                .await
                .map_err(|e| HandlerError::internal(e.to_string())),
        }
    }

    async fn confirm(self: Arc<Self>, tty: String) -> Result<(), HandlerError> {
        let state = self.state();
        if !matches!(
            state,
            ApplicationState::Waiting | ApplicationState::NeedsConfirmation
        ) {
            return Err(HandlerError::domain(
                "not_waiting",
                format!("cannot confirm while the installer is {state:?}"),
            ));
        }
        let mut status = ApplicationStatus::new(ApplicationState::Running);
        status.confirming_tty = tty;
        status.interactive = Some(true);
        self.status.advance(status);
        tracing::info!("dry run: install confirmed");

        let delay = self.config.dry_run_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.set_state(ApplicationState::Done);
            tracing::info!("dry run: install finished");
        });
        Ok(())
    }

    async fn refresh_get(&self, wait: bool) -> Result<RefreshStatus, HandlerError> {
        if wait {
            return self
                .refresh
                .wait()
                .await
                .map_err(|e| HandlerError::internal(e.to_string()));
        }
        Ok(self.refresh.get().unwrap_or_else(RefreshStatus::unknown))
    }

    fn refresh_progress(&self, change_id: &str) -> Result<Value, HandlerError> {
        let unknown = || {
            HandlerError::domain("unknown_change", format!("no refresh change {change_id:?}"))
        };
        let generation: u64 = change_id.parse().map_err(|_| unknown())?;
        if generation == 0 || generation != self.refresh.generation() {
            return Err(unknown());
        }
        let status = if self.refresh.is_resolved() { "Done" } else { "Doing" };
        Ok(json!({ "id": change_id, "status": status }))
    }

    async fn storage_get(&self, wait: bool) -> Result<StorageResponse, HandlerError> {
        if wait {
            return self
                .storage
                .wait()
                .await
                .map_err(|e| HandlerError::internal(e.to_string()));
        }
        Ok(self.storage.get().unwrap_or_else(StorageResponse::probing))
    }

    /// Bind every endpoint this installer implements.
    pub fn bind(self: &Arc<Self>, bindings: &mut Bindings) {
        let this = Arc::clone(self);
        self.values
            .bind(bindings, move |name| this.mark_configured([name.to_string()]));

        let this = Arc::clone(self);
        bindings.bind(Method::Get, "/meta/status", move |args: Arguments| {
            let this = Arc::clone(&this);
            async move { this.status_get(args).await }
        });

        let this = Arc::clone(self);
        bindings.bind(Method::Post, "/meta/mark_configured", move |args: Arguments| {
            let this = Arc::clone(&this);
            async move {
                let names: Vec<String> = args.get("endpoint_names")?;
                tracing::debug!(?names, "marking configured");
                this.mark_configured(names);
                Ok(())
            }
        });

        let this = Arc::clone(self);
        bindings.bind(Method::Post, "/meta/client_variant", move |args: Arguments| {
            let this = Arc::clone(&this);
            async move {
                let variant: String = args.get("variant")?;
                if variant != "server" && variant != "desktop" {
                    return Err(HandlerError::domain(
                        "unknown_variant",
                        format!("unsupported install variant {variant:?}"),
                    ));
                }
                *this.variant.lock().await = Some(variant);
                Ok(())
            }
        });

        let this = Arc::clone(self);
        bindings.bind(Method::Post, "/meta/confirm", move |args: Arguments| {
            let this = Arc::clone(&this);
            async move {
                let tty: String = args.get("tty")?;
                this.confirm(tty).await
            }
        });

        bindings.bind(Method::Post, "/meta/restart", |_args: Arguments| async {
            tracing::info!("dry run: restart requested, ignoring");
            Ok::<(), HandlerError>(())
        });

        bindings.bind(Method::Get, "/meta/ssh_info", |_args: Arguments| async {
            Ok::<_, HandlerError>(Some(LiveSessionSSHInfo {
                username: "installer".into(),
                password: None,
                ips: vec!["127.0.0.1".into()],
                host_key_fingerprints: Vec::new(),
            }))
        });

        let this = Arc::clone(self);
        bindings.bind(Method::Get, "/refresh", move |args: Arguments| {
            let this = Arc::clone(&this);
            async move {
                let wait: bool = args.get("wait")?;
                this.refresh_get(wait).await
            }
        });

        let this = Arc::clone(self);
        bindings.bind(Method::Post, "/refresh", move |_args: Arguments| {
            let this = Arc::clone(&this);
            async move { Ok::<_, HandlerError>(this.refresh_start()) }
        });

        let this = Arc::clone(self);
        bindings.bind(Method::Get, "/refresh/progress", move |args: Arguments| {
            let this = Arc::clone(&this);
            async move {
                let change_id: String = args.get("change_id")?;
                this.refresh_progress(&change_id)
            }
        });

        let this = Arc::clone(self);
        bindings.bind(Method::Get, "/storage", move |args: Arguments| {
            let this = Arc::clone(&this);
            async move {
                let wait: bool = args.get("wait")?;
                this.storage_get(wait).await
            }
        });

        if self.config.dry_run {
            bindings.bind(Method::Get, "/dry_run/crash", |_args: Arguments| async {
                Err::<(), _>(HandlerError::internal("crash requested through /dry_run/crash"))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn installer(delay_ms: u64) -> Arc<DryRunInstaller> {
        DryRunInstaller::new(ServerConfig {
            dry_run_delay: Duration::from_millis(delay_ms),
            ..ServerConfig::default()
        })
    }

    #[tokio::test]
    async fn status_without_cur_answers_immediately() {
        let installer = installer(10_000);
        let status = installer.status_get(Arguments::new()).await.unwrap();
        assert_eq!(status.state, ApplicationState::StartingUp);
    }

    #[tokio::test]
    async fn status_with_cur_waits_for_a_change() {
        let installer = installer(20);
        installer.start();
        let args = Arguments::new().with("cur", json!("STARTING_UP"));
        let status = installer.status_get(args).await.unwrap();
        assert_eq!(status.state, ApplicationState::Waiting);
    }

    #[tokio::test]
    async fn confirm_runs_to_done() {
        let installer = installer(10);
        installer.start();
        let waiting = Arguments::new().with("cur", json!("STARTING_UP"));
        installer.status_get(waiting).await.unwrap();

        Arc::clone(&installer).confirm("/dev/tty1".into()).await.unwrap();
        assert_eq!(installer.state(), ApplicationState::Running);

        let running = Arguments::new().with("cur", json!("RUNNING"));
        let status = installer.status_get(running).await.unwrap();
        assert_eq!(status.state, ApplicationState::Done);
    }

    #[tokio::test]
    async fn confirm_before_waiting_is_a_domain_error() {
        let installer = installer(10_000);
        let err = Arc::clone(&installer).confirm("/dev/tty1".into()).await.unwrap_err();
        assert!(matches!(err, HandlerError::Domain { ref kind, .. } if kind == "not_waiting"));
    }

    #[tokio::test]
    async fn refresh_reports_unknown_until_checked() {
        let installer = installer(20);
        assert_eq!(
            installer.refresh_get(false).await.unwrap().availability,
            RefreshCheckState::Unknown
        );
        installer.start();
        let status = installer.refresh_get(true).await.unwrap();
        assert_eq!(status.availability, RefreshCheckState::Unavailable);
    }

    #[tokio::test]
    async fn refresh_restart_supersedes_the_check_in_flight() {
        let installer = installer(100);
        installer.start();
        let initial = installer.refresh.generation();

        let waiter = {
            let installer = Arc::clone(&installer);
            tokio::spawn(async move { installer.refresh_get(true).await })
        };
        while installer.refresh.waiters() == 0 {
            tokio::task::yield_now().await;
        }

        let change_id = installer.refresh_start();
        assert_ne!(change_id, initial.to_string());
        assert!(!installer.refresh.complete(initial, dry_run_refresh()));
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished(), "a stale completion must not release waiters");
        assert_eq!(installer.refresh_progress(&change_id).unwrap()["status"], "Doing");

        let status = waiter.await.unwrap().unwrap();
        assert_eq!(status.availability, RefreshCheckState::Unavailable);
        assert_eq!(installer.refresh_progress(&change_id).unwrap()["status"], "Done");
    }

    #[tokio::test]
    async fn refresh_progress_rejects_unknown_changes() {
        let installer = installer(10_000);
        let first = installer.refresh_start();
        let second = installer.refresh_start();
        assert_ne!(first, second);

        for id in [first.as_str(), "0", "not-a-change"] {
            let err = installer.refresh_progress(id).unwrap_err();
            assert!(
                matches!(err, HandlerError::Domain { ref kind, .. } if kind == "unknown_change"),
                "change id {id:?}"
            );
        }
        assert!(installer.refresh_progress(&second).is_ok());
    }

    #[tokio::test]
    async fn writing_a_simple_endpoint_marks_it_configured() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let app = installer_app(ServerConfig::default()).unwrap();
        assert!(app.installer.configured().is_empty());

        let req = Request::builder()
            .method("POST")
            .uri("/wslconfbase")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = app.router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder()
            .method("POST")
            .uri("/meta/mark_configured")
            .header("content-type", "application/json")
            .body(Body::from(r#"["locale"]"#))
            .unwrap();
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let configured: Vec<String> = app.installer.configured().into_iter().collect();
        assert_eq!(configured, ["locale", "wslconfbase"]);
    }

    #[tokio::test]
    async fn storage_probes_in_the_background() {
        let installer = installer(20);
        assert_eq!(installer.storage_get(false).await.unwrap().status, ProbeStatus::Probing);
        installer.start();
        assert_eq!(installer.storage_get(true).await.unwrap().status, ProbeStatus::Done);
    }

    #[test]
    fn binds_against_the_installer_table() {
        let app = installer_app(ServerConfig::default()).unwrap();
        assert_eq!(app.table.len(), keel_installer_api::installer_api().verb_count());
    }

    #[tokio::test]
    async fn crash_endpoint_only_in_dry_run() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let config = ServerConfig {
            dry_run: false,
            ..ServerConfig::default()
        };
        let app = installer_app(config).unwrap();
        let req = Request::builder()
            .uri("/dry_run/crash")
            .body(Body::empty())
            .unwrap();
        let resp = app.router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
