//! Installer state: `GET /meta/status` and `GET /meta/ssh_info`.

use keel::{ErrorReportRef, RecordSpec, TypeSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::json;

wire_enum! {
    /// Where the installer is in its lifecycle. Clients long-poll
    /// `GET /meta/status?cur=<state>` to be told about the next transition.
    pub enum ApplicationState {
        StartingUp => "STARTING_UP",
        CloudInitWait => "CLOUD_INIT_WAIT",
        EarlyCommands => "EARLY_COMMANDS",
        Waiting => "WAITING",
        NeedsConfirmation => "NEEDS_CONFIRMATION",
        Running => "RUNNING",
        PostWait => "POST_WAIT",
        PostRunning => "POST_RUNNING",
        UuRunning => "UU_RUNNING",
        UuCancelling => "UU_CANCELLING",
        Done => "DONE",
        Error => "ERROR",
    }
}

impl ApplicationState {
    /// `true` once the install can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ApplicationState::Done | ApplicationState::Error)
    }
}

/// The response body for `GET /meta/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationStatus {
    pub state: ApplicationState,

    /// The tty that confirmed the install, empty until confirmed.
    #[serde(default)]
    pub confirming_tty: String,

    /// Set when `state` is `ERROR`.
    #[serde(default)]
    pub error: Option<ErrorReportRef>,

    #[serde(default = "default_true")]
    pub cloud_init_ok: bool,

    /// `None` until it is known whether the install is interactive.
    #[serde(default)]
    pub interactive: Option<bool>,

    #[serde(default)]
    pub echo_syslog_id: String,
    #[serde(default)]
    pub log_syslog_id: String,
    #[serde(default)]
    pub event_syslog_id: String,
}

fn default_true() -> bool {
    true
}

impl ApplicationStatus {
    pub fn new(state: ApplicationState) -> Self {
        Self {
            state,
            confirming_tty: String::new(),
            error: None,
            cloud_init_ok: true,
            interactive: None,
            echo_syslog_id: String::new(),
            log_syslog_id: String::new(),
            event_syslog_id: String::new(),
        }
    }
}

impl WireType for ApplicationStatus {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("ApplicationStatus")
            .field::<ApplicationState>("state")
            .field_or::<String>("confirming_tty", json!(""))
            .optional::<ErrorReportRef>("error")
            .field_or::<bool>("cloud_init_ok", json!(true))
            .optional::<bool>("interactive")
            .field_or::<String>("echo_syslog_id", json!(""))
            .field_or::<String>("log_syslog_id", json!(""))
            .field_or::<String>("event_syslog_id", json!(""))
            .into()
    }
}

/// How to reach the live installer session over SSH.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiveSessionSSHInfo {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub host_key_fingerprints: Vec<String>,
}

impl WireType for LiveSessionSSHInfo {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("LiveSessionSSHInfo")
            .field::<String>("username")
            .optional::<String>("password")
            .field_or::<Vec<String>>("ips", json!([]))
            .field_or::<Vec<String>>("host_key_fingerprints", json!([]))
            .into()
    }
}
