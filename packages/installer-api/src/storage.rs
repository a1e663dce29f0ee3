//! Storage configuration: `/storage` and `/storage/guided`.
//!
//! Probing the disks happens once at startup and can take a while; both GET
//! endpoints report `PROBING` until it finishes unless called with
//! `wait=true`.

use keel::{ErrorReportRef, RecordSpec, TypeSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

wire_enum! {
    pub enum ProbeStatus {
        Probing => "PROBING",
        Failed => "FAILED",
        Done => "DONE",
    }
}

/// A disk offered for installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Disk {
    pub id: String,
    pub label: String,
    pub size: u64,
    #[serde(default)]
    pub ok_for_guided: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl WireType for Disk {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("Disk")
            .field::<String>("id")
            .field::<String>("label")
            .field::<u64>("size")
            .field_or::<bool>("ok_for_guided", json!(false))
            .optional::<String>("path")
            .optional::<String>("model")
            .into()
    }
}

/// The response body for `GET /storage` and the storage-changing POSTs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageResponse {
    pub status: ProbeStatus,
    #[serde(default)]
    pub error_report: Option<ErrorReportRef>,
    /// Curtin storage actions, passed through untouched.
    #[serde(default)]
    pub config: Option<Vec<Value>>,
    #[serde(default)]
    pub orig_config: Option<Vec<Value>>,
}

impl StorageResponse {
    pub fn probing() -> Self {
        Self {
            status: ProbeStatus::Probing,
            error_report: None,
            config: None,
            orig_config: None,
        }
    }
}

impl WireType for StorageResponse {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("StorageResponse")
            .field::<ProbeStatus>("status")
            .optional::<ErrorReportRef>("error_report")
            .optional::<Vec<Value>>("config")
            .optional::<Vec<Value>>("orig_config")
            .into()
    }
}

/// The body of `POST /storage/guided`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuidedChoice {
    pub disk_id: String,
    #[serde(default)]
    pub use_lvm: bool,
    #[serde(default)]
    pub password: Option<String>,
}

impl WireType for GuidedChoice {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("GuidedChoice")
            .field::<String>("disk_id")
            .field_or::<bool>("use_lvm", json!(false))
            .optional::<String>("password")
            .into()
    }
}

/// The response body for `GET /storage/guided`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuidedStorageResponse {
    pub status: ProbeStatus,
    #[serde(default)]
    pub error_report: Option<ErrorReportRef>,
    /// Disks in the order the probe reported them.
    #[serde(default)]
    pub disks: Option<Vec<Disk>>,
}

impl WireType for GuidedStorageResponse {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("GuidedStorageResponse")
            .field::<ProbeStatus>("status")
            .optional::<ErrorReportRef>("error_report")
            .optional::<Vec<Disk>>("disks")
            .into()
    }
}
