//! System-level endpoints: `/zdev`, `/timezone` and `/shutdown`.

use keel::{RecordSpec, TypeSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// An s390x z device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZdevInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub on: bool,
    pub exists: bool,
    #[serde(default)]
    pub pers: bool,
    #[serde(default)]
    pub auto: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub names: String,
}

impl WireType for ZdevInfo {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("ZdevInfo")
            .field::<String>("id")
            .field::<String>("type")
            .field::<bool>("on")
            .field::<bool>("exists")
            .field_or::<bool>("pers", json!(false))
            .field_or::<bool>("auto", json!(false))
            .field_or::<bool>("failed", json!(false))
            .field_or::<String>("names", json!(""))
            .into()
    }
}

/// The response body for `GET /timezone`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeZoneInfo {
    pub timezone: String,
    #[serde(default)]
    pub from_geoip: bool,
}

impl WireType for TimeZoneInfo {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("TimeZoneInfo")
            .field::<String>("timezone")
            .field_or::<bool>("from_geoip", json!(false))
            .into()
    }
}

wire_enum! {
    /// What `POST /shutdown` does once the install has finished.
    pub enum ShutdownMode {
        Reboot => "REBOOT",
        Poweroff => "POWEROFF",
    }
}
