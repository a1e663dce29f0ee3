//! Network configuration bodies and the network event types.
//!
//! Device and status reports (`NetworkStatus`, `NetDevInfo`) are produced by
//! the network model and travel as free-form JSON.

use keel::{RecordSpec, TypeSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The body of `POST /network/set_static_config`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticConfig {
    pub addresses: Vec<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub searchdomains: Vec<String>,
}

impl WireType for StaticConfig {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("StaticConfig")
            .field::<Vec<String>>("addresses")
            .optional::<String>("gateway")
            .field_or::<Vec<String>>("nameservers", json!([]))
            .field_or::<Vec<String>>("searchdomains", json!([]))
            .into()
    }
}

/// The body of `POST /network/add_or_edit_bond`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BondConfig {
    pub interfaces: Vec<String>,
    pub mode: String,
    #[serde(default)]
    pub xmit_hash_policy: Option<String>,
    #[serde(default)]
    pub lacp_rate: Option<String>,
}

impl WireType for BondConfig {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("BondConfig")
            .field::<Vec<String>>("interfaces")
            .field::<String>("mode")
            .optional::<String>("xmit_hash_policy")
            .optional::<String>("lacp_rate")
            .into()
    }
}

/// The body of `POST /network/set_wlan`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WLANConfig {
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub psk: Option<String>,
}

impl WireType for WLANConfig {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("WLANConfig")
            .optional::<String>("ssid")
            .optional::<String>("psk")
            .into()
    }
}

wire_enum! {
    pub enum WLANSupportInstallState {
        NotNeeded => "NOT_NEEDED",
        NotAvailable => "NOT_AVAILABLE",
        Installing => "INSTALLING",
        Failed => "FAILED",
        Done => "DONE",
    }
}

wire_enum! {
    /// The kind of change reported by `POST /update_link`.
    pub enum LinkAction {
        New => "NEW",
        Change => "CHANGE",
        Del => "DEL",
    }
}
