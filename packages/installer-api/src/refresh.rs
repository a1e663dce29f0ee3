//! Installer self-refresh: `GET /refresh` and `POST /refresh`.

use keel::{RecordSpec, TypeSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::json;

wire_enum! {
    /// Result of checking the snap store for a newer installer.
    pub enum RefreshCheckState {
        Unknown => "UNKNOWN",
        Available => "AVAILABLE",
        Unavailable => "UNAVAILABLE",
    }
}

/// The response body for `GET /refresh`. `availability` stays `UNKNOWN`
/// until the check has finished; `?wait=true` blocks until then.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshStatus {
    pub availability: RefreshCheckState,
    #[serde(default)]
    pub current_snap_version: String,
    #[serde(default)]
    pub new_snap_version: String,
}

impl RefreshStatus {
    /// The sentinel returned before the check has completed.
    pub fn unknown() -> Self {
        Self {
            availability: RefreshCheckState::Unknown,
            current_snap_version: String::new(),
            new_snap_version: String::new(),
        }
    }
}

impl WireType for RefreshStatus {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("RefreshStatus")
            .field::<RefreshCheckState>("availability")
            .field_or::<String>("current_snap_version", json!(""))
            .field_or::<String>("new_snap_version", json!(""))
            .into()
    }
}
