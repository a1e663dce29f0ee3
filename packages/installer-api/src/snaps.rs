//! Snap selection: `/snaplist` and `/snaplist/snap_info`.

use keel::{RecordSpec, TypeSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::json;

wire_enum! {
    pub enum SnapCheckState {
        Loading => "LOADING",
        Failed => "FAILED",
        Done => "DONE",
    }
}

/// One snap chosen for installation. The body of `POST /snaplist` is an
/// ordered list of these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapSelection {
    pub name: String,
    pub channel: String,
    #[serde(default)]
    pub classic: bool,
}

impl WireType for SnapSelection {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("SnapSelection")
            .field::<String>("name")
            .field::<String>("channel")
            .field_or::<bool>("classic", json!(false))
            .into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapInfo {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confinement: String,
    #[serde(default)]
    pub license: String,
}

impl WireType for SnapInfo {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("SnapInfo")
            .field::<String>("name")
            .field_or::<String>("summary", json!(""))
            .field_or::<String>("publisher", json!(""))
            .field_or::<bool>("verified", json!(false))
            .field_or::<String>("description", json!(""))
            .field_or::<String>("confinement", json!(""))
            .field_or::<String>("license", json!(""))
            .into()
    }
}

/// The response body for `GET /snaplist`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapListResponse {
    pub status: SnapCheckState,
    #[serde(default)]
    pub snaps: Vec<SnapInfo>,
    #[serde(default)]
    pub selections: Vec<SnapSelection>,
}

impl WireType for SnapListResponse {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("SnapListResponse")
            .field::<SnapCheckState>("status")
            .field_or::<Vec<SnapInfo>>("snaps", json!([]))
            .field_or::<Vec<SnapSelection>>("selections", json!([]))
            .into()
    }
}
