//! Keyboard configuration: `/keyboard`, `/keyboard/needs_toggle` and the
//! layout-detection steps served by `/keyboard/steps`.

use keel::{RecordSpec, TypeSpec, UnionSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The body of `POST /keyboard`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyboardSetting {
    pub layout: String,
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub toggle: Option<String>,
}

impl WireType for KeyboardSetting {
    fn type_spec() -> TypeSpec {
        setting_spec().into()
    }
}

fn setting_spec() -> RecordSpec {
    RecordSpec::new("KeyboardSetting")
        .field::<String>("layout")
        .field_or::<String>("variant", json!(""))
        .optional::<String>("toggle")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyboardVariant {
    pub code: String,
    pub name: String,
}

impl WireType for KeyboardVariant {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("KeyboardVariant")
            .field::<String>("code")
            .field::<String>("name")
            .into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyboardLayout {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub variants: Vec<KeyboardVariant>,
}

impl WireType for KeyboardLayout {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("KeyboardLayout")
            .field::<String>("code")
            .field::<String>("name")
            .field_or::<Vec<KeyboardVariant>>("variants", json!([]))
            .into()
    }
}

/// The response body for `GET /keyboard`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyboardSetup {
    pub setting: KeyboardSetting,
    pub layouts: Vec<KeyboardLayout>,
}

impl WireType for KeyboardSetup {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("KeyboardSetup")
            .field::<KeyboardSetting>("setting")
            .field::<Vec<KeyboardLayout>>("layouts")
            .into()
    }
}

/// One step of interactive layout detection, tagged by `$type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "$type")]
pub enum AnyStep {
    /// Ask the user to press one of `symbols`; each keycode leads to a step.
    StepPressKey {
        symbols: Vec<String>,
        keycodes: Vec<i64>,
    },
    /// Ask whether `symbol` is present on the keyboard.
    StepKeyPresent {
        symbol: String,
        yes: String,
        no: String,
    },
    /// Detection finished.
    StepResult { layout: String, variant: String },
}

impl WireType for AnyStep {
    fn type_spec() -> TypeSpec {
        UnionSpec::new("AnyStep")
            .variant(
                RecordSpec::new("StepPressKey")
                    .field::<Vec<String>>("symbols")
                    .field::<Vec<i64>>("keycodes"),
            )
            .variant(
                RecordSpec::new("StepKeyPresent")
                    .field::<String>("symbol")
                    .field::<String>("yes")
                    .field::<String>("no"),
            )
            .variant(
                RecordSpec::new("StepResult")
                    .field::<String>("layout")
                    .field::<String>("variant"),
            )
            .into()
    }
}
