//! Values behind the simple get/set endpoints: `/identity`, `/ssh`,
//! `/wslconfbase` and `/wslconfadvanced`.

use keel::{RecordSpec, TypeSpec, WireType};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The user account created by the install.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityData {
    #[serde(default)]
    pub realname: String,
    #[serde(default)]
    pub username: String,
    /// A crypt(3) hash, never the clear-text password.
    #[serde(default)]
    pub crypted_password: String,
    #[serde(default)]
    pub hostname: String,
}

impl WireType for IdentityData {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("IdentityData")
            .field_or::<String>("realname", json!(""))
            .field_or::<String>("username", json!(""))
            .field_or::<String>("crypted_password", json!(""))
            .field_or::<String>("hostname", json!(""))
            .into()
    }
}

/// OpenSSH server configuration for the installed system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SSHData {
    pub install_server: bool,
    pub allow_pw: bool,
    #[serde(default)]
    pub authorized_keys: Vec<String>,
}

impl WireType for SSHData {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("SSHData")
            .field::<bool>("install_server")
            .field::<bool>("allow_pw")
            .field_or::<Vec<String>>("authorized_keys", json!([]))
            .into()
    }
}

fn default_custom_path() -> String {
    "/mnt/".to_string()
}

fn default_true() -> bool {
    true
}

/// Basic WSL settings (automount root and generated network files).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WSLConfigurationBase {
    #[serde(default = "default_custom_path")]
    pub custom_path: String,
    #[serde(default)]
    pub custom_mount_opt: String,
    #[serde(default = "default_true")]
    pub gen_host: bool,
    #[serde(default = "default_true")]
    pub gen_resolvconf: bool,
}

impl Default for WSLConfigurationBase {
    fn default() -> Self {
        Self {
            custom_path: default_custom_path(),
            custom_mount_opt: String::new(),
            gen_host: true,
            gen_resolvconf: true,
        }
    }
}

impl WireType for WSLConfigurationBase {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("WSLConfigurationBase")
            .field_or::<String>("custom_path", json!("/mnt/"))
            .field_or::<String>("custom_mount_opt", json!(""))
            .field_or::<bool>("gen_host", json!(true))
            .field_or::<bool>("gen_resolvconf", json!(true))
            .into()
    }
}

/// Advanced WSL settings: interop, GUI integration and automount behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WSLConfigurationAdvanced {
    #[serde(default = "default_true")]
    pub interop_enabled: bool,
    #[serde(default = "default_true")]
    pub interop_appendwindowspath: bool,
    #[serde(default = "default_gui_theme")]
    pub gui_theme: String,
    #[serde(default = "default_true")]
    pub gui_followwintheme: bool,
    #[serde(default)]
    pub legacy_gui: bool,
    #[serde(default)]
    pub legacy_audio: bool,
    #[serde(default)]
    pub adv_ip_detect: bool,
    #[serde(default = "default_true")]
    pub wsl_motd_news: bool,
    #[serde(default = "default_true")]
    pub automount: bool,
    #[serde(default = "default_true")]
    pub mountfstab: bool,
}

fn default_gui_theme() -> String {
    "default".to_string()
}

impl WireType for WSLConfigurationAdvanced {
    fn type_spec() -> TypeSpec {
        RecordSpec::new("WSLConfigurationAdvanced")
            .field_or::<bool>("interop_enabled", json!(true))
            .field_or::<bool>("interop_appendwindowspath", json!(true))
            .field_or::<String>("gui_theme", json!("default"))
            .field_or::<bool>("gui_followwintheme", json!(true))
            .field_or::<bool>("legacy_gui", json!(false))
            .field_or::<bool>("legacy_audio", json!(false))
            .field_or::<bool>("adv_ip_detect", json!(false))
            .field_or::<bool>("wsl_motd_news", json!(true))
            .field_or::<bool>("automount", json!(true))
            .field_or::<bool>("mountfstab", json!(true))
            .into()
    }
}
