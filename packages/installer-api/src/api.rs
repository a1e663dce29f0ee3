//! The installer API and the network-event API as schema trees.
//!
//! Both trees are plain data; [`installer_table`] and [`net_event_table`]
//! derive the endpoint tables the server and client bind against.

use keel::{
    simple_endpoint, EndpointTable, ErrorReportRef, ParamSpec, ResourceNode, SchemaError,
    VerbSpec,
};
use serde_json::{json, Value};

use crate::identity::{IdentityData, SSHData, WSLConfigurationAdvanced, WSLConfigurationBase};
use crate::keyboard::{AnyStep, KeyboardSetting, KeyboardSetup};
use crate::meta::{ApplicationState, ApplicationStatus, LiveSessionSSHInfo};
use crate::network::{BondConfig, LinkAction, StaticConfig, WLANConfig, WLANSupportInstallState};
use crate::refresh::RefreshStatus;
use crate::snaps::{SnapInfo, SnapListResponse, SnapSelection};
use crate::storage::{Disk, GuidedChoice, GuidedStorageResponse, StorageResponse};
use crate::system::{ShutdownMode, TimeZoneInfo, ZdevInfo};

fn wait_flag() -> ParamSpec {
    ParamSpec::query::<bool>("wait").default(json!(false))
}

fn dev_name() -> ParamSpec {
    ParamSpec::query::<String>("dev_name")
}

fn ip_version() -> ParamSpec {
    ParamSpec::query::<i64>("ip_version")
}

/// The API offered by the installer server process.
pub fn installer_api() -> ResourceNode {
    ResourceNode::root()
        .doc("The API offered by the installer server process.")
        .child(simple_endpoint::<IdentityData>("identity"))
        .child(simple_endpoint::<String>("locale"))
        .child(simple_endpoint::<String>("mirror"))
        .child(simple_endpoint::<String>("proxy"))
        .child(simple_endpoint::<SSHData>("ssh"))
        .child(simple_endpoint::<String>("updates"))
        .child(simple_endpoint::<WSLConfigurationBase>("wslconfbase"))
        .child(simple_endpoint::<WSLConfigurationAdvanced>("wslconfadvanced"))
        .child(meta())
        .child(
            ResourceNode::group("errors").child(
                ResourceNode::new("wait").verb(
                    VerbSpec::get()
                        .param(ParamSpec::query::<String>("id"))
                        .returns::<ErrorReportRef>()
                        .doc("Block until the error report is fully populated."),
                ),
            ),
        )
        .child(
            ResourceNode::group("dry_run")
                .doc("Only served in dry-run mode.")
                .child(
                    ResourceNode::new("crash")
                        .verb(VerbSpec::get().doc("Always fails with an internal error.")),
                ),
        )
        .child(refresh())
        .child(keyboard())
        .child(
            ResourceNode::new("zdev")
                .verb(VerbSpec::get().returns::<Vec<ZdevInfo>>())
                .child(
                    ResourceNode::new("chzdev").verb(
                        VerbSpec::post()
                            .param(ParamSpec::query::<String>("action"))
                            .param(ParamSpec::body::<ZdevInfo>("zdev"))
                            .returns::<Vec<ZdevInfo>>(),
                    ),
                ),
        )
        .child(network())
        .child(storage())
        .child(
            ResourceNode::new("snaplist")
                .verb(VerbSpec::get().param(wait_flag()).returns::<SnapListResponse>())
                .verb(VerbSpec::post().param(ParamSpec::body::<Vec<SnapSelection>>("data")))
                .child(
                    ResourceNode::new("snap_info").verb(
                        VerbSpec::get()
                            .param(ParamSpec::query::<String>("snap_name"))
                            .returns::<SnapInfo>(),
                    ),
                ),
        )
        .child(
            ResourceNode::new("timezone")
                .verb(VerbSpec::get().returns::<TimeZoneInfo>())
                .verb(VerbSpec::post().param(ParamSpec::query::<String>("tz"))),
        )
        .child(
            ResourceNode::new("shutdown").verb(
                VerbSpec::post()
                    .param(ParamSpec::query::<ShutdownMode>("mode"))
                    .param(ParamSpec::query::<bool>("immediate").default(json!(false))),
            ),
        )
}

fn meta() -> ResourceNode {
    ResourceNode::group("meta")
        .child(
            ResourceNode::new("status").verb(
                VerbSpec::get()
                    .param(ParamSpec::query::<Option<ApplicationState>>("cur").default(Value::Null))
                    .returns::<ApplicationStatus>()
                    .doc("Get the installer state. With `cur`, block until the state differs from it."),
            ),
        )
        .child(
            ResourceNode::new("mark_configured").verb(
                VerbSpec::post()
                    .param(ParamSpec::body::<Vec<String>>("endpoint_names"))
                    .doc("Mark the controllers behind `endpoint_names` as configured."),
            ),
        )
        .child(
            ResourceNode::new("client_variant").verb(
                VerbSpec::post()
                    .param(ParamSpec::query::<String>("variant"))
                    .doc("Choose the install variant, desktop or server."),
            ),
        )
        .child(
            ResourceNode::new("confirm").verb(
                VerbSpec::post()
                    .param(ParamSpec::query::<String>("tty"))
                    .doc("Confirm that the installation should proceed."),
            ),
        )
        .child(
            ResourceNode::new("restart")
                .verb(VerbSpec::post().doc("Restart the server process.")),
        )
        .child(
            ResourceNode::new("ssh_info")
                .verb(VerbSpec::get().returns::<Option<LiveSessionSSHInfo>>()),
        )
}

fn refresh() -> ResourceNode {
    ResourceNode::new("refresh")
        .verb(
            VerbSpec::get()
                .param(wait_flag())
                .returns::<RefreshStatus>()
                .doc("Get the refresh status. With `wait`, block until it is known."),
        )
        .verb(
            VerbSpec::post()
                .returns::<String>()
                .doc("Start the update and return the change id."),
        )
        .child(
            ResourceNode::new("progress").verb(
                VerbSpec::get()
                    .param(ParamSpec::query::<String>("change_id"))
                    .returns::<Value>(),
            ),
        )
}

fn keyboard() -> ResourceNode {
    ResourceNode::new("keyboard")
        .verb(VerbSpec::get().returns::<KeyboardSetup>())
        .verb(VerbSpec::post().param(ParamSpec::body::<KeyboardSetting>("data")))
        .child(
            ResourceNode::new("needs_toggle").verb(
                VerbSpec::get()
                    .param(ParamSpec::query::<String>("layout_code"))
                    .param(ParamSpec::query::<String>("variant_code"))
                    .returns::<bool>(),
            ),
        )
        .child(
            ResourceNode::new("steps").verb(
                VerbSpec::get()
                    .param(ParamSpec::query::<Option<String>>("index").default(Value::Null))
                    .returns::<AnyStep>(),
            ),
        )
}

fn network() -> ResourceNode {
    ResourceNode::new("network")
        .verb(VerbSpec::get().returns::<Value>())
        .verb(VerbSpec::post())
        .child(
            ResourceNode::new("global_addresses")
                .verb(VerbSpec::get().returns::<Vec<String>>()),
        )
        .child(
            ResourceNode::new("subscription")
                .doc("Subscribe to networking updates. The socket serves the network event API.")
                .verb(VerbSpec::put().param(ParamSpec::query::<String>("socket_path")))
                .verb(VerbSpec::delete().param(ParamSpec::query::<String>("socket_path"))),
        )
        .child(
            ResourceNode::new("set_static_config").verb(
                VerbSpec::post()
                    .param(dev_name())
                    .param(ip_version())
                    .param(ParamSpec::body::<StaticConfig>("static_config")),
            ),
        )
        .child(
            ResourceNode::new("enable_dhcp")
                .verb(VerbSpec::post().param(dev_name()).param(ip_version())),
        )
        .child(
            ResourceNode::new("disable")
                .verb(VerbSpec::post().param(dev_name()).param(ip_version())),
        )
        .child(
            ResourceNode::new("vlan").verb(
                VerbSpec::put()
                    .param(dev_name())
                    .param(ParamSpec::query::<i64>("vlan_id")),
            ),
        )
        .child(
            ResourceNode::new("add_or_edit_bond").verb(
                VerbSpec::post()
                    .param(ParamSpec::query::<Option<String>>("existing_name").default(Value::Null))
                    .param(ParamSpec::query::<String>("new_name"))
                    .param(ParamSpec::body::<BondConfig>("bond_config")),
            ),
        )
        .child(ResourceNode::new("start_scan").verb(VerbSpec::post().param(dev_name())))
        .child(
            ResourceNode::new("set_wlan").verb(
                VerbSpec::post()
                    .param(dev_name())
                    .param(ParamSpec::body::<WLANConfig>("wlan")),
            ),
        )
        .child(ResourceNode::new("delete").verb(VerbSpec::post().param(dev_name())))
        .child(
            ResourceNode::new("info")
                .verb(VerbSpec::get().param(dev_name()).returns::<String>()),
        )
}

fn storage() -> ResourceNode {
    ResourceNode::new("storage")
        .verb(VerbSpec::get().param(wait_flag()).returns::<StorageResponse>())
        .verb(VerbSpec::post().param(ParamSpec::body::<Vec<Value>>("config")))
        .child(
            ResourceNode::new("guided")
                .verb(
                    VerbSpec::get()
                        .param(ParamSpec::query::<Option<i64>>("min_size").default(Value::Null))
                        .param(wait_flag())
                        .returns::<GuidedStorageResponse>(),
                )
                .verb(
                    VerbSpec::post()
                        .param(ParamSpec::body::<Option<GuidedChoice>>("choice").default(Value::Null))
                        .returns::<StorageResponse>(),
                ),
        )
        .child(ResourceNode::new("reset").verb(VerbSpec::post().returns::<StorageResponse>()))
        .child(ResourceNode::new("has_rst").verb(VerbSpec::get().returns::<bool>()))
        .child(ResourceNode::new("has_bitlocker").verb(VerbSpec::get().returns::<Vec<Disk>>()))
}

/// Derive the installer endpoint table.
pub fn installer_table() -> Result<EndpointTable, SchemaError> {
    EndpointTable::derive(&installer_api())
}

/// The callbacks a network-event subscriber serves.
pub fn net_event_api() -> ResourceNode {
    ResourceNode::root()
        .child(
            ResourceNode::new("wlan_support_install_finished").verb(
                VerbSpec::post().param(ParamSpec::query::<WLANSupportInstallState>("state")),
            ),
        )
        .child(
            ResourceNode::new("update_link").verb(
                VerbSpec::post()
                    .param(ParamSpec::query::<LinkAction>("act"))
                    .param(ParamSpec::body::<Value>("info")),
            ),
        )
        .child(
            ResourceNode::new("route_watch")
                .verb(VerbSpec::post().param(ParamSpec::body::<Vec<i64>>("routes"))),
        )
        .child(ResourceNode::new("apply_starting").verb(VerbSpec::post()))
        .child(ResourceNode::new("apply_stopping").verb(VerbSpec::post()))
        .child(
            ResourceNode::new("apply_error")
                .verb(VerbSpec::post().param(ParamSpec::query::<String>("stage"))),
        )
}

pub fn net_event_table() -> Result<EndpointTable, SchemaError> {
    EndpointTable::derive(&net_event_api())
}

#[cfg(test)]
mod tests {
    use keel::{Method, TypeSpec, WireType, SIMPLE_VALUE_PARAM};

    use super::*;

    #[test]
    fn installer_tree_derives_one_entry_per_verb() {
        let api = installer_api();
        let table = installer_table().unwrap();
        assert_eq!(table.len(), api.verb_count());
    }

    #[test]
    fn net_event_tree_derives() {
        let table = net_event_table().unwrap();
        assert_eq!(table.len(), 6);
        assert!(table.iter().all(|e| e.method == Method::Post));
    }

    #[test]
    fn simple_endpoints_are_expanded() {
        let table = installer_table().unwrap();
        let get = table.get(Method::Get, "/identity").unwrap();
        assert_eq!(get.returns, TypeSpec::optional(IdentityData::type_spec()));
        let post = table.get(Method::Post, "/identity").unwrap();
        assert_eq!(post.body_param().unwrap().name, SIMPLE_VALUE_PARAM);
        assert_eq!(post.returns, TypeSpec::Unit);
    }

    #[test]
    fn nested_paths_and_groups() {
        let table = installer_table().unwrap();
        assert!(table.get(Method::Get, "/meta/status").is_some());
        assert!(table.get(Method::Get, "/storage/guided").is_some());
        assert!(table.get(Method::Post, "/storage/guided").is_some());
        assert!(table.get(Method::Put, "/network/subscription").is_some());
        assert!(table.get(Method::Delete, "/network/subscription").is_some());
        // Groups only namespace their children.
        assert!(table.methods_at("/meta").is_empty());
        assert!(table.methods_at("/errors").is_empty());
    }

    #[test]
    fn wait_params_default_to_false() {
        let table = installer_table().unwrap();
        for path in ["/refresh", "/storage", "/storage/guided", "/snaplist"] {
            let wait = table.get(Method::Get, path).unwrap().param("wait").unwrap();
            assert_eq!(wait.default, Some(json!(false)), "{path}");
        }
    }

    #[test]
    fn shutdown_signature() {
        let table = installer_table().unwrap();
        let entry = table.get(Method::Post, "/shutdown").unwrap();
        assert_eq!(
            entry.signature(),
            "POST /shutdown(mode: ShutdownMode, immediate: bool = false) -> None"
        );
    }
}
