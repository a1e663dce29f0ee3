//! The installer protocol, declared once and consumed by both ends.
//!
//! [`installer_api`] is the API offered by the installer server process;
//! [`net_event_api`] is the API a client serves to receive network events
//! after subscribing through `PUT /network/subscription`. The record, enum
//! and union types in the submodules are the values those endpoints carry,
//! each with a [`keel::WireType`] impl next to its serde derives.
//!
//! # Long-poll endpoints
//!
//! | Method | Path | Waits until |
//! |--------|------|-------------|
//! | GET | `/meta/status?cur=...` | the application state differs from `cur` |
//! | GET | `/refresh?wait=true` | the snap refresh check has finished |
//! | GET | `/storage?wait=true` | storage probing has finished |
//! | GET | `/storage/guided?wait=true` | storage probing has finished |
//! | GET | `/snaplist?wait=true` | the snap list has loaded |
//! | GET | `/errors/wait?id=...` | the error report is fully populated |

/// Declare a wire enumeration together with its [`keel::WireType`] impl.
/// Variants serialise as the given literal.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl keel::WireType for $name {
            fn type_spec() -> keel::TypeSpec {
                keel::EnumSpec::new(stringify!($name), [$($wire),+]).into()
            }
        }
    };
}

pub mod api;
pub mod identity;
pub mod keyboard;
pub mod meta;
pub mod network;
pub mod refresh;
pub mod snaps;
pub mod storage;
pub mod system;

pub use api::{installer_api, installer_table, net_event_api, net_event_table};
pub use identity::{IdentityData, SSHData, WSLConfigurationAdvanced, WSLConfigurationBase};
pub use keyboard::{AnyStep, KeyboardLayout, KeyboardSetting, KeyboardSetup, KeyboardVariant};
pub use meta::{ApplicationState, ApplicationStatus, LiveSessionSSHInfo};
pub use network::{BondConfig, LinkAction, StaticConfig, WLANConfig, WLANSupportInstallState};
pub use refresh::{RefreshCheckState, RefreshStatus};
pub use snaps::{SnapCheckState, SnapInfo, SnapListResponse, SnapSelection};
pub use storage::{Disk, GuidedChoice, GuidedStorageResponse, ProbeStatus, StorageResponse};
pub use system::{ShutdownMode, TimeZoneInfo, ZdevInfo};
