//! Public surface for the `keel-server` crate.
//!
//! Turns an [`keel::EndpointTable`] plus a set of handler [`Bindings`] into an
//! Axum [`axum::Router`], and ships the dry-run installer controllers that
//! serve the installer API. The router builder is exposed so that external
//! crates (the conformance suite) can run an in-process server.

pub mod args;
pub mod config;
pub mod error;
pub mod handlers;
pub mod installer;
pub mod reports;
pub mod router;

pub use args::{Arguments, Presence};
pub use config::ServerConfig;
pub use error::{AppError, StartupError};
pub use handlers::simple::{Setting, SimpleStore};
pub use handlers::{BindError, Bindings, Handler, HandlerError};
pub use installer::{installer_app, DryRunInstaller, InstallerApp};
pub use reports::ErrorReports;
pub use router::build_router;
