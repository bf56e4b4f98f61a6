//! Core of the mosaic storage gateway.
//!
//! Presents many storage backends as one virtual tree and decides, per
//! user and path, what may be seen and done there.
//!
//! # Layers
//!
//! |--------------|------------------------------------------------------|
//! | Module       | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | [`vfs`]      | Mount registry, listing merge, multi-point aggregation |
//! | [`access`]   | Effective permissions, hide rules, password gates    |
//! | [`roles`]    | Role/user stores, expiring caches, cascading mutations |
//! | [`config`]   | TOML configuration                                   |
//! | [`gateway`]  | The facade front ends call                           |
//! |--------------|------------------------------------------------------|
//!
//! [`Gateway`] wires them together.

pub mod access;
pub mod config;
pub mod gateway;
pub mod roles;
pub mod vfs;

pub use config::{CacheConfig, ConfigError, DriverConfig, GatewayConfig, ReleasesConfig};
pub use gateway::{Gateway, GatewayError, GatewayResult, ListOptions};
