//! Infrastructure layer: storage engines, the RBAC service, bootstrap data,
//! and configuration.

pub mod config;
pub mod seed;
pub mod service;
pub mod store;

pub use config::{ConfigError, WardenConfig};
pub use service::RbacService;
pub use store::{InMemoryRbacStore, PostgresRbacStore, RbacStore, StoreError};
