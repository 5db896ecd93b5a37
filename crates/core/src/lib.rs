//! Core functionality for the BanMesh moderation replication system.
//!
//! This crate provides the identity types, configuration and logging
//! utilities shared by the sync engine and the node service.

pub mod config;
pub mod logging;
pub mod types;

pub use config::{Config, ConfigError, LogFormat, NodeConfig, SyncSettings};
pub use types::{current_timestamp_ms, ActorId, NodeId, SubjectId};
