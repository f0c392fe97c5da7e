//! Process host for the capsule service.
//!
//! Provides the durable [`SqliteCapsuleStore`], the periodic
//! [`sweeper::Sweeper`] that retires long-past-unlock capsules, and the
//! TOML [`config`] the `capsuled` binary loads. The transport/API layer is
//! an external collaborator; this crate owns persistence and the one
//! background actor.

pub mod config;
pub mod store;
pub mod sweeper;

pub use config::{CapsuledConfig, ConfigError};
pub use store::SqliteCapsuleStore;
pub use sweeper::{Sweeper, SweeperConfig, SweeperError};
