//! learnpath-core library.
//!
//! Client-side state for a learning-roadmap tracker: the roadmap/topic/task
//! model, a keyed cache of server data, and an optimistic mutation controller
//! that patches the cache before the server answers and rolls back when it
//! does not.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in the library, each with a stable
//!   [`error::ErrorCode`]; `anyhow::Result` for config loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Cache values** are immutable and replaced wholesale; patch functions
//!   never mutate their input.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod draft;
pub mod error;
pub mod model;
pub mod patch;
pub mod store;
pub mod transport;
pub mod validate;

pub use client::{
    LoadError, MutationError, MutationKind, MutationOutput, MutationPhase, PendingMutation,
    SyncClient,
};
pub use draft::TaskDraft;
pub use store::{CacheKey, CacheStore, CacheValue, QueryState, QueryView};
pub use transport::{Transport, TransportError};
