pub mod config;
pub mod error;
pub mod db;
pub mod model;
pub mod store;
pub mod graph;
pub mod service;
pub mod api;

pub use config::Config;
pub use error::{AssetGraphError, Result};
pub use graph::{check_direct_cycle, has_direct_edge, traverse};
pub use model::{Asset, AssetEntity, AssetOwnership, EntityPatch, Relationship};
pub use service::{AssetGraph, UpsertOutcome};
