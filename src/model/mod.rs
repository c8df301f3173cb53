//! Domain records: entities, assets, ownerships, positions and relationship edges.

mod asset;
mod entity;
mod relationship;

pub use asset::{Asset, AssetDetails, AssetOwnership};
pub use entity::{AssetEntity, EntityPatch, EntityPosition, EntityProfile, LegalProfile, NaturalProfile};
pub use relationship::Relationship;
