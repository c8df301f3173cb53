//! Entity/relationship lifecycle manager.
//!
//! [`AssetGraph`] is the transport-independent surface of the crate: it decides
//! create-versus-update for relationships, applies entity patches, and delegates
//! persistence to the store and graph modules. It holds only a [`Db`] handle and
//! is cheap to clone per request.

use chrono::Utc;
use rusqlite::TransactionBehavior;
use serde::Serialize;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AssetGraphError, Result};
use crate::graph::{check_direct_cycle_tx, traverse};
use crate::model::{
    Asset, AssetEntity, AssetOwnership, EntityPatch, EntityPosition, Relationship,
};
use crate::store::{assets, entities, positions, relationships};

/// Message carried by the conflict raised when a new edge duplicates a direct edge.
pub const DIRECT_EDGE_CONFLICT: &str = "direct relationship already exists between these entities";

/// Which branch an upsert took.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "relationship", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created(Relationship),
    Updated(Relationship),
}

impl UpsertOutcome {
    pub fn into_relationship(self) -> Relationship {
        match self {
            UpsertOutcome::Created(r) | UpsertOutcome::Updated(r) => r,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

#[derive(Debug, Clone)]
pub struct AssetGraph {
    db: Db,
}

impl AssetGraph {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_entities(&self) -> Result<Vec<AssetEntity>> {
        entities::list_entities(&self.db).await
    }

    pub async fn get_entity(&self, entity_id: Uuid) -> Result<Option<AssetEntity>> {
        entities::get_entity(&self.db, entity_id).await
    }

    /// Persist a new entity. Audit timestamps are assigned here; the id is kept.
    pub async fn create_entity(&self, mut entity: AssetEntity) -> Result<AssetEntity> {
        entity.created_at = Utc::now();
        entity.updated_at = None;
        entity.deleted_at = None;
        entities::insert_entity(&self.db, &entity).await?;
        log::info!(
            "Created {} entity {} ({})",
            entity.profile.kind(),
            entity.entity_id,
            entity.display_name()
        );
        Ok(entity)
    }

    /// Overwrite the patchable fields of an entity.
    ///
    /// Returns `false`, without creating anything, when the entity does not exist
    /// (including when it is deleted between the read and the write).
    pub async fn patch_entity(&self, entity_id: Uuid, patch: EntityPatch) -> Result<bool> {
        let Some(mut entity) = entities::get_entity(&self.db, entity_id).await? else {
            log::debug!("Patch skipped: entity {} not found", entity_id);
            return Ok(false);
        };
        entity.apply_patch(patch);
        match entities::update_entity(&self.db, &entity).await {
            Ok(()) => Ok(true),
            Err(AssetGraphError::NotFound(_)) => {
                log::debug!("Patch skipped: entity {} deleted concurrently", entity_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Hard-delete an entity. Deleting an absent entity succeeds.
    pub async fn delete_entity(&self, entity_id: Uuid) -> Result<()> {
        if entities::delete_entity(&self.db, entity_id).await? {
            log::info!("Deleted entity {}", entity_id);
        } else {
            log::debug!("Delete of absent entity {} ignored", entity_id);
        }
        Ok(())
    }

    pub async fn relationships_touching(&self, entity_id: Uuid) -> Result<Vec<Relationship>> {
        relationships::relationships_touching(&self.db, entity_id).await
    }

    pub async fn traverse_relationships(&self, entity_id: Uuid, depth: usize) -> Result<Vec<Relationship>> {
        traverse(&self.db, entity_id, depth).await
    }

    pub async fn get_relationship(&self, relationship_id: Uuid) -> Result<Option<Relationship>> {
        relationships::get_relationship(&self.db, relationship_id).await
    }

    /// Create or update a relationship keyed by `relationship_id`.
    ///
    /// Unknown id: both endpoints must exist and must not already share a direct
    /// edge, otherwise `NotFound` / `Conflict`. The read, the check and the insert
    /// run in one `BEGIN IMMEDIATE` transaction, so concurrent creators of the same
    /// pair are serialised and exactly one wins.
    ///
    /// Known id: type, role, bidirectionality and metadata are overwritten and
    /// `updated_at` is refreshed. Endpoints are kept and the check is not re-run.
    pub async fn upsert_relationship(&self, relationship: Relationship) -> Result<UpsertOutcome> {
        let mut incoming = relationship;
        let outcome = self
            .db
            .with_connection(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let outcome = match relationships::fetch_relationship(&tx, incoming.relationship_id)? {
                    Some(mut existing) => {
                        existing.apply_update(&incoming);
                        relationships::update_relationship_tx(&tx, &existing)?;
                        UpsertOutcome::Updated(existing)
                    }
                    None => {
                        for endpoint in [incoming.source_entity_id, incoming.target_entity_id] {
                            if !entities::entity_exists(&tx, endpoint)? {
                                return Err(AssetGraphError::NotFound(format!("entity {}", endpoint)));
                            }
                        }
                        if check_direct_cycle_tx(&tx, incoming.source_entity_id, incoming.target_entity_id)? {
                            return Err(AssetGraphError::Conflict(DIRECT_EDGE_CONFLICT.to_string()));
                        }
                        incoming.created_at = Utc::now();
                        incoming.updated_at = None;
                        incoming.deleted_at = None;
                        relationships::insert_relationship_tx(&tx, &incoming)?;
                        UpsertOutcome::Created(incoming)
                    }
                };

                tx.commit()?;
                Ok(outcome)
            })
            .await;

        match &outcome {
            Ok(UpsertOutcome::Created(r)) => log::info!(
                "Created relationship {} ({} -[{}]-> {})",
                r.relationship_id,
                r.source_entity_id,
                r.relationship_type,
                r.target_entity_id
            ),
            Ok(UpsertOutcome::Updated(r)) => log::info!("Updated relationship {}", r.relationship_id),
            Err(AssetGraphError::Conflict(msg)) => log::warn!("Relationship refused: {}", msg),
            Err(_) => {}
        }
        outcome
    }

    pub async fn list_assets(&self) -> Result<Vec<Asset>> {
        assets::list_assets(&self.db).await
    }

    pub async fn get_asset(&self, asset_id: Uuid) -> Result<Option<Asset>> {
        assets::get_asset(&self.db, asset_id).await
    }

    pub async fn create_asset(&self, asset: Asset) -> Result<Asset> {
        assets::insert_asset(&self.db, &asset).await?;
        log::info!("Created {} asset {}", asset.details.kind(), asset.asset_id);
        Ok(asset)
    }

    /// Hard-delete an asset and its ownerships. Deleting an absent asset succeeds.
    pub async fn delete_asset(&self, asset_id: Uuid) -> Result<()> {
        if !assets::delete_asset(&self.db, asset_id).await? {
            log::debug!("Delete of absent asset {} ignored", asset_id);
        }
        Ok(())
    }

    /// Record that an entity holds `percentage` of an asset.
    ///
    /// The percentage must lie in [0, 100] and the entity must be a legal or
    /// natural person.
    pub async fn record_ownership(
        &self,
        entity_id: Uuid,
        asset_id: Uuid,
        percentage: f32,
    ) -> Result<AssetOwnership> {
        if !AssetOwnership::percentage_in_range(percentage) {
            return Err(AssetGraphError::Validation(format!(
                "ownership percentage {} outside [0, {}]",
                percentage,
                AssetOwnership::MAX_PERCENTAGE
            )));
        }
        let ownership = AssetOwnership {
            ownership_id: Uuid::new_v4(),
            entity_id,
            asset_id,
            ownership_percentage: percentage,
        };
        let record = ownership.clone();
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let entity = entities::fetch_entity(&tx, record.entity_id)?
                    .ok_or_else(|| AssetGraphError::NotFound(format!("entity {}", record.entity_id)))?;
                if !entity.profile.can_own_assets() {
                    return Err(AssetGraphError::Validation(format!(
                        "entity {} is not a legal or natural person and cannot own assets",
                        record.entity_id
                    )));
                }
                if !assets::asset_exists(&tx, record.asset_id)? {
                    return Err(AssetGraphError::NotFound(format!("asset {}", record.asset_id)));
                }
                assets::insert_ownership_tx(&tx, &record)?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(ownership)
    }

    pub async fn ownerships_of_entity(&self, entity_id: Uuid) -> Result<Vec<AssetOwnership>> {
        assets::ownerships_of_entity(&self.db, entity_id).await
    }

    pub async fn owners_of_asset(&self, asset_id: Uuid) -> Result<Vec<AssetOwnership>> {
        assets::owners_of_asset(&self.db, asset_id).await
    }

    pub async fn add_position(&self, entity_id: Uuid, x: f32, y: f32) -> Result<EntityPosition> {
        let position = EntityPosition {
            position_id: Uuid::new_v4(),
            entity_id,
            x,
            y,
        };
        let record = position.clone();
        self.db
            .with_connection(move |conn| {
                if !entities::entity_exists(conn, record.entity_id)? {
                    return Err(AssetGraphError::NotFound(format!("entity {}", record.entity_id)));
                }
                positions::insert_position_tx(conn, &record)
            })
            .await?;
        Ok(position)
    }

    pub async fn positions_of_entity(&self, entity_id: Uuid) -> Result<Vec<EntityPosition>> {
        positions::positions_of_entity(&self.db, entity_id).await
    }
}
