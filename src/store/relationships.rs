//! Persistence for relationship edges.

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AssetGraphError, Result};
use crate::model::Relationship;
use crate::store::uuid_at;

const RELATIONSHIP_COLUMNS: &str = "relationship_id, relationship_type, role, source_entity_id, \
     target_entity_id, is_bidirectional, additional_metadata, created_at, updated_at, deleted_at, \
     is_under_review";

fn relationship_from_row(row: &Row<'_>) -> rusqlite::Result<Relationship> {
    Ok(Relationship {
        relationship_id: uuid_at(row, 0)?,
        relationship_type: row.get(1)?,
        role: row.get(2)?,
        source_entity_id: uuid_at(row, 3)?,
        target_entity_id: uuid_at(row, 4)?,
        is_bidirectional: row.get(5)?,
        additional_metadata: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
        is_under_review: row.get(10)?,
    })
}

pub(crate) fn fetch_relationship(conn: &Connection, relationship_id: Uuid) -> Result<Option<Relationship>> {
    let sql = format!(
        "SELECT {} FROM relationships WHERE relationship_id = ?1",
        RELATIONSHIP_COLUMNS
    );
    let relationship = conn
        .query_row(&sql, params![relationship_id.to_string()], relationship_from_row)
        .optional()?;
    Ok(relationship)
}

/// Edges where the entity is the source or the target, in insertion order.
pub(crate) fn fetch_touching(conn: &Connection, entity_id: Uuid) -> Result<Vec<Relationship>> {
    fetch_touching_any(conn, &[entity_id])
}

/// Edges where any of the given entities is the source or the target.
///
/// Each matching edge appears once, in insertion order, however many of its
/// endpoints are in `entity_ids`.
pub(crate) fn fetch_touching_any(conn: &Connection, entity_ids: &[Uuid]) -> Result<Vec<Relationship>> {
    if entity_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = entity_ids.iter().map(Uuid::to_string).collect();
    let ids_json = serde_json::to_string(&ids)?;
    let sql = format!(
        "SELECT {} FROM relationships \
         WHERE source_entity_id IN (SELECT value FROM json_each(?1)) \
            OR target_entity_id IN (SELECT value FROM json_each(?1)) \
         ORDER BY rowid",
        RELATIONSHIP_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![ids_json], relationship_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Insert a new edge. The unordered-pair index turns a second edge between the
/// same two entities into `Conflict`.
pub(crate) fn insert_relationship_tx(conn: &Connection, relationship: &Relationship) -> Result<()> {
    let sql = format!(
        "INSERT INTO relationships ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        RELATIONSHIP_COLUMNS
    );
    let inserted = conn.execute(
        &sql,
        params![
            relationship.relationship_id.to_string(),
            relationship.relationship_type,
            relationship.role,
            relationship.source_entity_id.to_string(),
            relationship.target_entity_id.to_string(),
            relationship.is_bidirectional,
            relationship.additional_metadata,
            relationship.created_at,
            relationship.updated_at,
            relationship.deleted_at,
            relationship.is_under_review,
        ],
    );
    match inserted.map_err(AssetGraphError::Database) {
        Ok(_) => Ok(()),
        Err(e) if e.is_unique_violation() => Err(AssetGraphError::Conflict(format!(
            "relationship {} duplicates an existing edge or id",
            relationship.relationship_id
        ))),
        Err(e) => Err(e),
    }
}

/// Overwrite the mutable columns of an existing edge. Endpoints are not written.
pub(crate) fn update_relationship_tx(conn: &Connection, relationship: &Relationship) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE relationships SET
            relationship_type = ?2,
            role = ?3,
            is_bidirectional = ?4,
            additional_metadata = ?5,
            updated_at = ?6,
            deleted_at = ?7,
            is_under_review = ?8
        WHERE relationship_id = ?1
        "#,
        params![
            relationship.relationship_id.to_string(),
            relationship.relationship_type,
            relationship.role,
            relationship.is_bidirectional,
            relationship.additional_metadata,
            relationship.updated_at,
            relationship.deleted_at,
            relationship.is_under_review,
        ],
    )?;
    if changed == 0 {
        return Err(AssetGraphError::NotFound(format!(
            "relationship {}",
            relationship.relationship_id
        )));
    }
    Ok(())
}

pub async fn get_relationship(db: &Db, relationship_id: Uuid) -> Result<Option<Relationship>> {
    db.with_connection(move |conn| fetch_relationship(conn, relationship_id)).await
}

pub async fn relationships_touching(db: &Db, entity_id: Uuid) -> Result<Vec<Relationship>> {
    db.with_connection(move |conn| fetch_touching(conn, entity_id)).await
}

/// Insert a new edge without consulting the direct-edge check.
pub async fn insert_relationship(db: &Db, relationship: &Relationship) -> Result<()> {
    let relationship = relationship.clone();
    db.with_connection(move |conn| insert_relationship_tx(conn, &relationship)).await
}

pub async fn update_relationship(db: &Db, relationship: &Relationship) -> Result<()> {
    let relationship = relationship.clone();
    db.with_connection(move |conn| update_relationship_tx(conn, &relationship)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetEntity;
    use crate::store::entities::insert_entity;
    use crate::store::test_support::migrated_db;

    async fn entities(db: &Db, n: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..n {
            let entity = AssetEntity::legal(format!("Company {}", i), None);
            insert_entity(db, &entity).await.unwrap();
            ids.push(entity.entity_id);
        }
        ids
    }

    #[tokio::test]
    async fn test_insert_and_touching() {
        let (db, _temp) = migrated_db().await;
        let ids = entities(&db, 3).await;
        let ab = Relationship::new(ids[0], ids[1], "owns");
        let cb = Relationship::new(ids[2], ids[1], "manages");
        insert_relationship(&db, &ab).await.unwrap();
        insert_relationship(&db, &cb).await.unwrap();

        let touching_b = relationships_touching(&db, ids[1]).await.unwrap();
        assert_eq!(touching_b.len(), 2);
        assert_eq!(touching_b[0].relationship_id, ab.relationship_id);

        let touching_a = relationships_touching(&db, ids[0]).await.unwrap();
        assert_eq!(touching_a, vec![ab.clone()]);

        let loaded = get_relationship(&db, ab.relationship_id).await.unwrap().unwrap();
        assert_eq!(loaded, ab);
    }

    #[tokio::test]
    async fn test_reverse_edge_rejected_by_pair_index() {
        let (db, _temp) = migrated_db().await;
        let ids = entities(&db, 2).await;
        insert_relationship(&db, &Relationship::new(ids[0], ids[1], "owns"))
            .await
            .unwrap();

        let err = insert_relationship(&db, &Relationship::new(ids[1], ids[0], "owns"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetGraphError::Conflict(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_missing_endpoint_rejected_by_foreign_key() {
        let (db, _temp) = migrated_db().await;
        let ids = entities(&db, 1).await;
        let result = insert_relationship(&db, &Relationship::new(ids[0], Uuid::new_v4(), "owns")).await;
        assert!(matches!(result, Err(AssetGraphError::Database(_))));
    }

    #[tokio::test]
    async fn test_update_missing_relationship() {
        let (db, _temp) = migrated_db().await;
        let ids = entities(&db, 2).await;
        let err = update_relationship(&db, &Relationship::new(ids[0], ids[1], "owns"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetGraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_touching_any_returns_shared_edge_once() {
        let (db, _temp) = migrated_db().await;
        let ids = entities(&db, 2).await;
        insert_relationship(&db, &Relationship::new(ids[0], ids[1], "owns"))
            .await
            .unwrap();
        let ids_clone = ids.clone();
        let edges = db
            .with_connection(move |conn| fetch_touching_any(conn, &ids_clone))
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_entity_cascades_edges() {
        let (db, _temp) = migrated_db().await;
        let ids = entities(&db, 2).await;
        let edge = Relationship::new(ids[0], ids[1], "owns");
        insert_relationship(&db, &edge).await.unwrap();

        crate::store::entities::delete_entity(&db, ids[0]).await.unwrap();
        assert!(get_relationship(&db, edge.relationship_id).await.unwrap().is_none());
        assert!(relationships_touching(&db, ids[1]).await.unwrap().is_empty());
    }
}
