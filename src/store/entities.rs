//! Persistence for asset entities (base, legal and natural persons share one table).

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AssetGraphError, Result};
use crate::model::{AssetEntity, EntityProfile, LegalProfile, NaturalProfile};
use crate::store::{json_at, missing_column, uuid_at};

const ENTITY_COLUMNS: &str = "entity_id, entity_reference, preferred_language, entity_type, risk_level, \
     tags_json, entity_kind, legal_name, trade_name, first_name, last_name, date_of_birth, \
     created_at, updated_at, deleted_at, is_under_review";

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<AssetEntity> {
    let kind: String = row.get(6)?;
    let profile = match kind.as_str() {
        "legal" => EntityProfile::Legal(LegalProfile {
            legal_name: row
                .get::<_, Option<String>>(7)?
                .ok_or_else(|| missing_column(7, "legal"))?,
            trade_name: row.get(8)?,
        }),
        "natural" => EntityProfile::Natural(NaturalProfile {
            first_name: row
                .get::<_, Option<String>>(9)?
                .ok_or_else(|| missing_column(9, "natural"))?,
            last_name: row
                .get::<_, Option<String>>(10)?
                .ok_or_else(|| missing_column(10, "natural"))?,
            date_of_birth: row.get(11)?,
        }),
        _ => EntityProfile::Base,
    };

    Ok(AssetEntity {
        entity_id: uuid_at(row, 0)?,
        entity_reference: row.get(1)?,
        preferred_language: row.get(2)?,
        entity_type: row.get(3)?,
        risk_level: row.get(4)?,
        tags: json_at(row, 5)?,
        profile,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        deleted_at: row.get(14)?,
        is_under_review: row.get(15)?,
    })
}

/// Variant columns: (legal_name, trade_name, first_name, last_name, date_of_birth).
type ProfileColumns<'a> = (
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<NaiveDate>,
);

fn profile_columns(profile: &EntityProfile) -> ProfileColumns<'_> {
    match profile {
        EntityProfile::Base => (None, None, None, None, None),
        EntityProfile::Legal(p) => (Some(p.legal_name.as_str()), p.trade_name.as_deref(), None, None, None),
        EntityProfile::Natural(p) => (
            None,
            None,
            Some(p.first_name.as_str()),
            Some(p.last_name.as_str()),
            p.date_of_birth,
        ),
    }
}

fn tags_json(entity: &AssetEntity) -> Result<Option<String>> {
    entity
        .tags
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(AssetGraphError::Serialization)
}

pub(crate) fn fetch_entity(conn: &Connection, entity_id: Uuid) -> Result<Option<AssetEntity>> {
    let sql = format!("SELECT {} FROM asset_entities WHERE entity_id = ?1", ENTITY_COLUMNS);
    let entity = conn
        .query_row(&sql, params![entity_id.to_string()], entity_from_row)
        .optional()?;
    Ok(entity)
}

pub(crate) fn entity_exists(conn: &Connection, entity_id: Uuid) -> Result<bool> {
    let exists = conn
        .prepare("SELECT 1 FROM asset_entities WHERE entity_id = ?1")?
        .exists(params![entity_id.to_string()])?;
    Ok(exists)
}

/// All entities, in insertion order.
pub async fn list_entities(db: &Db) -> Result<Vec<AssetEntity>> {
    db.with_connection(|conn| {
        let sql = format!("SELECT {} FROM asset_entities ORDER BY rowid", ENTITY_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], entity_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
    .await
}

pub async fn get_entity(db: &Db, entity_id: Uuid) -> Result<Option<AssetEntity>> {
    db.with_connection(move |conn| fetch_entity(conn, entity_id)).await
}

/// Insert a new entity. Fails with `Conflict` if the id is already taken.
pub async fn insert_entity(db: &Db, entity: &AssetEntity) -> Result<()> {
    let entity = entity.clone();
    db.with_connection(move |conn| {
        let tags = tags_json(&entity)?;
        let (legal_name, trade_name, first_name, last_name, date_of_birth) =
            profile_columns(&entity.profile);
        let sql = format!(
            "INSERT INTO asset_entities ({}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            ENTITY_COLUMNS
        );
        let inserted = conn.execute(
            &sql,
            params![
                entity.entity_id.to_string(),
                entity.entity_reference,
                entity.preferred_language,
                entity.entity_type,
                entity.risk_level,
                tags,
                entity.profile.kind(),
                legal_name,
                trade_name,
                first_name,
                last_name,
                date_of_birth,
                entity.created_at,
                entity.updated_at,
                entity.deleted_at,
                entity.is_under_review,
            ],
        );
        match inserted.map_err(AssetGraphError::Database) {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => Err(AssetGraphError::Conflict(format!(
                "entity {} already exists",
                entity.entity_id
            ))),
            Err(e) => Err(e),
        }
    })
    .await
}

/// Replace the stored fields of an existing entity. Fails with `NotFound` if absent.
pub async fn update_entity(db: &Db, entity: &AssetEntity) -> Result<()> {
    let entity = entity.clone();
    db.with_connection(move |conn| {
        let tags = tags_json(&entity)?;
        let (legal_name, trade_name, first_name, last_name, date_of_birth) =
            profile_columns(&entity.profile);
        let changed = conn.execute(
            r#"
            UPDATE asset_entities SET
                entity_reference = ?2,
                preferred_language = ?3,
                entity_type = ?4,
                risk_level = ?5,
                tags_json = ?6,
                entity_kind = ?7,
                legal_name = ?8,
                trade_name = ?9,
                first_name = ?10,
                last_name = ?11,
                date_of_birth = ?12,
                updated_at = ?13,
                deleted_at = ?14,
                is_under_review = ?15
            WHERE entity_id = ?1
            "#,
            params![
                entity.entity_id.to_string(),
                entity.entity_reference,
                entity.preferred_language,
                entity.entity_type,
                entity.risk_level,
                tags,
                entity.profile.kind(),
                legal_name,
                trade_name,
                first_name,
                last_name,
                date_of_birth,
                entity.updated_at,
                entity.deleted_at,
                entity.is_under_review,
            ],
        )?;
        if changed == 0 {
            return Err(AssetGraphError::NotFound(format!("entity {}", entity.entity_id)));
        }
        Ok(())
    })
    .await
}

/// Hard-delete an entity; its edges, ownerships and positions cascade.
/// Returns false when there was nothing to delete.
pub async fn delete_entity(db: &Db, entity_id: Uuid) -> Result<bool> {
    db.with_connection(move |conn| {
        let removed = conn.execute(
            "DELETE FROM asset_entities WHERE entity_id = ?1",
            params![entity_id.to_string()],
        )?;
        Ok(removed > 0)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::migrated_db;
    use chrono::Utc;

    #[tokio::test]
    async fn test_insert_and_get_natural() {
        let (db, _temp) = migrated_db().await;
        let mut entity = AssetEntity::natural(
            "Ada",
            "Lovelace",
            NaiveDate::from_ymd_opt(1815, 12, 10),
        );
        entity.tags = Some(vec!["founder".to_string(), "pep".to_string()]);
        entity.preferred_language = Some("en".to_string());

        insert_entity(&db, &entity).await.unwrap();
        let loaded = get_entity(&db, entity.entity_id).await.unwrap().unwrap();

        assert_eq!(loaded.entity_id, entity.entity_id);
        assert_eq!(loaded.profile, entity.profile);
        assert_eq!(loaded.tags, entity.tags);
        assert_eq!(loaded.preferred_language.as_deref(), Some("en"));
        assert_eq!(loaded.created_at, entity.created_at);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_conflicts() {
        let (db, _temp) = migrated_db().await;
        let entity = AssetEntity::legal("Acme Holdings", None);
        insert_entity(&db, &entity).await.unwrap();

        let err = insert_entity(&db, &entity).await.unwrap_err();
        assert!(matches!(err, AssetGraphError::Conflict(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (db, _temp) = migrated_db().await;
        let entity = AssetEntity::base("Unknown");
        let err = update_entity(&db, &entity).await.unwrap_err();
        assert!(matches!(err, AssetGraphError::NotFound(_)));
        assert!(get_entity(&db, entity.entity_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let (db, _temp) = migrated_db().await;
        let mut entity = AssetEntity::legal("Acme Holdings", None);
        insert_entity(&db, &entity).await.unwrap();

        entity.risk_level = Some("medium".to_string());
        entity.updated_at = Some(Utc::now());
        update_entity(&db, &entity).await.unwrap();

        let loaded = get_entity(&db, entity.entity_id).await.unwrap().unwrap();
        assert_eq!(loaded.risk_level.as_deref(), Some("medium"));
        assert_eq!(loaded.updated_at, entity.updated_at);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (db, _temp) = migrated_db().await;
        let a = AssetEntity::legal("Acme Holdings", None);
        let b = AssetEntity::base("Unknown");
        insert_entity(&db, &a).await.unwrap();
        insert_entity(&db, &b).await.unwrap();

        let all = list_entities(&db).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entity_id, a.entity_id);

        assert!(delete_entity(&db, a.entity_id).await.unwrap());
        assert!(!delete_entity(&db, a.entity_id).await.unwrap());
        assert_eq!(list_entities(&db).await.unwrap().len(), 1);
    }
}
