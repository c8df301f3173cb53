//! Direct-edge admission check for new relationships.
//!
//! This is one-hop adjacency detection: a new edge S -> T is refused when S and T
//! already share any edge, in either direction. Longer cycles (A -> B -> C -> A)
//! are admitted.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::Db;
use crate::error::Result;
use crate::model::Relationship;
use crate::store::relationships::fetch_touching;

/// True if any edge touching `source_id` has `target_id` as an endpoint.
pub fn has_direct_edge(edges_touching_source: &[Relationship], source_id: Uuid, target_id: Uuid) -> bool {
    edges_touching_source
        .iter()
        .filter(|r| r.touches(source_id))
        .any(|r| r.target_entity_id == target_id || r.source_entity_id == target_id)
}

pub(crate) fn check_direct_cycle_tx(conn: &Connection, source_id: Uuid, target_id: Uuid) -> Result<bool> {
    let edges = fetch_touching(conn, source_id)?;
    Ok(has_direct_edge(&edges, source_id, target_id))
}

/// Check whether `source_id` and `target_id` already share a direct edge.
///
/// Read-only; for an atomic check-and-insert use
/// [`AssetGraph::upsert_relationship`](crate::service::AssetGraph::upsert_relationship).
pub async fn check_direct_cycle(db: &Db, source_id: Uuid, target_id: Uuid) -> Result<bool> {
    db.with_connection(move |conn| check_direct_cycle_tx(conn, source_id, target_id))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetEntity;
    use crate::store::entities::insert_entity;
    use crate::store::relationships::insert_relationship;
    use crate::store::test_support::migrated_db;

    #[test]
    fn test_has_direct_edge_either_direction() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![Relationship::new(a, b, "owns")];

        assert!(has_direct_edge(&edges, a, b));
        assert!(has_direct_edge(&edges, b, a));
        assert!(!has_direct_edge(&edges, a, c));
        assert!(!has_direct_edge(&[], a, b));
    }

    #[test]
    fn test_self_loop_refused_once_entity_has_any_edge() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let edges = vec![Relationship::new(a, b, "owns")];
        assert!(has_direct_edge(&edges, a, a));
    }

    #[tokio::test]
    async fn test_check_is_one_hop_only() {
        let (db, _temp) = migrated_db().await;
        let mut ids = Vec::new();
        for name in ["A", "B", "C"] {
            let e = AssetEntity::legal(name, None);
            insert_entity(&db, &e).await.unwrap();
            ids.push(e.entity_id);
        }
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        insert_relationship(&db, &Relationship::new(a, b, "owns")).await.unwrap();
        insert_relationship(&db, &Relationship::new(b, c, "owns")).await.unwrap();

        assert!(check_direct_cycle(&db, b, a).await.unwrap());
        assert!(check_direct_cycle(&db, a, b).await.unwrap());
        // c -> a closes a three-cycle but shares no direct edge with a.
        assert!(!check_direct_cycle(&db, c, a).await.unwrap());
        assert!(!check_direct_cycle(&db, Uuid::new_v4(), a).await.unwrap());
    }
}
