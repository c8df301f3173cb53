//! Breadth-limited traversal over relationship edges.

use std::collections::HashSet;

use uuid::Uuid;

use crate::db::Db;
use crate::error::Result;
use crate::model::Relationship;
use crate::store::relationships::fetch_touching_any;

/// Collect the edges reachable from `start_id` within `depth` rounds.
///
/// Round 0 frontier is `{start_id}`. Each round fetches every edge whose source or
/// target is in the frontier, appends them to the result, and moves the frontier to
/// the distinct *targets* of those edges. Stops after `depth` rounds or on an empty
/// frontier. Edges are not de-duplicated across rounds: an edge seen from both
/// sides appears once per round it is fetched in, so multiplicity acts as a visit
/// count. No visited set is kept; cost is bounded by `depth` alone.
pub async fn traverse(db: &Db, start_id: Uuid, depth: usize) -> Result<Vec<Relationship>> {
    let mut result = Vec::new();
    let mut frontier = vec![start_id];

    for round in 0..depth {
        if frontier.is_empty() {
            break;
        }

        let round_ids = frontier.clone();
        let edges = db
            .with_connection(move |conn| fetch_touching_any(conn, &round_ids))
            .await?;

        log::debug!(
            "traverse {}: round {} frontier={} edges={}",
            start_id,
            round,
            frontier.len(),
            edges.len()
        );

        frontier = next_frontier(&edges);
        result.extend(edges);
    }

    Ok(result)
}

/// Distinct target endpoints, in first-seen order.
fn next_frontier(edges: &[Relationship]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    edges
        .iter()
        .map(|r| r.target_entity_id)
        .filter(|id| seen.insert(*id))
        .collect()
}
