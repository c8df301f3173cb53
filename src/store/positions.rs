//! Persistence for entity display positions.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::Db;
use crate::error::Result;
use crate::model::EntityPosition;
use crate::store::uuid_at;

pub(crate) fn insert_position_tx(conn: &Connection, position: &EntityPosition) -> Result<()> {
    conn.execute(
        "INSERT INTO entity_positions (position_id, entity_id, x, y) VALUES (?1, ?2, ?3, ?4)",
        params![
            position.position_id.to_string(),
            position.entity_id.to_string(),
            position.x as f64,
            position.y as f64,
        ],
    )?;
    Ok(())
}

pub async fn positions_of_entity(db: &Db, entity_id: Uuid) -> Result<Vec<EntityPosition>> {
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT position_id, entity_id, x, y FROM entity_positions \
             WHERE entity_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![entity_id.to_string()], |row| {
            Ok(EntityPosition {
                position_id: uuid_at(row, 0)?,
                entity_id: uuid_at(row, 1)?,
                x: row.get::<_, f64>(2)? as f32,
                y: row.get::<_, f64>(3)? as f32,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
    .await
}
