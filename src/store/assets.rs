//! Persistence for assets and asset ownerships.

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AssetGraphError, Result};
use crate::model::{Asset, AssetDetails, AssetOwnership};
use crate::store::{missing_column, uuid_at};

const ASSET_COLUMNS: &str = "asset_id, asset_name, asset_type, asset_kind, location, market_value, \
     building_size, stock_symbol, number_of_shares, current_price, patent_number, expiry_date";

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let kind: String = row.get(3)?;
    let details = match kind.as_str() {
        "real_estate" => AssetDetails::RealEstate {
            location: row
                .get::<_, Option<String>>(4)?
                .ok_or_else(|| missing_column(4, "real_estate"))?,
            market_value: row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
            building_size: row.get::<_, Option<f64>>(6)?.unwrap_or_default(),
        },
        "stock" => AssetDetails::Stock {
            stock_symbol: row
                .get::<_, Option<String>>(7)?
                .ok_or_else(|| missing_column(7, "stock"))?,
            number_of_shares: row.get::<_, Option<i64>>(8)?.unwrap_or_default(),
            current_price: row.get::<_, Option<f64>>(9)?.unwrap_or_default(),
        },
        "ip" => AssetDetails::Ip {
            patent_number: row
                .get::<_, Option<String>>(10)?
                .ok_or_else(|| missing_column(10, "ip"))?,
            expiry_date: row
                .get::<_, Option<chrono::NaiveDate>>(11)?
                .ok_or_else(|| missing_column(11, "ip"))?,
        },
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown asset kind '{}'", other).into(),
            ))
        }
    };

    Ok(Asset {
        asset_id: uuid_at(row, 0)?,
        asset_name: row.get(1)?,
        asset_type: row.get(2)?,
        details,
    })
}

fn ownership_from_row(row: &Row<'_>) -> rusqlite::Result<AssetOwnership> {
    Ok(AssetOwnership {
        ownership_id: uuid_at(row, 0)?,
        entity_id: uuid_at(row, 1)?,
        asset_id: uuid_at(row, 2)?,
        ownership_percentage: row.get::<_, f64>(3)? as f32,
    })
}

pub(crate) fn asset_exists(conn: &Connection, asset_id: Uuid) -> Result<bool> {
    let exists = conn
        .prepare("SELECT 1 FROM assets WHERE asset_id = ?1")?
        .exists(params![asset_id.to_string()])?;
    Ok(exists)
}

pub async fn list_assets(db: &Db) -> Result<Vec<Asset>> {
    db.with_connection(|conn| {
        let sql = format!("SELECT {} FROM assets ORDER BY rowid", ASSET_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], asset_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
    .await
}

pub async fn get_asset(db: &Db, asset_id: Uuid) -> Result<Option<Asset>> {
    db.with_connection(move |conn| {
        let sql = format!("SELECT {} FROM assets WHERE asset_id = ?1", ASSET_COLUMNS);
        let asset = conn
            .query_row(&sql, params![asset_id.to_string()], asset_from_row)
            .optional()?;
        Ok(asset)
    })
    .await
}

/// Insert a new asset. Fails with `Conflict` if the id is already taken.
pub async fn insert_asset(db: &Db, asset: &Asset) -> Result<()> {
    let asset = asset.clone();
    db.with_connection(move |conn| {
        let mut location = None;
        let mut market_value = None;
        let mut building_size = None;
        let mut stock_symbol = None;
        let mut number_of_shares = None;
        let mut current_price = None;
        let mut patent_number = None;
        let mut expiry_date = None;
        match &asset.details {
            AssetDetails::RealEstate { location: l, market_value: v, building_size: s } => {
                location = Some(l.as_str());
                market_value = Some(*v);
                building_size = Some(*s);
            }
            AssetDetails::Stock { stock_symbol: sym, number_of_shares: n, current_price: p } => {
                stock_symbol = Some(sym.as_str());
                number_of_shares = Some(*n);
                current_price = Some(*p);
            }
            AssetDetails::Ip { patent_number: pn, expiry_date: exp } => {
                patent_number = Some(pn.as_str());
                expiry_date = Some(*exp);
            }
        }

        let sql = format!(
            "INSERT INTO assets ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            ASSET_COLUMNS
        );
        let inserted = conn.execute(
            &sql,
            params![
                asset.asset_id.to_string(),
                asset.asset_name,
                asset.asset_type,
                asset.details.kind(),
                location,
                market_value,
                building_size,
                stock_symbol,
                number_of_shares,
                current_price,
                patent_number,
                expiry_date,
            ],
        );
        match inserted.map_err(AssetGraphError::Database) {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => Err(AssetGraphError::Conflict(format!(
                "asset {} already exists",
                asset.asset_id
            ))),
            Err(e) => Err(e),
        }
    })
    .await
}

/// Hard-delete an asset and its ownerships. Returns false if it did not exist.
pub async fn delete_asset(db: &Db, asset_id: Uuid) -> Result<bool> {
    db.with_connection(move |conn| {
        let removed = conn.execute(
            "DELETE FROM assets WHERE asset_id = ?1",
            params![asset_id.to_string()],
        )?;
        Ok(removed > 0)
    })
    .await
}

pub(crate) fn insert_ownership_tx(conn: &Connection, ownership: &AssetOwnership) -> Result<()> {
    conn.execute(
        "INSERT INTO asset_ownerships (ownership_id, entity_id, asset_id, ownership_percentage) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            ownership.ownership_id.to_string(),
            ownership.entity_id.to_string(),
            ownership.asset_id.to_string(),
            ownership.ownership_percentage as f64,
        ],
    )?;
    Ok(())
}

async fn ownerships_where(db: &Db, column: &'static str, id: Uuid) -> Result<Vec<AssetOwnership>> {
    db.with_connection(move |conn| {
        let sql = format!(
            "SELECT ownership_id, entity_id, asset_id, ownership_percentage \
             FROM asset_ownerships WHERE {} = ?1 ORDER BY rowid",
            column
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id.to_string()], ownership_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
    .await
}

pub async fn ownerships_of_entity(db: &Db, entity_id: Uuid) -> Result<Vec<AssetOwnership>> {
    ownerships_where(db, "entity_id", entity_id).await
}

pub async fn owners_of_asset(db: &Db, asset_id: Uuid) -> Result<Vec<AssetOwnership>> {
    ownerships_where(db, "asset_id", asset_id).await
}
