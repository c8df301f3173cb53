//! Assets and the ownership edges that tie them to entities.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ownable asset. Variants share only the identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default = "Uuid::new_v4")]
    pub asset_id: Uuid,
    pub asset_name: Option<String>,
    pub asset_type: String,
    pub details: AssetDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetDetails {
    RealEstate {
        location: String,
        #[serde(default)]
        market_value: f64,
        #[serde(default)]
        building_size: f64,
    },
    Stock {
        stock_symbol: String,
        #[serde(default)]
        number_of_shares: i64,
        #[serde(default)]
        current_price: f64,
    },
    Ip {
        patent_number: String,
        expiry_date: NaiveDate,
    },
}

impl AssetDetails {
    /// Discriminator stored in the `asset_kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            AssetDetails::RealEstate { .. } => "real_estate",
            AssetDetails::Stock { .. } => "stock",
            AssetDetails::Ip { .. } => "ip",
        }
    }
}

impl Asset {
    pub fn new(asset_type: impl Into<String>, details: AssetDetails) -> Self {
        Self {
            asset_id: Uuid::new_v4(),
            asset_name: None,
            asset_type: asset_type.into(),
            details,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.asset_name = Some(name.into());
        self
    }
}

/// Directed entity -> asset edge carrying the held share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetOwnership {
    pub ownership_id: Uuid,
    pub entity_id: Uuid,
    pub asset_id: Uuid,
    pub ownership_percentage: f32,
}

impl AssetOwnership {
    pub const MAX_PERCENTAGE: f32 = 100.0;

    /// True when the percentage lies in [0, 100]. NaN is rejected.
    pub fn percentage_in_range(percentage: f32) -> bool {
        (0.0..=Self::MAX_PERCENTAGE).contains(&percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind() {
        let house = Asset::new(
            "property",
            AssetDetails::RealEstate {
                location: "Lisbon".to_string(),
                market_value: 450_000.0,
                building_size: 120.5,
            },
        )
        .with_name("Alfama flat");
        assert_eq!(house.details.kind(), "real_estate");
        assert_eq!(house.asset_name.as_deref(), Some("Alfama flat"));
    }

    #[test]
    fn test_percentage_range() {
        assert!(AssetOwnership::percentage_in_range(0.0));
        assert!(AssetOwnership::percentage_in_range(100.0));
        assert!(!AssetOwnership::percentage_in_range(100.5));
        assert!(!AssetOwnership::percentage_in_range(-1.0));
        assert!(!AssetOwnership::percentage_in_range(f32::NAN));
    }

    #[test]
    fn test_deserialize_stock() {
        let asset: Asset = serde_json::from_str(
            r#"{"asset_type": "equity", "details": {"kind": "stock", "stock_symbol": "ACME", "number_of_shares": 10}}"#,
        )
        .unwrap();
        assert_eq!(asset.details.kind(), "stock");
        assert!(asset.asset_name.is_none());
    }
}
