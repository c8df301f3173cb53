//! Asset entities: legal and natural persons that own assets and take part in relationships.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_entity_type() -> String {
    "Unknown".to_string()
}

/// A legal or natural person (or an unspecialised base entity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntity {
    #[serde(default = "Uuid::new_v4")]
    pub entity_id: Uuid,
    pub entity_reference: Option<String>,
    pub preferred_language: Option<String>,
    /// Free label, conventionally `legal` or `natural`.
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
    pub risk_level: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub profile: EntityProfile,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Reserved for soft deletion; deletes are currently hard.
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_under_review: bool,
}

/// Variant data of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityProfile {
    #[default]
    Base,
    Legal(LegalProfile),
    Natural(NaturalProfile),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalProfile {
    pub legal_name: String,
    pub trade_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaturalProfile {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
}

impl EntityProfile {
    /// Discriminator stored in the `entity_kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            EntityProfile::Base => "base",
            EntityProfile::Legal(_) => "legal",
            EntityProfile::Natural(_) => "natural",
        }
    }

    /// Only legal and natural persons hold asset ownerships.
    pub fn can_own_assets(&self) -> bool {
        !matches!(self, EntityProfile::Base)
    }
}

impl AssetEntity {
    fn with_profile(entity_type: &str, profile: EntityProfile) -> Self {
        Self {
            entity_id: Uuid::new_v4(),
            entity_reference: None,
            preferred_language: None,
            entity_type: entity_type.to_string(),
            risk_level: None,
            tags: None,
            profile,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
            is_under_review: false,
        }
    }

    /// Unspecialised entity with the given type label.
    pub fn base(entity_type: &str) -> Self {
        Self::with_profile(entity_type, EntityProfile::Base)
    }

    pub fn legal(legal_name: impl Into<String>, trade_name: Option<String>) -> Self {
        Self::with_profile(
            "legal",
            EntityProfile::Legal(LegalProfile {
                legal_name: legal_name.into(),
                trade_name,
            }),
        )
    }

    pub fn natural(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: Option<NaiveDate>,
    ) -> Self {
        Self::with_profile(
            "natural",
            EntityProfile::Natural(NaturalProfile {
                first_name: first_name.into(),
                last_name: last_name.into(),
                date_of_birth,
            }),
        )
    }

    /// Human-readable name: legal name, "first last", or the reference for base entities.
    pub fn display_name(&self) -> String {
        match &self.profile {
            EntityProfile::Legal(p) => p.legal_name.clone(),
            EntityProfile::Natural(p) => format!("{} {}", p.first_name, p.last_name),
            EntityProfile::Base => self
                .entity_reference
                .clone()
                .unwrap_or_else(|| self.entity_id.to_string()),
        }
    }

    /// Overwrite the mutable descriptive fields and stamp `updated_at`.
    /// Identity, creation time and profile are left alone.
    pub fn apply_patch(&mut self, patch: EntityPatch) {
        self.entity_reference = patch.entity_reference;
        self.preferred_language = patch.preferred_language;
        self.entity_type = patch.entity_type;
        self.risk_level = patch.risk_level;
        self.tags = patch.tags;
        self.is_under_review = patch.is_under_review;
        self.updated_at = Some(Utc::now());
    }
}

/// Replacement values for the patchable fields of an entity.
///
/// Absent optional fields clear the stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPatch {
    pub entity_reference: Option<String>,
    pub preferred_language: Option<String>,
    #[serde(default = "default_entity_type")]
    pub entity_type: String,
    pub risk_level: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_under_review: bool,
}

/// Display coordinates of an entity on a canvas. Opaque to graph logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPosition {
    pub position_id: Uuid,
    pub entity_id: Uuid,
    pub x: f32,
    pub y: f32,
}
