//! Directed relationship edges between asset entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_bidirectional() -> bool {
    true
}

/// A directed edge (source --relationship_type--> target) between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Upsert key: an unknown id creates, a known id updates.
    #[serde(default = "Uuid::new_v4")]
    pub relationship_id: Uuid,
    /// Label such as `director_of` or `shareholder_of`.
    pub relationship_type: String,
    pub role: Option<String>,
    pub source_entity_id: Uuid,
    pub target_entity_id: Uuid,
    #[serde(default = "default_bidirectional")]
    pub is_bidirectional: bool,
    /// Free-form caller metadata, stored verbatim.
    pub additional_metadata: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_under_review: bool,
}

impl Relationship {
    pub fn new(source_entity_id: Uuid, target_entity_id: Uuid, relationship_type: impl Into<String>) -> Self {
        Self {
            relationship_id: Uuid::new_v4(),
            relationship_type: relationship_type.into(),
            role: None,
            source_entity_id,
            target_entity_id,
            is_bidirectional: default_bidirectional(),
            additional_metadata: None,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
            is_under_review: false,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// True if the entity is the source or the target of this edge.
    pub fn touches(&self, entity_id: Uuid) -> bool {
        self.source_entity_id == entity_id || self.target_entity_id == entity_id
    }

    /// Copy the caller-mutable fields from `incoming` and stamp `updated_at`.
    /// Endpoints, identity and creation time are never changed.
    pub fn apply_update(&mut self, incoming: &Relationship) {
        self.relationship_type = incoming.relationship_type.clone();
        self.role = incoming.role.clone();
        self.is_bidirectional = incoming.is_bidirectional;
        self.additional_metadata = incoming.additional_metadata.clone();
        self.updated_at = Some(Utc::now());
    }
}
