//! Movement kinds and the immutable movement record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storekeeper_core::{ActorId, DomainError, VariantId};

use crate::product::{ProductId, StockAdjusted};

/// Classification of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    ManualAdjustment,
    Sale,
    Return,
    Restock,
    Correction,
}

impl MovementKind {
    /// Corrections are authoritative recounts and may record stock going
    /// negative; every other kind is floored at zero.
    pub fn allows_negative_stock(&self) -> bool {
        matches!(self, MovementKind::Correction)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::ManualAdjustment => "manual_adjustment",
            MovementKind::Sale => "sale",
            MovementKind::Return => "return",
            MovementKind::Restock => "restock",
            MovementKind::Correction => "correction",
        }
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual_adjustment" => Ok(MovementKind::ManualAdjustment),
            "sale" => Ok(MovementKind::Sale),
            "return" => Ok(MovementKind::Return),
            "restock" => Ok(MovementKind::Restock),
            "correction" => Ok(MovementKind::Correction),
            other => Err(DomainError::validation(format!(
                "unknown movement kind '{other}'"
            ))),
        }
    }
}

/// One atomic, signed change to a product's stock, permanently recorded.
///
/// A movement is never edited or deleted; corrections are new movements. The
/// record is plain data so any transport can carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    /// Assigned at append time (UUIDv7, time-ordered).
    pub id: Uuid,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Signed, non-zero.
    pub change_amount: i64,
    /// Stock immediately after this movement applied. Stored redundantly so
    /// history can be audited without replaying from scratch.
    pub new_stock: i64,
    pub kind: MovementKind,
    pub notes: Option<String>,
    pub created_by: Option<ActorId>,
    /// Monotonically non-decreasing within a product's movement sequence.
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Materialize a movement record from a committed `StockAdjusted` event.
    pub fn from_event(event_id: Uuid, event: &StockAdjusted) -> Self {
        Self {
            id: event_id,
            product_id: event.product_id,
            variant_id: event.variant_id,
            change_amount: event.change_amount,
            new_stock: event.new_stock,
            kind: event.kind,
            notes: event.notes.clone(),
            created_by: event.actor_id,
            created_at: event.occurred_at,
        }
    }
}
