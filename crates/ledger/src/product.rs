use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storekeeper_core::{ActorId, Aggregate, AggregateId, AggregateRoot, DomainError, VariantId};
use storekeeper_events::Event;

use crate::movement::MovementKind;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Product.
///
/// The stock field changes only by applying `StockAdjusted` events; nothing
/// else writes it. Replaying a product's events from an empty instance
/// reproduces the current stock exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    stock: i64,
    min_stock_level: i64,
    /// Business time of the last recorded movement; later movements are
    /// clamped so the sequence stays monotonically non-decreasing.
    last_movement_at: Option<DateTime<Utc>>,
    /// Idempotency keys of already-applied adjustments.
    seen_adjustment_keys: HashSet<String>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            sku: String::new(),
            name: String::new(),
            stock: 0,
            min_stock_level: 0,
            last_movement_at: None,
            seen_adjustment_keys: HashSet::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn min_stock_level(&self) -> i64 {
        self.min_stock_level
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub min_stock_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub delta: i64,
    pub kind: MovementKind,
    pub notes: Option<String>,
    pub actor_id: Option<ActorId>,
    /// Client-supplied key making timeout retries safe: a key that was
    /// already applied turns the command into a no-op.
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetMinStockLevel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMinStockLevel {
    pub product_id: ProductId,
    pub min_stock_level: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    AdjustStock(AdjustStock),
    SetMinStockLevel(SetMinStockLevel),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub min_stock_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
///
/// This is the persisted form of a stock movement. `new_stock` is recorded
/// redundantly so the history audits without replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub change_amount: i64,
    pub new_stock: i64,
    pub kind: MovementKind,
    pub notes: Option<String>,
    pub actor_id: Option<ActorId>,
    pub idempotency_key: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MinStockLevelSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinStockLevelSet {
    pub product_id: ProductId,
    pub min_stock_level: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    StockAdjusted(StockAdjusted),
    MinStockLevelSet(MinStockLevelSet),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "ledger.product.created",
            ProductEvent::StockAdjusted(_) => "ledger.product.stock_adjusted",
            ProductEvent::MinStockLevelSet(_) => "ledger.product.min_stock_level_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
            ProductEvent::MinStockLevelSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.stock = 0;
                self.min_stock_level = e.min_stock_level;
                self.created = true;
            }
            ProductEvent::StockAdjusted(e) => {
                // The recorded post-movement stock is authoritative.
                self.stock = e.new_stock;
                self.last_movement_at = Some(e.occurred_at);
                if let Some(key) = &e.idempotency_key {
                    self.seen_adjustment_keys.insert(key.clone());
                }
            }
            ProductEvent::MinStockLevelSet(e) => {
                self.min_stock_level = e.min_stock_level;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ProductCommand::SetMinStockLevel(cmd) => self.handle_set_min_stock_level(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::validation("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.min_stock_level < 0 {
            return Err(DomainError::validation("min_stock_level cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            min_stock_level: cmd.min_stock_level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::ProductNotFound);
        }
        self.ensure_product_id(cmd.product_id)?;

        // Replay of an already-applied adjustment: emit nothing.
        if let Some(key) = &cmd.idempotency_key {
            if self.seen_adjustment_keys.contains(key) {
                return Ok(vec![]);
            }
        }

        if cmd.delta == 0 {
            return Err(DomainError::InvalidDelta);
        }

        let new_stock = self.stock + cmd.delta;
        if new_stock < 0 && !cmd.kind.allows_negative_stock() {
            return Err(DomainError::insufficient_stock(self.stock, cmd.delta));
        }

        // Clamp so created_at never moves backwards within the stream.
        let occurred_at = match self.last_movement_at {
            Some(prev) if cmd.occurred_at < prev => prev,
            _ => cmd.occurred_at,
        };

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            variant_id: cmd.variant_id,
            change_amount: cmd.delta,
            new_stock,
            kind: cmd.kind,
            notes: cmd.notes.clone(),
            actor_id: cmd.actor_id,
            idempotency_key: cmd.idempotency_key.clone(),
            occurred_at,
        })])
    }

    fn handle_set_min_stock_level(
        &self,
        cmd: &SetMinStockLevel,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::ProductNotFound);
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.min_stock_level < 0 {
            return Err(DomainError::validation("min_stock_level cannot be negative"));
        }

        Ok(vec![ProductEvent::MinStockLevelSet(MinStockLevelSet {
            product_id: cmd.product_id,
            min_stock_level: cmd.min_stock_level,
            occurred_at: cmd.occurred_at,
        })])
    }
}
