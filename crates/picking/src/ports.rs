//! Outbound order port (order lines for wave creation).

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockflow_catalog::SkuId;
use stockflow_core::AggregateId;

/// Outbound order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One line of an outbound order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: SkuId,
    pub quantity: u32,
}

/// Order lookup port.
pub trait OrderRepository: Send + Sync {
    fn order_lines(&self, id: OrderId) -> Option<Vec<OrderLine>>;
}

/// In-memory order repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrders {
    orders: RwLock<HashMap<OrderId, Vec<OrderLine>>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: OrderId, lines: Vec<OrderLine>) {
        self.orders.write().unwrap().insert(id, lines);
    }
}

impl OrderRepository for InMemoryOrders {
    fn order_lines(&self, id: OrderId) -> Option<Vec<OrderLine>> {
        self.orders.read().unwrap().get(&id).cloned()
    }
}
