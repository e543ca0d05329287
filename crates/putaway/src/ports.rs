//! Inbound receipt port (ASN lines for putaway).

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use stockflow_catalog::SkuId;
use stockflow_core::AggregateId;

/// Receipt (ASN) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(pub AggregateId);

impl ReceiptId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One line of an inbound receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub sku: SkuId,
    pub quantity: u32,
    pub lot: Option<String>,
}

/// Advance Shipment Notice manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub lines: Vec<ReceiptLine>,
}

/// ASN lookup port.
pub trait ReceiptRepository: Send + Sync {
    fn receipt(&self, id: ReceiptId) -> Option<Receipt>;
}

/// In-memory receipt repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReceipts {
    receipts: RwLock<HashMap<ReceiptId, Receipt>>,
}

impl InMemoryReceipts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, receipt: Receipt) {
        self.receipts.write().unwrap().insert(receipt.id, receipt);
    }
}

impl ReceiptRepository for InMemoryReceipts {
    fn receipt(&self, id: ReceiptId) -> Option<Receipt> {
        self.receipts.read().unwrap().get(&id).cloned()
    }
}
