use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque transaction payload.
///
/// The engine never interprets the contents; it only needs them to serialize
/// deterministically into the block hash preimage, which holds for any JSON
/// value. Required-field validation (say, an author/content pair) and any
/// received-at stamping happen in the boundary layer before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRecord(Value);

impl TransactionRecord {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    pub fn payload(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for TransactionRecord {
    fn from(payload: Value) -> Self {
        Self(payload)
    }
}
