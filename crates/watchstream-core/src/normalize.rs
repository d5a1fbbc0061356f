//! Raw change record to [`ChangeEvent`] decoding.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::event::{ChangeEvent, OperationType};

/// A store-native change record, as a JSON object (relaxed extended JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct RawChangeRecord {
    body: Value,
}

impl RawChangeRecord {
    /// Wrap a store-native record.
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// The record body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Consume the record, returning its body.
    pub fn into_body(self) -> Value {
        self.body
    }
}

impl From<Value> for RawChangeRecord {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}

/// Normalization errors. Each one is scoped to a single record.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The record does not decode into the event shape.
    #[error("cannot decode change record: {0}")]
    Decode(#[from] serde_json::Error),

    /// A field required by the operation is missing.
    #[error("{operation} record is missing {field}")]
    MissingField {
        operation: OperationType,
        field: &'static str,
    },
}

/// Map a store-native change record to a [`ChangeEvent`].
///
/// Pure: no I/O, and the same record always yields an equal event. Optional
/// fields absent from the record stay absent. Every check runs before the
/// event is returned, so a failure never yields a partial event.
pub fn normalize(raw: &RawChangeRecord) -> Result<ChangeEvent, NormalizeError> {
    let event = ChangeEvent::deserialize(raw.body())?;

    if event.operation != OperationType::Invalidate && event.namespace.is_none() {
        return Err(NormalizeError::MissingField {
            operation: event.operation,
            field: "ns",
        });
    }

    if event.operation.is_document_level() && event.document_key.is_none() {
        return Err(NormalizeError::MissingField {
            operation: event.operation,
            field: "documentKey",
        });
    }

    if event.operation == OperationType::Rename && event.rename_target.is_none() {
        return Err(NormalizeError::MissingField {
            operation: event.operation,
            field: "to",
        });
    }

    Ok(event)
}
