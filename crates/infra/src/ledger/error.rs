use serde::{Deserialize, Serialize};
use thiserror::Error;

use siteledger_core::{AssetId, DomainError};
use siteledger_waybills::WaybillId;

use crate::store::StoreError;

/// Failure of a ledger operation.
///
/// Any of these aborts the whole unit of work; nothing is committed.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("asset {0} not found")]
    AssetNotFound(AssetId),

    #[error("waybill {0} not found")]
    WaybillNotFound(WaybillId),

    #[error("insufficient quantity for {asset}: requested {requested}, available {available}")]
    InsufficientQuantity {
        asset: String,
        requested: i64,
        available: i64,
    },

    #[error("waybill id {0} already exists")]
    DuplicateId(WaybillId),

    #[error("no free {prefix} id after {attempts} attempts")]
    AllocatorExhausted { prefix: String, attempts: u32 },

    /// A return-only operation was invoked on an outbound waybill (or vice versa).
    #[error("waybill {id} is a {actual} waybill, expected {expected}")]
    InvalidWaybillType {
        id: WaybillId,
        expected: String,
        actual: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code for callers that branch on the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::AssetNotFound(_) | LedgerError::WaybillNotFound(_) => "not_found",
            LedgerError::InsufficientQuantity { .. } => "insufficient_quantity",
            LedgerError::DuplicateId(_) => "duplicate_id",
            LedgerError::AllocatorExhausted { .. } => "allocator_exhausted",
            LedgerError::InvalidWaybillType { .. } => "invalid_waybill_type",
            LedgerError::Validation(_) => "validation",
            LedgerError::InvalidTransition { .. } => "invalid_transition",
            LedgerError::Store(_) => "store",
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg)
            | DomainError::NotFound(msg) => LedgerError::Validation(msg),
            DomainError::InsufficientQuantity {
                asset,
                requested,
                available,
            } => LedgerError::InsufficientQuantity {
                asset,
                requested,
                available,
            },
            DomainError::InvalidTransition { from, to } => LedgerError::InvalidTransition { from, to },
        }
    }
}

/// Structured outcome for callers that want `{ success, data?, error?, code? }`
/// rather than a `Result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> From<Result<T, LedgerError>> for OperationResult<T> {
    fn from(result: Result<T, LedgerError>) -> Self {
        match result {
            Ok(data) => OperationResult {
                success: true,
                data: Some(data),
                error: None,
                code: None,
            },
            Err(err) => OperationResult {
                success: false,
                data: None,
                error: Some(err.to_string()),
                code: Some(err.code().to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_shortfall_keeps_its_numbers() {
        let err: LedgerError = DomainError::insufficient("Prop", 12, 4).into();
        assert!(matches!(
            err,
            LedgerError::InsufficientQuantity {
                requested: 12,
                available: 4,
                ..
            }
        ));
        assert_eq!(err.code(), "insufficient_quantity");
    }

    #[test]
    fn failed_operation_serializes_without_data() {
        let result: OperationResult<String> =
            Err(LedgerError::WaybillNotFound(WaybillId::new("WB009").unwrap())).into();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "waybill WB009 not found");
        assert_eq!(json["code"], "not_found");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn successful_operation_carries_data() {
        let result: OperationResult<String> = Ok("WB001".to_string()).into();
        assert!(result.success);
        assert_eq!(result.data.as_deref(), Some("WB001"));
        assert!(result.error.is_none());
    }
}
