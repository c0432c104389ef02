//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `RepositoryError` from `learnbyshorts_core::storage`.
//! Throttling, request limits and service-side failures become
//! `StoreUnavailable` so callers can retry them; everything else is final.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::CancellationReason;
use learnbyshorts_core::storage::RepositoryError;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

fn throttled() -> RepositoryError {
    RepositoryError::StoreUnavailable("Throughput exceeded, please retry".to_string())
}

fn request_limit() -> RepositoryError {
    RepositoryError::StoreUnavailable("Request limit exceeded, please retry".to_string())
}

fn internal() -> RepositoryError {
    RepositoryError::StoreUnavailable("DynamoDB internal server error".to_string())
}

fn table_not_found() -> RepositoryError {
    RepositoryError::QueryFailed("Table not found".to_string())
}

/// Transport-level failures (timeouts, dispatch errors) carry no service error.
fn transport_error<E, R>(err: &SdkError<E, R>) -> Option<RepositoryError> {
    match err {
        SdkError::TimeoutError(_) => Some(RepositoryError::StoreUnavailable(
            "DynamoDB request timed out".to_string(),
        )),
        SdkError::DispatchFailure(_) => Some(RepositoryError::StoreUnavailable(
            "Failed to dispatch DynamoDB request".to_string(),
        )),
        _ => None,
    }
}

/// Map a GetItem SDK error to RepositoryError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> RepositoryError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => table_not_found(),
        GetItemError::ProvisionedThroughputExceededException(_) => throttled(),
        GetItemError::RequestLimitExceeded(_) => request_limit(),
        GetItemError::InternalServerError(_) => internal(),
        err => RepositoryError::QueryFailed(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to RepositoryError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> RepositoryError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => table_not_found(),
        QueryError::ProvisionedThroughputExceededException(_) => throttled(),
        QueryError::RequestLimitExceeded(_) => request_limit(),
        QueryError::InternalServerError(_) => internal(),
        err => RepositoryError::QueryFailed(format!("Query failed: {:?}", err)),
    }
}

/// Map a PutItem SDK error to RepositoryError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => RepositoryError::Conflict {
            entity_type,
            id: id.into(),
        },
        PutItemError::ResourceNotFoundException(_) => table_not_found(),
        PutItemError::ProvisionedThroughputExceededException(_) => throttled(),
        PutItemError::RequestLimitExceeded(_) => request_limit(),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            RepositoryError::QueryFailed("Item collection size limit exceeded".to_string())
        }
        PutItemError::TransactionConflictException(_) => {
            RepositoryError::StoreUnavailable("Transaction conflict, please retry".to_string())
        }
        PutItemError::InternalServerError(_) => internal(),
        err => RepositoryError::QueryFailed(format!("PutItem failed: {:?}", err)),
    }
}

/// Map an UpdateItem SDK error to RepositoryError.
///
/// Updates here are conditional on the item existing, so a failed condition
/// means the item is absent.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    entity_type: &'static str,
    id: impl Into<String>,
) -> RepositoryError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => RepositoryError::NotFound {
            entity_type,
            id: id.into(),
        },
        UpdateItemError::ResourceNotFoundException(_) => table_not_found(),
        UpdateItemError::ProvisionedThroughputExceededException(_) => throttled(),
        UpdateItemError::RequestLimitExceeded(_) => request_limit(),
        UpdateItemError::ItemCollectionSizeLimitExceededException(_) => {
            RepositoryError::QueryFailed("Item collection size limit exceeded".to_string())
        }
        UpdateItemError::TransactionConflictException(_) => {
            RepositoryError::StoreUnavailable("Transaction conflict, please retry".to_string())
        }
        UpdateItemError::InternalServerError(_) => internal(),
        err => RepositoryError::QueryFailed(format!("UpdateItem failed: {:?}", err)),
    }
}

/// Map a TransactWriteItems SDK error to RepositoryError.
///
/// `targets` names the entity behind each action, in request order, so a
/// failed condition can be reported against the record that already exists.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
    targets: &[(&'static str, String)],
) -> RepositoryError {
    if let Some(mapped) = transport_error(&err) {
        return mapped;
    }
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(e) => {
            cancellation_to_error(e.cancellation_reasons(), targets)
        }
        TransactWriteItemsError::TransactionInProgressException(_) => {
            RepositoryError::StoreUnavailable("Transaction in progress, please retry".to_string())
        }
        TransactWriteItemsError::ResourceNotFoundException(_) => table_not_found(),
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => throttled(),
        TransactWriteItemsError::RequestLimitExceeded(_) => request_limit(),
        TransactWriteItemsError::InternalServerError(_) => internal(),
        err => RepositoryError::QueryFailed(format!("TransactWriteItems failed: {:?}", err)),
    }
}

/// Interpret the per-action reasons of a cancelled transaction.
pub fn cancellation_to_error(
    reasons: &[CancellationReason],
    targets: &[(&'static str, String)],
) -> RepositoryError {
    let failed_condition = reasons
        .iter()
        .position(|reason| reason.code() == Some(CONDITIONAL_CHECK_FAILED));

    if let Some(position) = failed_condition {
        let (entity_type, id) = targets
            .get(position)
            .cloned()
            .unwrap_or(("Item", String::new()));
        return RepositoryError::Conflict { entity_type, id };
    }

    let codes: Vec<&str> = reasons
        .iter()
        .filter_map(|reason| reason.code())
        .filter(|code| *code != "None")
        .collect();

    // Conflicts with concurrent transactions and throttling are transient.
    let transient = codes.iter().any(|code| {
        matches!(
            *code,
            "TransactionConflict" | "ThrottlingError" | "ProvisionedThroughputExceeded"
        )
    });
    if transient {
        return RepositoryError::StoreUnavailable(format!(
            "Transaction cancelled: {}",
            codes.join(", ")
        ));
    }

    RepositoryError::QueryFailed(format!("Transaction cancelled: {}", codes.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(code: &str) -> CancellationReason {
        CancellationReason::builder().code(code).build()
    }

    fn targets() -> Vec<(&'static str, String)> {
        vec![
            ("Profile", "u1".to_string()),
            ("IdentityIndex", "a@x.com".to_string()),
        ]
    }

    #[test]
    fn test_failed_identity_condition_is_conflict_on_identity_index() {
        let error = cancellation_to_error(
            &[reason("None"), reason(CONDITIONAL_CHECK_FAILED)],
            &targets(),
        );
        assert_eq!(
            error,
            RepositoryError::Conflict {
                entity_type: "IdentityIndex",
                id: "a@x.com".to_string()
            }
        );
    }

    #[test]
    fn test_failed_profile_condition_is_conflict_on_profile() {
        let error = cancellation_to_error(
            &[reason(CONDITIONAL_CHECK_FAILED), reason("None")],
            &targets(),
        );
        assert!(matches!(
            error,
            RepositoryError::Conflict {
                entity_type: "Profile",
                ..
            }
        ));
    }

    #[test]
    fn test_transaction_conflict_is_retryable() {
        let error = cancellation_to_error(
            &[reason("TransactionConflict"), reason("None")],
            &targets(),
        );
        assert!(error.is_retryable());
    }

    #[test]
    fn test_validation_error_is_not_retryable() {
        let error = cancellation_to_error(&[reason("ValidationError")], &targets());
        assert!(matches!(error, RepositoryError::QueryFailed(_)));
    }
}
