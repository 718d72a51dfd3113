use thiserror::Error;

/// Transport/query failure from the store gateway. A missing number or id is
/// not an error - the trait returns `Ok(None)` for that - this is reserved
/// for genuine connectivity/query failures that the dispatcher surfaces as
/// `RouteErrorKind::StoreUnavailable`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
