use thiserror::Error;

/// Errors that escape the sync engine's boundary.
///
/// Normal operation degrades internally (skips + diagnostics); these
/// surface only for run-level preconditions and the archival phase of the
/// rebuild operation, which must abort before any destructive delete.
#[derive(Debug, Error)]
pub enum SyncError {
    /// ShipStation credentials are not configured; checked before any
    /// network or database activity.
    #[error("ShipStation credentials are not configured")]
    MissingCredentials,

    #[error(transparent)]
    Db(#[from] tracelot_db::DbError),

    #[error("lot log could not be read: {0}")]
    LotLog(#[from] csv::Error),
}
