use thiserror::Error;

/// The cache backend could not be reached at all. Distinct from an empty
/// store or a missing key: this one is retryable at a higher layer.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("epoch store backend unavailable: {0}")]
    Unavailable(String),
}

/// A single record lacks a usable numeric field or carries a malformed
/// epoch. Never aborts a batch computation; the record is skipped.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("field {0} is missing or not a finite number")]
    BadField(&'static str),

    #[error("epoch timestamp '{0}' does not match YYYY-DDDThh:mm:ss.sssZ")]
    BadEpoch(String),
}

/// Ingestion failures leave the store Empty, never partially populated.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("upstream batch contained no state vectors")]
    EmptyBatch,

    #[error("upstream payload is malformed: {0}")]
    MalformedFeed(String),

    #[error("upstream fetch failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Frame transform failures. The transform is a black box with a fixed
/// contract; anything out of domain surfaces here.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("position is out of the transform's domain")]
    OutOfDomain,

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Closed error set for the query surface. Callers branch on the variant,
/// never on message text.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Store is empty, or every record failed the parse filter.
    #[error("no epoch data available")]
    NoData,

    /// Valid query, no record with that key.
    #[error("no epoch matching '{0}'")]
    NotFound(String),

    /// Bad pagination arguments.
    #[error("offset {offset} out of range (dataset holds {total} epochs)")]
    Range { offset: i64, total: usize },

    /// The addressed record lacks the numeric fields this computation needs.
    #[error("record is not usable for this computation: {0}")]
    InvalidRecord(#[from] RecordError),

    /// The external geodesy capability failed or timed out.
    #[error("location could not be determined: {0}")]
    LocationUnavailable(#[from] GeoError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
