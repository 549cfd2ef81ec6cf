//! Orbitrack: an in-memory epoch cache and query engine for satellite
//! orbital state data, served over a small HTTP API.
//!
//! One batch of timestamped state vectors is ingested from the upstream
//! ephemeris feed at startup; after that the store is read-only and queries
//! (paging, point lookup, nearest-to-now, speed, geodetic projection) run
//! fully in parallel.

pub mod error;
pub mod feed;
pub mod geo;
pub mod ingest;
pub mod manager;
pub mod model;
pub mod parser;
pub mod query;
pub mod server;
pub mod store;
pub mod vector;

pub use error::{GeoError, IngestError, QueryError, RecordError, StoreError};
pub use ingest::IngestPipeline;
pub use model::{EpochRecord, ScalarSample};
pub use query::QueryEngine;
pub use store::{EpochStore, MemoryStore};
