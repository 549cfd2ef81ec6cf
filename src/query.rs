use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::QueryError;
use crate::geo::{FrameTransform, Geodetic};
use crate::model::EpochRecord;
use crate::store::EpochStore;
use crate::vector::norm3;

/// Read-side engine over the epoch cache.
///
/// Holds the injected store and frame transform; every operation reads the
/// current full dataset through the store contract and computes on a private
/// copy, so nothing here blocks ingest or other queries.
pub struct QueryEngine {
    store: Arc<dyn EpochStore>,
    transform: Arc<dyn FrameTransform>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn EpochStore>, transform: Arc<dyn FrameTransform>) -> Self {
        Self { store, transform }
    }

    /// Paginated listing in store order.
    ///
    /// `offset == total` yields an empty page (the caller walked off the
    /// end, which is not an error); anything negative or beyond that is a
    /// range fault. A `limit` larger than the remainder truncates silently.
    pub fn list_epochs(
        &self,
        offset: i64,
        limit: Option<usize>,
    ) -> Result<Vec<EpochRecord>, QueryError> {
        let records = self.store.list_all()?;
        let total = records.len();
        if total == 0 {
            return Err(QueryError::NoData);
        }
        if offset < 0 || offset as usize > total {
            return Err(QueryError::Range { offset, total });
        }

        let page = records.into_iter().skip(offset as usize);
        Ok(match limit {
            Some(n) => page.take(n).collect(),
            None => page.collect(),
        })
    }

    /// Exact-key lookup.
    pub fn get_epoch(&self, key: &str) -> Result<EpochRecord, QueryError> {
        if self.store.is_empty()? {
            return Err(QueryError::NoData);
        }
        self.store
            .get(key)?
            .ok_or_else(|| QueryError::NotFound(key.to_string()))
    }

    /// Nearest record to `reference` by absolute time difference, with its
    /// instantaneous speed.
    ///
    /// Stable scan in store order; ties keep the first record encountered.
    /// A record whose epoch or velocity fails to parse is skipped entirely,
    /// so an unparseable-but-temporally-nearest record is passed over in
    /// favor of the next-nearest valid one. That skip is contract, not a
    /// defect.
    pub fn closest_to(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<(f64, EpochRecord), QueryError> {
        let records = self.store.list_all()?;
        if records.is_empty() {
            return Err(QueryError::NoData);
        }

        let mut best: Option<(chrono::Duration, f64, EpochRecord)> = None;

        for record in records {
            let at = match record.timestamp() {
                Ok(t) => t,
                Err(e) => {
                    debug!("skipping epoch in nearest scan: {e}");
                    continue;
                }
            };
            let velocity = match record.velocity() {
                Ok(v) => v,
                Err(e) => {
                    debug!(epoch = %record.epoch, "skipping epoch in nearest scan: {e}");
                    continue;
                }
            };

            let diff = (at - reference).abs();
            if best.as_ref().map_or(true, |(d, _, _)| diff < *d) {
                best = Some((diff, norm3(velocity), record));
            }
        }

        best.map(|(_, speed, record)| (speed, record))
            .ok_or(QueryError::NoData)
    }

    /// Instantaneous speed: Euclidean norm of the velocity components.
    pub fn speed_of(&self, record: &EpochRecord) -> Result<f64, QueryError> {
        Ok(norm3(record.velocity()?))
    }

    /// Arithmetic mean of per-record speed across the batch.
    ///
    /// Rows whose velocity does not parse contribute nothing to the sum but
    /// STILL count in the divisor (total input rows), matching the
    /// long-standing accumulator behavior: a dataset with invalid rows
    /// averages low rather than ignoring them. Empty input is `NoData`.
    pub fn average_speed(&self, records: &[EpochRecord]) -> Result<f64, QueryError> {
        if records.is_empty() {
            return Err(QueryError::NoData);
        }

        let mut sum = 0.0;
        for record in records {
            match record.velocity() {
                Ok(v) => sum += norm3(v),
                Err(e) => debug!(epoch = %record.epoch, "skipping row in average: {e}"),
            }
        }
        Ok(sum / records.len() as f64)
    }

    /// Mean speed over the whole cached dataset.
    pub fn average_speed_all(&self) -> Result<f64, QueryError> {
        let records = self.store.list_all()?;
        self.average_speed(&records)
    }

    /// Geodetic projection of a record's position at its own epoch.
    ///
    /// Delegates to the external frame transform; any failure there (or a
    /// malformed epoch string) degrades to `LocationUnavailable` instead of
    /// failing the whole request path.
    pub fn locate(&self, record: &EpochRecord) -> Result<Geodetic, QueryError> {
        let position = record.position()?;
        let at = record
            .timestamp()
            .map_err(crate::error::GeoError::from)
            .map_err(QueryError::LocationUnavailable)?;
        Ok(self.transform.to_geodetic(position, at)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GmstRotation;
    use crate::model::test_util::record;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn engine_with(records: Vec<EpochRecord>) -> QueryEngine {
        let store = Arc::new(MemoryStore::new());
        if !records.is_empty() {
            store.put_if_absent(records).unwrap();
        }
        QueryEngine::new(store, Arc::new(GmstRotation))
    }

    /// The four-record reference dataset: speeds sqrt(83), sqrt(45),
    /// sqrt(76), sqrt(48).
    fn reference_set() -> Vec<EpochRecord> {
        vec![
            record("2025-001T12:00:00.000Z", "7.0", "3.0", "5.0"),
            record("2025-002T12:00:00.000Z", "5.0", "2.0", "4.0"),
            record("2025-003T12:00:00.000Z", "6.0", "2.0", "6.0"),
            record("2025-004T12:00:00.000Z", "4.0", "4.0", "4.0"),
        ]
    }

    fn approx(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs()
    }

    #[test]
    fn average_speed_of_reference_set() {
        let engine = engine_with(reference_set());
        let avg = engine.average_speed_all().unwrap();
        assert!(approx(avg, 7.86615965725, 1e-4), "got {avg}");
    }

    #[test]
    fn average_speed_counts_invalid_rows_in_divisor() {
        let engine = engine_with(vec![]);
        let rows = vec![
            record("2025-001T12:00:00.000Z", "7.0", "abc", "5.0"),
            record("2025-002T12:00:00.000Z", "3.0", "4.0", "0.0"),
        ];
        // One valid row of speed 5.0 over two input rows.
        let avg = engine.average_speed(&rows).unwrap();
        assert!((avg - 2.5).abs() < 1e-12);

        let only_bad = vec![record("2025-001T12:00:00.000Z", "7.0", "abc", "5.0")];
        assert_eq!(engine.average_speed(&only_bad).unwrap(), 0.0);
    }

    #[test]
    fn average_speed_of_nothing_is_no_data() {
        let engine = engine_with(vec![]);
        assert!(matches!(engine.average_speed(&[]), Err(QueryError::NoData)));
        assert!(matches!(engine.average_speed_all(), Err(QueryError::NoData)));
    }

    #[test]
    fn closest_to_matching_epoch_returns_its_speed() {
        let engine = engine_with(reference_set());
        let reference = Utc.with_ymd_and_hms(2025, 1, 4, 12, 0, 0).unwrap();
        let (speed, rec) = engine.closest_to(reference).unwrap();
        assert_eq!(rec.epoch, "2025-004T12:00:00.000Z");
        assert!(approx(speed, 6.928203230275509, 1e-4), "got {speed}");
    }

    #[test]
    fn closest_skips_unparseable_nearest_record() {
        // Day 3 is temporally nearest but its Y_DOT is garbage; days 2 and 4
        // are equidistant from the reference, so the stable scan keeps the
        // first of them.
        let rows = vec![
            record("2025-001T12:00:00.000Z", "7.0", "3.0", "5.0"),
            record("2025-002T12:00:00.000Z", "5.0", "2.0", "4.0"),
            record("2025-003T12:00:00.000Z", "6.0", "abc", "6.0"),
            record("2025-004T12:00:00.000Z", "4.0", "4.0", "4.0"),
        ];
        let engine = engine_with(rows);
        let reference = Utc.with_ymd_and_hms(2025, 1, 3, 12, 0, 0).unwrap();

        let (speed, rec) = engine.closest_to(reference).unwrap();
        assert_eq!(rec.epoch, "2025-002T12:00:00.000Z");
        assert!(approx(speed, 45f64.sqrt(), 1e-9));
    }

    #[test]
    fn closest_with_no_valid_rows_is_no_data() {
        let engine = engine_with(vec![
            record("2025-001T12:00:00.000Z", "x", "y", "z"),
            record("not-an-epoch", "1.0", "2.0", "3.0"),
        ]);
        let reference = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            engine.closest_to(reference),
            Err(QueryError::NoData)
        ));

        let empty = engine_with(vec![]);
        assert!(matches!(empty.closest_to(reference), Err(QueryError::NoData)));
    }

    #[test]
    fn pagination_length_algebra() {
        let engine = engine_with(reference_set());

        assert_eq!(engine.list_epochs(0, None).unwrap().len(), 4);
        assert_eq!(engine.list_epochs(1, Some(2)).unwrap().len(), 2);
        // Truncation at end of data is not an error.
        assert_eq!(engine.list_epochs(3, Some(10)).unwrap().len(), 1);
        // Walking exactly off the end is an empty page...
        assert_eq!(engine.list_epochs(4, None).unwrap().len(), 0);
        // ...but past it, or negative, is a range fault.
        assert!(matches!(
            engine.list_epochs(5, None),
            Err(QueryError::Range { offset: 5, total: 4 })
        ));
        assert!(matches!(
            engine.list_epochs(-1, None),
            Err(QueryError::Range { .. })
        ));
    }

    #[test]
    fn pagination_preserves_store_order() {
        let engine = engine_with(reference_set());
        let page = engine.list_epochs(1, Some(2)).unwrap();
        assert_eq!(page[0].epoch, "2025-002T12:00:00.000Z");
        assert_eq!(page[1].epoch, "2025-003T12:00:00.000Z");
    }

    #[test]
    fn listing_an_empty_store_is_no_data() {
        let engine = engine_with(vec![]);
        assert!(matches!(engine.list_epochs(0, None), Err(QueryError::NoData)));
    }

    #[test]
    fn point_lookup_variants() {
        let engine = engine_with(reference_set());
        assert_eq!(
            engine.get_epoch("2025-002T12:00:00.000Z").unwrap().epoch,
            "2025-002T12:00:00.000Z"
        );
        assert!(matches!(
            engine.get_epoch("nonexistent"),
            Err(QueryError::NotFound(_))
        ));

        let empty = engine_with(vec![]);
        assert!(matches!(empty.get_epoch("anything"), Err(QueryError::NoData)));
    }

    #[test]
    fn speed_of_invalid_record_is_tagged() {
        let engine = engine_with(vec![]);
        let bad = record("2025-001T12:00:00.000Z", "7.0", "abc", "5.0");
        assert!(matches!(
            engine.speed_of(&bad),
            Err(QueryError::InvalidRecord(_))
        ));
    }

    #[test]
    fn locate_produces_leo_geodetic() {
        let engine = engine_with(vec![]);
        let rec = record("2025-047T12:00:00.000Z", "5.1", "-2.1", "-5.9");
        let g = engine.locate(&rec).unwrap();
        assert!(g.latitude.abs() <= 90.0);
        assert!(g.longitude.abs() <= 180.0);
        assert!(g.altitude > 300.0 && g.altitude < 500.0);
    }

    #[test]
    fn locate_degrades_instead_of_crashing() {
        let engine = engine_with(vec![]);

        let bad_epoch = record("garbage", "5.1", "-2.1", "-5.9");
        assert!(matches!(
            engine.locate(&bad_epoch),
            Err(QueryError::LocationUnavailable(_))
        ));

        let mut bad_pos = record("2025-047T12:00:00.000Z", "5.1", "-2.1", "-5.9");
        bad_pos.x.value = "not-a-number".to_string();
        assert!(matches!(
            engine.locate(&bad_pos),
            Err(QueryError::InvalidRecord(_))
        ));
    }
}
