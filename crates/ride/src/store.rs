use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use realtime::not_found;
use tokio::sync::Mutex;

use crate::models::{Position, RideDetail, RideId, RideSummary};
use crate::provider::{RideQuery, RideStore};

/// Process-local ride store. Ids are assigned sequentially from 1.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Rides>>,
}

#[derive(Default)]
struct Rides {
    last_id: RideId,
    rides: BTreeMap<RideId, RideDetail>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideStore for MemoryStore {
    async fn create_ride(&self, name: &str, start_time: DateTime<Utc>) -> Result<RideId> {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let id = inner.last_id;
        inner.rides.insert(
            id,
            RideDetail { id, name: name.to_string(), start_time, end_time: None, positions: vec![] },
        );
        Ok(id)
    }

    async fn append_position(&self, ride_id: RideId, position: &Position) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(ride) = inner.rides.get_mut(&ride_id) else {
            return Err(not_found!("ride {} not found", ride_id).into());
        };
        ride.positions.push(*position);
        Ok(())
    }

    async fn close_ride(&self, ride_id: RideId, end_time: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(ride) = inner.rides.get_mut(&ride_id) else {
            return Err(not_found!("ride {} not found", ride_id).into());
        };
        ride.end_time = Some(end_time);
        Ok(())
    }
}

#[async_trait]
impl RideQuery for MemoryStore {
    async fn rides(
        &self, page: usize, limit: usize, date: Option<NaiveDate>,
    ) -> Result<Vec<RideSummary>> {
        let inner = self.inner.lock().await;
        let mut rides: Vec<RideSummary> = inner
            .rides
            .values()
            .filter(|ride| date.is_none_or(|day| ride.start_time.date_naive() == day))
            .map(RideDetail::summary)
            .collect();
        rides.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));

        let offset = page.saturating_sub(1).saturating_mul(limit);
        Ok(rides.into_iter().skip(offset).take(limit).collect())
    }

    async fn ride(&self, ride_id: RideId) -> Result<Option<RideDetail>> {
        let inner = self.inner.lock().await;
        Ok(inner.rides.get(&ride_id).cloned().map(|mut ride| {
            ride.positions.sort_by_key(|position| position.timestamp);
            ride
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use realtime::Error;

    use super::MemoryStore;
    use crate::models::Position;
    use crate::provider::{RideQuery, RideStore};

    #[tokio::test]
    async fn ids_start_at_one() {
        let store = MemoryStore::new();
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();

        assert_eq!(store.create_ride("Morning Ride", start).await.unwrap(), 1);
        assert_eq!(store.create_ride("Morning Ride", start).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unknown_ride_is_not_found() {
        let store = MemoryStore::new();
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();

        let err = store.close_ride(42, at).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));

        let err = store.append_position(42, &Position::new(0.0, 0.0, at)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
        assert!(store.ride(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let store = MemoryStore::new();
        let day = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
        for hours in 0..5 {
            store.create_ride("ride", day + Duration::hours(hours)).await.unwrap();
        }
        store.create_ride("next day", day + Duration::days(1)).await.unwrap();

        let ids: Vec<_> = store.rides(1, 3, None).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![6, 5, 4]);
        let ids: Vec<_> = store.rides(2, 3, None).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let date = NaiveDate::from_ymd_opt(2025, 4, 2);
        let rides = store.rides(1, 10, date).await.unwrap();
        assert_eq!(rides.len(), 1);
        assert_eq!(rides[0].name, "next day");
    }

    #[tokio::test]
    async fn detail_orders_positions() {
        let store = MemoryStore::new();
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
        let id = store.create_ride("ride", at).await.unwrap();

        store.append_position(id, &Position::new(0.0, 0.0, at + Duration::seconds(10))).await.unwrap();
        store.append_position(id, &Position::new(1.0, 0.0, at)).await.unwrap();
        store.close_ride(id, at + Duration::seconds(20)).await.unwrap();

        let ride = store.ride(id).await.unwrap().unwrap();
        assert_eq!(ride.positions[0].latitude, 1.0);
        assert_eq!(ride.end_time, Some(at + Duration::seconds(20)));
    }
}
