use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

use super::{EnvironmentError, EnvironmentProvider};
use crate::domain::{EnvironmentSample, Location};

#[derive(Debug, Clone)]
struct CachedSample {
    fetched_for: DateTime<Utc>,
    sample: EnvironmentSample,
}

/// Per-cell cache in front of an environment source.
///
/// The inner source is always asked about the cell centre, so every location in a cell sees
/// the same sample regardless of which vehicle fetched it first. Fresh hits (younger than
/// `ttl` in simulated time) skip the inner provider. On a transient failure the last good
/// sample for the cell is returned, however old.
pub struct FallbackEnvironment<P> {
    inner: P,
    ttl: Duration,
    cache: RwLock<HashMap<(i32, i32), CachedSample>>,
}

impl<P: EnvironmentProvider> FallbackEnvironment<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached_cells(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl<P: EnvironmentProvider> EnvironmentProvider for FallbackEnvironment<P> {
    async fn get_environment(
        &self,
        location: &Location,
        at: DateTime<Utc>,
    ) -> Result<EnvironmentSample, EnvironmentError> {
        if !location.is_valid() {
            return Err(EnvironmentError::InvalidLocation {
                latitude: location.latitude,
                longitude: location.longitude,
            });
        }
        let key = location.cell();

        {
            let cache = self.cache.read().await;
            if let Some(hit) = cache.get(&key) {
                let age = at - hit.fetched_for;
                if age >= Duration::zero() && age < self.ttl {
                    return Ok(hit.sample.clone());
                }
            }
        }

        let centre = Location::new(key.0 as f64 / 10.0, key.1 as f64 / 10.0);
        match self.inner.get_environment(&centre, at).await {
            Ok(sample) => {
                self.cache.write().await.insert(
                    key,
                    CachedSample {
                        fetched_for: at,
                        sample: sample.clone(),
                    },
                );
                Ok(sample)
            }
            Err(e) if e.is_transient() => {
                let cache = self.cache.read().await;
                match cache.get(&key) {
                    Some(stale) => {
                        warn!(
                            error = %e,
                            latitude = location.latitude,
                            longitude = location.longitude,
                            stale_for_s = (at - stale.fetched_for).num_seconds(),
                            "environment source unavailable, using last known sample"
                        );
                        Ok(stale.sample.clone())
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Returns `temperature = call count` until switched off
    struct Flaky {
        calls: AtomicUsize,
        down: AtomicBool,
    }

    impl Flaky {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                down: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EnvironmentProvider for Flaky {
        async fn get_environment(
            &self,
            _location: &Location,
            at: DateTime<Utc>,
        ) -> Result<EnvironmentSample, EnvironmentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.down.load(Ordering::SeqCst) {
                return Err(EnvironmentError::Unavailable("maintenance window".into()));
            }
            let mut s = EnvironmentSample::mild(at);
            s.temperature_c = n as f64;
            Ok(s)
        }
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_inner() {
        let env = FallbackEnvironment::new(Flaky::new(), Duration::minutes(10));
        let loc = Location::new(40.0, -100.0);
        let t0 = Utc::now();

        let a = env.get_environment(&loc, t0).await.unwrap();
        let b = env
            .get_environment(&loc, t0 + Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(a.temperature_c, 1.0);
        assert_eq!(b.temperature_c, 1.0);
        assert_eq!(env.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let env = FallbackEnvironment::new(Flaky::new(), Duration::minutes(10));
        let loc = Location::new(40.0, -100.0);
        let t0 = Utc::now();

        env.get_environment(&loc, t0).await.unwrap();
        let b = env
            .get_environment(&loc, t0 + Duration::minutes(11))
            .await
            .unwrap();
        assert_eq!(b.temperature_c, 2.0);
    }

    #[tokio::test]
    async fn test_outage_serves_stale_sample() {
        let env = FallbackEnvironment::new(Flaky::new(), Duration::seconds(30));
        let loc = Location::new(40.0, -100.0);
        let t0 = Utc::now();

        env.get_environment(&loc, t0).await.unwrap();
        env.inner.down.store(true, Ordering::SeqCst);

        let stale = env
            .get_environment(&loc, t0 + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(stale.temperature_c, 1.0);
    }

    #[tokio::test]
    async fn test_outage_without_history_errors() {
        let flaky = Flaky::new();
        flaky.down.store(true, Ordering::SeqCst);
        let env = FallbackEnvironment::new(flaky, Duration::seconds(30));

        let err = env
            .get_environment(&Location::new(1.0, 1.0), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::Unavailable(_)));
        assert_eq!(env.cached_cells().await, 0);
    }

    #[tokio::test]
    async fn test_locations_in_one_cell_share_a_sample() {
        let env = FallbackEnvironment::new(
            crate::environment::SyntheticEnvironment::new(3),
            Duration::zero(),
        );
        let t0 = Utc::now();

        let a = env
            .get_environment(&Location::new(41.871, -87.631), t0)
            .await
            .unwrap();
        let b = env
            .get_environment(&Location::new(41.912, -87.598), t0)
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(env.cached_cells().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_location_rejected() {
        let env = FallbackEnvironment::new(Flaky::new(), Duration::seconds(30));
        let err = env
            .get_environment(&Location::new(f64::NAN, 10.0), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::InvalidLocation { .. }));
        assert_eq!(env.inner.calls.load(Ordering::SeqCst), 0);
    }
}
