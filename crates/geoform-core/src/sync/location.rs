//! Best-effort participant geolocation.
//!
//! The only bounded operation in a sync run: a lookup that exceeds the
//! timeout degrades to "no location" instead of failing the drain.

use std::time::Duration;

use crate::models::LngLat;

/// Default bound on a geolocation lookup
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of the device's current position
#[allow(async_fn_in_trait)]
pub trait LocationProvider {
    /// The current position, or `None` when unavailable
    async fn current_location(&self) -> Option<LngLat>;
}

/// Provider for headless environments with no position source
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    async fn current_location(&self) -> Option<LngLat> {
        None
    }
}

/// Provider pinned to a fixed position (configured or test)
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub LngLat);

impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Option<LngLat> {
        Some(self.0)
    }
}

/// Run a lookup under the given bound, degrading to `None` on timeout.
pub async fn locate_with_timeout<L: LocationProvider>(
    provider: &L,
    limit: Duration,
) -> Option<LngLat> {
    match tokio::time::timeout(limit, provider.current_location()).await {
        Ok(location) => location,
        Err(_) => {
            tracing::debug!("geolocation lookup timed out after {limit:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider;

    impl LocationProvider for SlowProvider {
        async fn current_location(&self) -> Option<LngLat> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Some(LngLat { lng: 0.0, lat: 0.0 })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fixed_location_reports_its_position() {
        let provider = FixedLocation(LngLat {
            lng: 121.5,
            lat: 25.0,
        });
        let location = locate_with_timeout(&provider, LOCATION_TIMEOUT).await;
        assert_eq!(
            location,
            Some(LngLat {
                lng: 121.5,
                lat: 25.0
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_lookup_degrades_to_none() {
        let location = locate_with_timeout(&SlowProvider, Duration::from_millis(20)).await;
        assert!(location.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_location_is_none() {
        let location = locate_with_timeout(&NoLocation, LOCATION_TIMEOUT).await;
        assert!(location.is_none());
    }
}
