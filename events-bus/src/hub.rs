use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::EventBusError;
use crate::event::HubEvent;
use crate::observer::Observer;

/// Default upper bound on a single observer delivery
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle returned by [`BroadcastHub::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObserverId(u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Observers removed because their delivery failed
    pub pruned: Vec<ObserverId>,
}

struct HubInner {
    observers: RwLock<BTreeMap<ObserverId, Arc<dyn Observer>>>,
    next_id: AtomicU64,
    delivery_timeout: Duration,
}

/// Best-effort, at-most-once-per-observer fan-out of [`HubEvent`]s
///
/// The lock guards the membership map only. `broadcast` copies the current
/// members out, releases the lock, and delivers to all of them concurrently,
/// so `connect`/`disconnect` never wait on a slow observer. Failed or timed
/// out observers are removed afterwards under a short write lock.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_delivery_timeout(DEFAULT_DELIVERY_TIMEOUT)
    }

    pub fn with_delivery_timeout(delivery_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                observers: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                delivery_timeout,
            }),
        }
    }

    /// Register an observer; it receives every event broadcast from now on
    pub async fn connect(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let total = {
            let mut observers = self.inner.observers.write().await;
            observers.insert(id, observer);
            observers.len()
        };
        info!(observer = %id, total, "Observer connected");
        id
    }

    /// Remove an observer; returns `false` if it was not connected
    pub async fn disconnect(&self, id: ObserverId) -> bool {
        let removed = self.inner.observers.write().await.remove(&id).is_some();
        if removed {
            info!(observer = %id, "Observer disconnected");
        }
        removed
    }

    pub async fn is_connected(&self, id: ObserverId) -> bool {
        self.inner.observers.read().await.contains_key(&id)
    }

    pub async fn observer_count(&self) -> usize {
        self.inner.observers.read().await.len()
    }

    /// Deliver `event` to every connected observer
    ///
    /// Never fails: a delivery error only disconnects the observer it came from.
    pub async fn broadcast(&self, event: &HubEvent) -> BroadcastReport {
        let snapshot: Vec<(ObserverId, Arc<dyn Observer>)> = {
            let observers = self.inner.observers.read().await;
            observers.iter().map(|(id, observer)| (*id, Arc::clone(observer))).collect()
        };

        if snapshot.is_empty() {
            debug!(event_type = %event.event_type, "No observers connected, event dropped");
            return BroadcastReport::default();
        }

        let timeout = self.inner.delivery_timeout;
        let deliveries = snapshot.iter().map(|(id, observer)| async move {
            let outcome = match tokio::time::timeout(timeout, observer.deliver(event)).await {
                Ok(result) => result,
                Err(_) => Err(EventBusError::DeliveryTimeout(timeout)),
            };
            (*id, outcome)
        });

        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..Default::default()
        };
        for (id, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(observer = %id, error = %e, "Observer delivery failed, disconnecting");
                    report.pruned.push(id);
                }
            }
        }

        if !report.pruned.is_empty() {
            let mut observers = self.inner.observers.write().await;
            for id in &report.pruned {
                observers.remove(id);
            }
        }

        debug!(
            event_type = %event.event_type,
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned.len(),
            "Broadcast complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{ChannelObserver, MockObserver};
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowObserver {
        delay: Duration,
    }

    #[async_trait]
    impl Observer for SlowObserver {
        async fn deliver(&self, _event: &HubEvent) -> crate::Result<()> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    fn sample_event() -> HubEvent {
        HubEvent::new("alert", json!({ "id": 1, "appointment_id": 42 }))
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_observer() {
        let hub = BroadcastHub::new();
        let (first, mut first_rx) = ChannelObserver::channel(4);
        let (second, mut second_rx) = ChannelObserver::channel(4);
        hub.connect(Arc::new(first)).await;
        hub.connect(Arc::new(second)).await;

        let report = hub.broadcast(&sample_event()).await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);
        assert!(report.pruned.is_empty());
        assert_eq!(first_rx.recv().await, Some(sample_event()));
        assert_eq!(second_rx.recv().await, Some(sample_event()));
    }

    #[tokio::test]
    async fn test_failing_observer_is_isolated_and_pruned() {
        let hub = BroadcastHub::new();
        let (first, mut first_rx) = ChannelObserver::channel(4);
        let mut broken = MockObserver::new();
        broken
            .expect_deliver()
            .times(1)
            .returning(|_| Err(EventBusError::DeliveryFailed("socket reset".into())));
        let (third, mut third_rx) = ChannelObserver::channel(4);

        hub.connect(Arc::new(first)).await;
        let broken_id = hub.connect(Arc::new(broken)).await;
        hub.connect(Arc::new(third)).await;

        let report = hub.broadcast(&sample_event()).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.pruned, vec![broken_id]);
        assert!(!hub.is_connected(broken_id).await);
        assert_eq!(first_rx.recv().await, Some(sample_event()));
        assert_eq!(third_rx.recv().await, Some(sample_event()));

        // the mock's times(1) fails the test if it is called again
        let second = HubEvent::alert_update(1, true);
        let report = hub.broadcast(&second).await;
        assert_eq!(report.attempted, 2);
        assert_eq!(first_rx.recv().await, Some(second.clone()));
        assert_eq!(third_rx.recv().await, Some(second));
    }

    #[tokio::test]
    async fn test_disconnect_stops_delivery() {
        let hub = BroadcastHub::new();
        let (observer, mut rx) = ChannelObserver::channel(4);
        let id = hub.connect(Arc::new(observer)).await;

        assert!(hub.disconnect(id).await);
        assert!(!hub.disconnect(id).await);

        let report = hub.broadcast(&sample_event()).await;
        assert_eq!(report, BroadcastReport::default());
        // hub dropped its sender, so the channel is closed and empty
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_observer_times_out_without_blocking_others() {
        let hub = BroadcastHub::with_delivery_timeout(Duration::from_secs(2));
        let slow_id = hub.connect(Arc::new(SlowObserver { delay: Duration::from_secs(60) })).await;
        let (fast, mut fast_rx) = ChannelObserver::channel(4);
        hub.connect(Arc::new(fast)).await;

        let report = hub.broadcast(&sample_event()).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, vec![slow_id]);
        assert_eq!(fast_rx.recv().await, Some(sample_event()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_membership_changes_during_slow_fan_out() {
        let hub = BroadcastHub::with_delivery_timeout(Duration::from_secs(30));
        hub.connect(Arc::new(SlowObserver { delay: Duration::from_secs(10) })).await;

        let fan_out = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.broadcast(&sample_event()).await })
        };
        tokio::task::yield_now().await;

        let started = tokio::time::Instant::now();
        let (late, _late_rx) = ChannelObserver::channel(4);
        let late_id = hub.connect(Arc::new(late)).await;
        assert!(hub.is_connected(late_id).await);
        assert!(hub.disconnect(late_id).await);
        assert!(started.elapsed() < Duration::from_secs(1));

        let report = fan_out.await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.delivered, 1);
    }
}
