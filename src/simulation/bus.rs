//! Snapshot Bus
//!
//! Fan-out of per-tick snapshots to any number of subscribers. Each
//! subscriber owns a bounded queue; the producer only ever `try_send`s, so a
//! slow consumer loses ticks instead of stalling the loop.

use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use super::snapshot::Snapshot;

type Registry = Mutex<HashMap<u64, mpsc::Sender<Arc<Snapshot>>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<Arc<Snapshot>>>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SnapshotBus {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Arc<Registry>,
}

impl SnapshotBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(0),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a new bounded queue.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        lock(&self.subscribers).insert(id, tx);
        debug!("Snapshot bus: subscriber {} joined", id);
        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Offer `snapshot` to every subscriber. Returns how many accepted it.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> usize {
        let mut delivered = 0;
        let mut registry = lock(&self.subscribers);
        registry.retain(|id, tx| match tx.try_send(snapshot.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => {
                debug!("Snapshot bus: subscriber {} gone", id);
                false
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

/// A subscriber's end of the bus. Dropping it leaves the broadcast set.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Arc<Snapshot>>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next snapshot in FIFO order; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::SensorStatus;
    use crate::simulation::snapshot::{Chemistry, LanceReading, ModelParams, TemperatureReading};
    use chrono::Utc;

    fn snap(t: f64) -> Arc<Snapshot> {
        let ts = Utc::now();
        Arc::new(Snapshot {
            process_time: t,
            heat: 0,
            temperature: TemperatureReading { value: 1300.0, status: SensorStatus::valid(1300.0), ts },
            chemistry: Chemistry { si: 0.2, v: 0.3, c: 3.5, c_fused: 3.5 },
            lance_height: LanceReading { value: 1100.0, ts },
            model_params: ModelParams { heat_efficiency: 0.92, reaction_rate_modifier: 1.05 },
            is_emergency_stop: false,
            latest_discrete_sample: None,
        })
    }

    #[tokio::test]
    async fn test_fifo_delivery() {
        let bus = SnapshotBus::new(4);
        let mut sub = bus.subscribe();
        bus.publish(snap(1.0));
        bus.publish(snap(2.0));
        assert_eq!(sub.recv().await.unwrap().process_time, 1.0);
        assert_eq!(sub.recv().await.unwrap().process_time, 2.0);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let bus = SnapshotBus::new(2);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();
        for i in 0..5 {
            bus.publish(snap(i as f64));
            fast.try_recv();
        }
        assert_eq!(slow.try_recv().unwrap().process_time, 0.0);
        assert_eq!(slow.try_recv().unwrap().process_time, 1.0);
        assert!(slow.try_recv().is_none());
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = SnapshotBus::new(2);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(snap(0.0)), 0);
    }
}
