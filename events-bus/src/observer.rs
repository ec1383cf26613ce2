use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{EventBusError, Result};
use crate::event::HubEvent;

/// A live subscriber to the hub's event stream
///
/// An `Err` from [`Observer::deliver`] is treated by the hub as a disconnect
/// signal for this observer only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Observer: Send + Sync {
    async fn deliver(&self, event: &HubEvent) -> Result<()>;
}

/// Observer backed by a bounded tokio channel
///
/// Transports (a WebSocket task, a test harness) hold the receiving half.
/// A full buffer counts as a failed delivery, so a stalled consumer is pruned
/// rather than buffered without bound.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<HubEvent>,
}

impl ChannelObserver {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<HubEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl Observer for ChannelObserver {
    async fn deliver(&self, event: &HubEvent) -> Result<()> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => EventBusError::ObserverLagging,
            TrySendError::Closed(_) => EventBusError::ObserverClosed,
        })
    }
}
