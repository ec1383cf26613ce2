//! Real-time fan-out of verification alerts to connected staff clients
//!
//! The hub keeps a set of live [`Observer`]s and pushes every [`HubEvent`]
//! to all of them. Delivery is best effort and at most once per observer:
//! an observer that fails (closed socket, full buffer, timeout) is dropped
//! from the set and the remaining observers are unaffected. Alerts are also
//! persisted, so a dropped observer can re-fetch what it missed.
//!
//! # Event Types
//!
//! - **alert**: a new alert `{id, appointment_id, severity, message, created_at}`
//! - **alert:update**: a human toggled resolution `{id, resolved}`
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use events_bus::{BroadcastHub, ChannelObserver, HubEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let hub = BroadcastHub::new();
//! let (observer, mut rx) = ChannelObserver::channel(16);
//! hub.connect(Arc::new(observer)).await;
//!
//! hub.broadcast(&HubEvent::alert_update(7, true)).await;
//! assert_eq!(rx.recv().await, Some(HubEvent::alert_update(7, true)));
//! # }
//! ```

pub mod event;
pub mod observer;
pub mod hub;
pub mod error;

pub use event::*;
pub use observer::*;
pub use hub::*;
pub use error::*;
