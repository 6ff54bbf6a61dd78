// src/location/mod.rs
//! Location providers: gpsd, serial NMEA, and replayed traces

pub mod gpsd;
pub mod nmea;
pub mod replay;
pub mod serial;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::walk::Coordinate;

pub use gpsd::GpsdLocationSource;
pub use replay::ReplayLocationSource;
pub use serial::SerialLocationSource;

/// Capacity of the update channel handed to subscribers.
pub(crate) const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// A source of position fixes.
///
/// Providers are constructed explicitly and injected into the session
/// controller; `subscribe` hands back a channel of updates in receipt order,
/// fed by a reader task that runs until `unsubscribe` or the source dries up.
/// One subscription is active at a time.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Whether this source may be used. Providers without a permission
    /// concept report whether the source is reachable.
    async fn request_permission(&self) -> Result<bool>;

    /// A single current fix, waiting for one if necessary.
    async fn current_position(&self) -> Result<Coordinate>;

    /// Start streaming position updates.
    async fn subscribe(&self) -> Result<mpsc::Receiver<Coordinate>>;

    /// Stop the active subscription; its channel closes shortly after.
    async fn unsubscribe(&self);
}
