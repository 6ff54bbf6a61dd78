// src/session.rs
//! Walk session state machine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinHandle;

use crate::error::{Result, TrackerError};
use crate::location::LocationProvider;
use crate::store::WalkStore;
use crate::walk::{now_ms, Coordinate, Walk};

/// Transient session state. `current_walk` is present exactly while a walk
/// is being tracked; it is never persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub current_walk: Option<Walk>,
    pub current_location: Option<Coordinate>,
}

/// What happened to the walk when the session stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    Saved(Walk),
    /// Returned when the caller asked not to save, or the walk recorded
    /// fewer than two points and is not worth keeping.
    Discarded(Walk),
}

impl StopOutcome {
    pub fn walk(&self) -> &Walk {
        match self {
            StopOutcome::Saved(walk) | StopOutcome::Discarded(walk) => walk,
        }
    }
}

/// The walk session controller: an Idle/Tracking state machine fed by a
/// location provider and draining into a walk store.
///
/// While tracking, a reader task appends every update in receipt order.
/// Stopping clears the tracking flag first, so nothing lands after the stop.
pub struct WalkTracker {
    state: Arc<RwLock<SessionState>>,
    tracking: Arc<AtomicBool>,
    location: Arc<dyn LocationProvider>,
    store: WalkStore,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WalkTracker {
    pub fn new(location: Arc<dyn LocationProvider>, store: WalkStore) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            tracking: Arc::new(AtomicBool::new(false)),
            location,
            store,
            reader: Mutex::new(None),
        }
    }

    /// Begin tracking a new walk.
    ///
    /// Fails without leaving Idle when a walk is already active, permission
    /// is missing, or the provider cannot produce an initial fix. The
    /// initial fix becomes the first trace point.
    pub async fn start_walk(&self) -> Result<()> {
        if self.tracking.load(Ordering::SeqCst) {
            return Err(TrackerError::AlreadyTracking);
        }

        if !self.location.request_permission().await? {
            return Err(TrackerError::PermissionDenied);
        }

        let first_fix = self
            .location
            .current_position()
            .await
            .map_err(|e| TrackerError::LocationUnavailable(e.to_string()))?;
        let updates = self.location.subscribe().await?;

        let start_time = now_ms();
        let mut walk = Walk::begin(start_time);
        walk.coordinates.push(first_fix);

        {
            let mut state = self.state.write().unwrap();
            state.current_walk = Some(walk);
            state.current_location = Some(first_fix);
        }
        self.tracking.store(true, Ordering::SeqCst);
        tracing::info!("walk {} started", start_time);

        let state = Arc::clone(&self.state);
        let tracking = Arc::clone(&self.tracking);
        let handle = tokio::spawn(async move {
            let mut updates = updates;
            while let Some(coordinate) = updates.recv().await {
                if !tracking.load(Ordering::SeqCst) {
                    break;
                }
                let mut state = state.write().unwrap();
                state.current_location = Some(coordinate);
                if let Some(walk) = state.current_walk.as_mut() {
                    walk.coordinates.push(coordinate);
                }
            }
            tracing::debug!("location stream ended");
        });
        *self.reader.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Stop tracking and finalize the walk.
    ///
    /// The session returns to Idle before the store write happens, so a
    /// failed save never leaves it stuck in Tracking; the failure surfaces
    /// through the returned `Result`. A walk with fewer than two points is
    /// discarded even when `save` is requested.
    pub async fn stop_walk(&self, save: bool) -> Result<StopOutcome> {
        if !self.tracking.swap(false, Ordering::SeqCst) {
            return Err(TrackerError::NotTracking);
        }

        self.location.unsubscribe().await;
        if let Some(handle) = self.reader.lock().unwrap().take() {
            handle.abort();
        }

        let mut walk = {
            let mut state = self.state.write().unwrap();
            state.current_location = None;
            state.current_walk.take()
        }
        .ok_or_else(|| TrackerError::Other("tracking flag set without an active walk".to_string()))?;
        walk.finalize(now_ms());

        if let Some(last) = walk.coordinates.last().copied() {
            if let Err(err) = self.store.save_last_location(&last).await {
                tracing::warn!("failed to persist last location: {}", err);
            }
        }

        if save && walk.point_count() >= 2 {
            self.store.append(&walk).await?;
            tracing::info!(
                "walk {} saved: {} points, {:.3} km",
                walk.id,
                walk.point_count(),
                walk.distance_km()
            );
            Ok(StopOutcome::Saved(walk))
        } else {
            tracing::info!("walk {} discarded ({} points)", walk.id, walk.point_count());
            Ok(StopOutcome::Discarded(walk))
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }

    /// Milliseconds since the active walk started, 0 when idle. Derived on
    /// demand so the display can refresh it every frame.
    pub fn elapsed_ms(&self) -> i64 {
        self.state
            .read()
            .unwrap()
            .current_walk
            .as_ref()
            .map_or(0, |walk| now_ms() - walk.start_time)
    }

    pub fn current_location(&self) -> Option<Coordinate> {
        self.state.read().unwrap().current_location
    }

    /// A copy of the transient session state, for rendering.
    pub fn snapshot(&self) -> SessionState {
        self.state.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::ReplayLocationSource;
    use crate::store::MemoryStorage;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    struct DeniedSource;

    #[async_trait]
    impl LocationProvider for DeniedSource {
        async fn request_permission(&self) -> Result<bool> {
            Ok(false)
        }

        async fn current_position(&self) -> Result<Coordinate> {
            Err(TrackerError::PermissionDenied)
        }

        async fn subscribe(&self) -> Result<mpsc::Receiver<Coordinate>> {
            Err(TrackerError::PermissionDenied)
        }

        async fn unsubscribe(&self) {}
    }

    struct NoFixSource;

    #[async_trait]
    impl LocationProvider for NoFixSource {
        async fn request_permission(&self) -> Result<bool> {
            Ok(true)
        }

        async fn current_position(&self) -> Result<Coordinate> {
            Err(TrackerError::LocationUnavailable("no satellites".to_string()))
        }

        async fn subscribe(&self) -> Result<mpsc::Receiver<Coordinate>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }

        async fn unsubscribe(&self) {}
    }

    fn equator_track() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.002),
        ]
    }

    fn memory_store() -> WalkStore {
        WalkStore::new(Arc::new(MemoryStorage::new()))
    }

    fn replay_tracker(coordinates: Vec<Coordinate>, store: WalkStore) -> WalkTracker {
        let source = ReplayLocationSource::new(coordinates, Duration::from_millis(5));
        WalkTracker::new(Arc::new(source), store)
    }

    /// Wait until the in-progress trace has at least `count` points.
    async fn wait_for_points(tracker: &WalkTracker, count: usize) {
        for _ in 0..200 {
            let points = tracker
                .snapshot()
                .current_walk
                .map_or(0, |walk| walk.point_count());
            if points >= count {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("trace never reached {} points", count);
    }

    #[tokio::test]
    async fn test_stop_without_save_never_appends() {
        let store = memory_store();
        let tracker = replay_tracker(equator_track(), store.clone());

        tracker.start_walk().await.unwrap();
        let outcome = tracker.stop_walk(false).await.unwrap();

        assert!(matches!(outcome, StopOutcome::Discarded(_)));
        assert!(store.list().await.is_empty());
        assert!(!tracker.is_tracking());
    }

    #[tokio::test]
    async fn test_full_walk_is_saved_with_derived_fields() {
        let store = memory_store();
        let tracker = replay_tracker(equator_track(), store.clone());

        tracker.start_walk().await.unwrap();
        assert!(tracker.is_tracking());
        wait_for_points(&tracker, 3).await;

        let outcome = tracker.stop_walk(true).await.unwrap();
        let StopOutcome::Saved(walk) = outcome else {
            panic!("walk should have been saved");
        };

        assert_eq!(walk.point_count(), 3);
        assert_eq!(walk.duration, walk.end_time - walk.start_time);
        assert!(walk.duration >= 0);
        assert_eq!(walk.coordinates, equator_track());
        let distance = walk.distance.unwrap();
        assert!((distance - 0.222).abs() < 0.005, "got {}", distance);

        let saved = store.list().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0], walk);
        assert!(!tracker.is_tracking());
    }

    #[tokio::test]
    async fn test_last_location_is_persisted_on_stop() {
        let store = memory_store();
        let tracker = replay_tracker(equator_track(), store.clone());

        tracker.start_walk().await.unwrap();
        wait_for_points(&tracker, 3).await;
        tracker.stop_walk(true).await.unwrap();

        assert_eq!(
            store.last_location().await,
            Some(Coordinate::new(0.0, 0.002))
        );
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let tracker = replay_tracker(equator_track(), memory_store());

        tracker.start_walk().await.unwrap();
        let err = tracker.start_walk().await.unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyTracking));

        // The original session is unaffected.
        assert!(tracker.is_tracking());
        tracker.stop_walk(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_rejected() {
        let tracker = replay_tracker(equator_track(), memory_store());

        let err = tracker.stop_walk(true).await.unwrap_err();
        assert!(matches!(err, TrackerError::NotTracking));
    }

    #[tokio::test]
    async fn test_permission_denied_stays_idle() {
        let tracker = WalkTracker::new(Arc::new(DeniedSource), memory_store());

        let err = tracker.start_walk().await.unwrap_err();
        assert!(matches!(err, TrackerError::PermissionDenied));
        assert!(!tracker.is_tracking());
        assert!(tracker.snapshot().current_walk.is_none());
    }

    #[tokio::test]
    async fn test_missing_initial_fix_stays_idle() {
        let tracker = WalkTracker::new(Arc::new(NoFixSource), memory_store());

        let err = tracker.start_walk().await.unwrap_err();
        assert!(matches!(err, TrackerError::LocationUnavailable(_)));
        assert!(!tracker.is_tracking());
    }

    #[tokio::test]
    async fn test_single_point_walk_is_not_worth_saving() {
        let store = memory_store();
        let tracker = replay_tracker(vec![Coordinate::new(0.0, 0.0)], store.clone());

        tracker.start_walk().await.unwrap();
        let outcome = tracker.stop_walk(true).await.unwrap();

        assert!(matches!(outcome, StopOutcome::Discarded(_)));
        assert_eq!(outcome.walk().point_count(), 1);
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_elapsed_is_zero_when_idle() {
        let tracker = replay_tracker(equator_track(), memory_store());
        assert_eq!(tracker.elapsed_ms(), 0);

        tracker.start_walk().await.unwrap();
        sleep(Duration::from_millis(10)).await;
        assert!(tracker.elapsed_ms() > 0);

        tracker.stop_walk(false).await.unwrap();
        assert_eq!(tracker.elapsed_ms(), 0);
    }
}
