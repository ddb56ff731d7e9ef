pub mod geometry;
pub mod registry;
pub mod room;
pub mod room_code;
pub mod simulation;
mod sse;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig, dao::match_store::MatchStore, services::match_reporter::ReporterHandle,
    services::sse_events,
};

pub use self::registry::RoomRegistry;
pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const MATCH_EVENTS_CAPACITY: usize = 64;

/// Central application state: live rooms, the match store and event fan-out.
pub struct AppState {
    config: Arc<AppConfig>,
    rooms: RoomRegistry,
    reporter: ReporterHandle,
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    degraded: watch::Sender<bool>,
    match_events: SseHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a match store is installed.
    pub fn new(config: AppConfig, reporter: ReporterHandle) -> SharedState {
        let (degraded, _rx) = watch::channel(true);
        Arc::new(Self {
            config: Arc::new(config),
            rooms: RoomRegistry::default(),
            reporter,
            match_store: RwLock::new(None),
            degraded,
            match_events: SseHub::new(MATCH_EVENTS_CAPACITY),
        })
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Queue through which tick loops hand over finished matches.
    pub fn reporter(&self) -> &ReporterHandle {
        &self.reporter
    }

    /// Broadcast hub behind `/sse/matches`.
    pub fn match_events(&self) -> &SseHub {
        &self.match_events
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn set_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_match_store(&self) {
        {
            let mut guard = self.match_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, announcing the change on the match stream.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });

        if changed {
            sse_events::broadcast_system_status(self, value);
        }
    }
}
